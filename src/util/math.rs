//! Math type re-exports and small camera helpers.

pub use glam::Vec3;

/// Rotate a direction about the world up axis (Y) and renormalize.
///
/// Positive angles turn from +Z towards -X, matching mouse-right = turn right
/// for a camera that starts looking down +Z.
#[inline]
pub fn rotate_about_y(dir: Vec3, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    let rotated = Vec3::new(c * dir.x - s * dir.z, dir.y, s * dir.x + c * dir.z);
    rotated.normalize_or(Vec3::Z)
}
