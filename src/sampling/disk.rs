//! Concentric square-to-disk mapping (Shirley & Chiu).

use std::f32::consts::FRAC_PI_4;

/// Map a point of `[0,1)²` onto the unit disk.
///
/// The square is split into four triangular wedges by its diagonals; each
/// wedge maps onto a quarter of the disk, which keeps neighbouring points
/// neighbours and avoids the centre clumping of a naive polar mapping.
pub fn map_to_unit_disk(x: f32, y: f32) -> (f32, f32) {
    let sx = 2.0 * x - 1.0;
    let sy = 2.0 * y - 1.0;

    let (r, phi) = if sx > -sy {
        if sx > sy {
            (sx, sy / sx)
        } else {
            (sy, 2.0 - sx / sy)
        }
    } else if sx < sy {
        (-sx, 4.0 + sy / sx)
    } else if sy != 0.0 {
        (-sy, 6.0 - sx / sy)
    } else {
        // Exact centre: the angle is undefined, any value works
        (-sy, 0.0)
    };

    let (sin, cos) = (phi * FRAC_PI_4).sin_cos();
    (r * cos, r * sin)
}
