//! Per-sample kernels for the CPU backend.
//!
//! The CPU device does the set selection and the running average itself;
//! a [`Kernel`] only turns one sample into a radiance value.
//! [`PreviewKernel`] traces the same scene as `preview.wgsl`.

use glam::Vec3;

use crate::render::{GpuConfig, GpuState};

/// Inputs for one sample of one pixel.
#[derive(Debug, Clone, Copy)]
pub struct SampleContext<'a> {
    pub config: &'a GpuConfig,
    pub state: &'a GpuState,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Index of this sample within the cycle.
    pub sample_index: u32,
    /// Pixel sample in `[0, 1)²`.
    pub square: [f32; 2],
    /// Lens sample on the unit disk.
    pub disk: [f32; 2],
}

pub trait Kernel: Sync {
    /// Radiance of one sample, RGBA.
    fn sample(&self, ctx: &SampleContext<'_>) -> [f32; 4];
}

impl<F> Kernel for F
where
    F: Fn(&SampleContext<'_>) -> [f32; 4] + Sync,
{
    fn sample(&self, ctx: &SampleContext<'_>) -> [f32; 4] {
        self(ctx)
    }
}

/// Every sample has the same value.
#[derive(Debug, Clone, Copy)]
pub struct ConstantKernel(pub [f32; 4]);

impl Kernel for ConstantKernel {
    fn sample(&self, _ctx: &SampleContext<'_>) -> [f32; 4] {
        self.0
    }
}

/// Writes the sample index into every channel. The accumulated value after
/// `n` samples is `(n - 1) / 2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SampleIndexKernel;

impl Kernel for SampleIndexKernel {
    fn sample(&self, ctx: &SampleContext<'_>) -> [f32; 4] {
        [ctx.sample_index as f32; 4]
    }
}

const SPHERE_CENTER: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const SPHERE_RADIUS: f32 = 1.0;
const FOCUS_DISTANCE: f32 = 10.0;
/// tan(30°)
const TAN_HALF_FOV: f32 = 0.577;
const MIRROR_TINT: f32 = 0.9;
const SHADOW_LIGHT: f32 = 0.3;
const HIT_EPSILON: f32 = 1e-3;

/// Mirror sphere over a checkered ground under a sky gradient.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewKernel;

impl PreviewKernel {
    fn sun() -> Vec3 {
        Vec3::new(0.5, 1.0, -0.3).normalize()
    }

    fn sky(dir: Vec3) -> Vec3 {
        let t = 0.5 * (dir.y + 1.0);
        Vec3::ONE.lerp(Vec3::new(0.5, 0.7, 1.0), t)
    }

    fn hit_sphere(origin: Vec3, dir: Vec3) -> Option<f32> {
        let oc = origin - SPHERE_CENTER;
        let b = oc.dot(dir);
        let c = oc.length_squared() - SPHERE_RADIUS * SPHERE_RADIUS;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sq = disc.sqrt();
        [-b - sq, -b + sq].into_iter().find(|&t| t > HIT_EPSILON)
    }

    fn hit_ground(origin: Vec3, dir: Vec3) -> Option<f32> {
        if dir.y >= 0.0 {
            return None;
        }
        let t = -origin.y / dir.y;
        (t > HIT_EPSILON).then_some(t)
    }

    /// Primary ray through the pixel sample, offset on the lens.
    fn camera_ray(ctx: &SampleContext<'_>) -> (Vec3, Vec3) {
        let position = Vec3::from_array(ctx.state.position);
        let heading = Vec3::from_array(ctx.state.heading).normalize_or(Vec3::Z);
        let right = Vec3::new(-heading.z, 0.0, heading.x).normalize_or(Vec3::NEG_X);
        let up = right.cross(heading);

        let aspect = ctx.width as f32 / ctx.height.max(1) as f32;
        let u = ((ctx.x as f32 + ctx.square[0]) / ctx.width as f32) * 2.0 - 1.0;
        let v = 1.0 - ((ctx.y as f32 + ctx.square[1]) / ctx.height as f32) * 2.0;
        let dir = (heading + right * (u * aspect * TAN_HALF_FOV) + up * (v * TAN_HALF_FOV)).normalize();

        let focus = position + dir * FOCUS_DISTANCE;
        let lens = (right * ctx.disk[0] + up * ctx.disk[1]) * ctx.state.lens_radius;
        let origin = position + lens;
        (origin, (focus - origin).normalize())
    }

    fn trace(mut origin: Vec3, mut dir: Vec3, depth: u32) -> Vec3 {
        let mut throughput = Vec3::ONE;
        for _ in 0..depth.max(1) {
            let sphere = Self::hit_sphere(origin, dir);
            let ground = Self::hit_ground(origin, dir);
            match (sphere, ground) {
                (Some(ts), g) if g.map_or(true, |tg| ts < tg) => {
                    let p = origin + dir * ts;
                    let n = (p - SPHERE_CENTER) / SPHERE_RADIUS;
                    dir = dir - n * (2.0 * dir.dot(n));
                    origin = p;
                    throughput *= MIRROR_TINT;
                }
                (_, Some(tg)) => {
                    let p = origin + dir * tg;
                    let checker = (p.x.floor() as i32 + p.z.floor() as i32) & 1;
                    let albedo = if checker == 0 { 0.8 } else { 0.2 };
                    let light = if Self::hit_sphere(p, Self::sun()).is_some() {
                        SHADOW_LIGHT
                    } else {
                        1.0
                    };
                    return throughput * (albedo * light);
                }
                _ => return throughput * Self::sky(dir),
            }
        }
        Vec3::ZERO
    }
}

impl Kernel for PreviewKernel {
    fn sample(&self, ctx: &SampleContext<'_>) -> [f32; 4] {
        let (origin, dir) = Self::camera_ray(ctx);
        let c = Self::trace(origin, dir, ctx.config.trace_depth);
        [c.x, c.y, c.z, 1.0]
    }
}
