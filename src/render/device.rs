//! The compute device seam.
//!
//! Everything the accumulation engine needs from a compute API: images,
//! buffers, a whole-image copy and a synchronous kernel dispatch. The wgpu
//! backend and the CPU reference backend both implement [`ComputeDevice`].

use crate::util::Result;

/// How a buffer is bound to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Small, frequently rewritten parameter block.
    Uniform,
    /// Large read-only array (sample pools).
    Storage,
}

/// Kernel arguments, in the order the kernel expects them.
pub struct KernelArgs<'a, D: ComputeDevice + ?Sized> {
    pub config: &'a D::Buffer,
    pub state: &'a D::Buffer,
    pub read: &'a D::Image,
    pub write: &'a D::Image,
    pub square_samples: &'a D::Buffer,
    pub disk_samples: &'a D::Buffer,
    pub num_sample_sets: u32,
    /// Restart count. Offsets each pixel's set so a new cycle draws new samples.
    pub cycle: u32,
    /// Index of the first sample of this batch within the current cycle.
    pub sample_start: u32,
    pub batch_size: u32,
    /// Dispatch domain.
    pub width: u32,
    pub height: u32,
}

/// A device able to run the accumulation kernel.
///
/// Every call is ordered after the previous one. [`ComputeDevice::dispatch`]
/// returns only once the batch has completed.
pub trait ComputeDevice {
    /// RGBA float image handle.
    type Image;
    /// Device buffer handle.
    type Buffer;

    /// Short backend name for logging.
    fn name(&self) -> &str;

    /// Allocate a zero-initialized `width × height` RGBA float image.
    fn create_image(&mut self, label: &'static str, width: u32, height: u32) -> Result<Self::Image>;

    /// Copy all of `src` into `dst`. Sequenced before any later dispatch.
    fn copy_image(&mut self, src: &Self::Image, dst: &Self::Image, width: u32, height: u32) -> Result<()>;

    /// Allocate a buffer initialized with `contents`.
    fn create_buffer(
        &mut self,
        label: &'static str,
        kind: BufferKind,
        contents: &[u8],
    ) -> Result<Self::Buffer>;

    /// Overwrite a buffer from offset zero.
    fn write_buffer(&mut self, buffer: &Self::Buffer, contents: &[u8]) -> Result<()>;

    /// Give a buffer's memory back to the device.
    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Run the kernel over `width × height` and wait for it to finish.
    fn dispatch(&mut self, args: &KernelArgs<'_, Self>) -> Result<()>;

    /// Read an image back to host memory, row-major from the top-left pixel.
    fn read_image(&mut self, image: &Self::Image, width: u32, height: u32) -> Result<Vec<[f32; 4]>>;
}
