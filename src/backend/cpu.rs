//! CPU reference device.
//!
//! Implements [`ComputeDevice`] in host memory: images are `Vec<[f32; 4]>`,
//! buffers are word-aligned byte stores, and a dispatch runs a [`Kernel`]
//! over every pixel with rayon. Sample selection and the running average
//! follow the GPU kernel exactly, so the two backends converge to the same
//! image for the same kernel.
//!
//! The device also counts copies, transfers and dispatches, and can be told
//! to fail allocations or the next dispatch.

use bytemuck::Pod;
use rayon::prelude::*;

use crate::render::{BufferKind, ComputeDevice, GpuConfig, GpuState, KernelArgs};
use crate::util::{Error, Result};

pub use super::kernel::{ConstantKernel, Kernel, PreviewKernel, SampleContext, SampleIndexKernel};

/// Pixel hash primes for sample set selection.
const SET_PRIME_X: u32 = 1973;
const SET_PRIME_Y: u32 = 9277;

/// Sample set a pixel draws from in a given cycle. Shared with `preview.wgsl`.
pub fn sample_set(x: u32, y: u32, cycle: u32, num_sets: u32) -> u32 {
    x.wrapping_mul(SET_PRIME_X)
        .wrapping_add(y.wrapping_mul(SET_PRIME_Y))
        .wrapping_add(cycle)
        % num_sets.max(1)
}

/// Image handle.
#[derive(Debug, PartialEq, Eq)]
pub struct CpuImage {
    id: usize,
}

/// Buffer handle.
#[derive(Debug, PartialEq, Eq)]
pub struct CpuBuffer {
    id: usize,
}

#[derive(Debug)]
struct BufferSlot {
    label: &'static str,
    kind: BufferKind,
    words: Vec<u32>,
    len: usize,
    writes: usize,
}

impl BufferSlot {
    fn bytes(&self) -> &[u8] {
        &bytemuck::cast_slice(&self.words)[..self.len]
    }
}

#[derive(Debug)]
pub struct CpuDevice<K> {
    kernel: K,
    images: Vec<Vec<[f32; 4]>>,
    buffers: Vec<Option<BufferSlot>>,
    buffer_limit: Option<usize>,
    copies: usize,
    transfers: usize,
    dispatches: Vec<(u32, u32)>,
    fail_next_dispatch: bool,
}

impl<K: Kernel> CpuDevice<K> {
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            images: Vec::new(),
            buffers: Vec::new(),
            buffer_limit: None,
            copies: 0,
            transfers: 0,
            dispatches: Vec::new(),
            fail_next_dispatch: false,
        }
    }

    /// Cap on simultaneously live buffers. Allocations past it fail.
    pub fn set_buffer_limit(&mut self, limit: Option<usize>) {
        self.buffer_limit = limit;
    }

    /// Make the next dispatch fail without touching any image.
    pub fn fail_next_dispatch(&mut self) {
        self.fail_next_dispatch = true;
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().flatten().count()
    }

    /// Byte length of a buffer.
    pub fn buffer_len(&self, buffer: &CpuBuffer) -> usize {
        self.slot(buffer).map_or(0, |s| s.len)
    }

    /// Number of writes into a buffer after creation.
    pub fn write_count(&self, buffer: &CpuBuffer) -> usize {
        self.slot(buffer).map_or(0, |s| s.writes)
    }

    /// Total buffer writes across all buffers.
    pub fn transfers(&self) -> usize {
        self.transfers
    }

    /// Image copies performed so far.
    pub fn copies(&self) -> usize {
        self.copies
    }

    /// `(sample_start, batch_size)` of every dispatch, in order.
    pub fn dispatches(&self) -> &[(u32, u32)] {
        &self.dispatches
    }

    /// Decode the start of a buffer as `T`.
    pub fn read_pod<T: Pod>(&self, buffer: &CpuBuffer) -> Result<T> {
        let slot = self.slot(buffer)?;
        bytemuck::try_pod_read_unaligned(slot.bytes().get(..std::mem::size_of::<T>()).ok_or_else(|| {
            Error::Transfer { what: slot.label, reason: "buffer smaller than requested type".into() }
        })?)
        .map_err(|e| Error::Transfer { what: slot.label, reason: e.to_string() })
    }

    /// Overwrite every pixel of an image.
    pub fn fill_image(&mut self, image: &CpuImage, pixel: [f32; 4]) {
        if let Some(data) = self.images.get_mut(image.id) {
            data.fill(pixel);
        }
    }

    fn slot(&self, buffer: &CpuBuffer) -> Result<&BufferSlot> {
        self.buffers
            .get(buffer.id)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::Device(format!("unknown buffer #{}", buffer.id)))
    }

    fn image(&self, image: &CpuImage, width: u32, height: u32) -> Result<&[[f32; 4]]> {
        let data = self
            .images
            .get(image.id)
            .ok_or_else(|| Error::Device(format!("unknown image #{}", image.id)))?;
        if data.len() != width as usize * height as usize {
            return Err(Error::Device(format!(
                "image #{} is not {width}x{height}",
                image.id
            )));
        }
        Ok(data)
    }

    fn samples(&self, buffer: &CpuBuffer) -> Result<&[[f32; 2]]> {
        let slot = self.slot(buffer)?;
        if slot.kind != BufferKind::Storage {
            return Err(Error::Dispatch(format!("{} is not a storage buffer", slot.label)));
        }
        let words = &slot.words[..slot.len / 4];
        bytemuck::try_cast_slice(words).map_err(|e| Error::Dispatch(format!("{}: {e}", slot.label)))
    }
}

impl<K: Kernel> ComputeDevice for CpuDevice<K> {
    type Image = CpuImage;
    type Buffer = CpuBuffer;

    fn name(&self) -> &str {
        "cpu"
    }

    fn create_image(&mut self, label: &'static str, width: u32, height: u32) -> Result<CpuImage> {
        if width == 0 || height == 0 {
            return Err(Error::Allocation { what: label, reason: format!("empty image {width}x{height}") });
        }
        self.images.push(vec![[0.0; 4]; width as usize * height as usize]);
        Ok(CpuImage { id: self.images.len() - 1 })
    }

    fn copy_image(&mut self, src: &CpuImage, dst: &CpuImage, width: u32, height: u32) -> Result<()> {
        if src.id == dst.id {
            return Err(Error::Copy("source and destination are the same image".into()));
        }
        let data = self.image(src, width, height).map_err(|e| Error::Copy(e.to_string()))?.to_vec();
        self.image(dst, width, height).map_err(|e| Error::Copy(e.to_string()))?;
        self.images[dst.id] = data;
        self.copies += 1;
        Ok(())
    }

    fn create_buffer(&mut self, label: &'static str, kind: BufferKind, contents: &[u8]) -> Result<CpuBuffer> {
        if let Some(limit) = self.buffer_limit {
            if self.live_buffers() >= limit {
                return Err(Error::Allocation { what: label, reason: format!("buffer limit {limit} reached") });
            }
        }
        let mut words = vec![0u32; contents.len().div_ceil(4)];
        bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..contents.len()].copy_from_slice(contents);
        self.buffers.push(Some(BufferSlot { label, kind, words, len: contents.len(), writes: 0 }));
        Ok(CpuBuffer { id: self.buffers.len() - 1 })
    }

    fn write_buffer(&mut self, buffer: &CpuBuffer, contents: &[u8]) -> Result<()> {
        let slot = self
            .buffers
            .get_mut(buffer.id)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::Device(format!("unknown buffer #{}", buffer.id)))?;
        if contents.len() > slot.len {
            return Err(Error::Transfer {
                what: slot.label,
                reason: format!("{} bytes into a {} byte buffer", contents.len(), slot.len),
            });
        }
        bytemuck::cast_slice_mut::<u32, u8>(&mut slot.words)[..contents.len()].copy_from_slice(contents);
        slot.writes += 1;
        self.transfers += 1;
        Ok(())
    }

    fn release_buffer(&mut self, buffer: CpuBuffer) {
        if let Some(slot) = self.buffers.get_mut(buffer.id) {
            *slot = None;
        }
    }

    fn dispatch(&mut self, args: &KernelArgs<'_, Self>) -> Result<()> {
        if std::mem::take(&mut self.fail_next_dispatch) {
            return Err(Error::Dispatch("injected failure".into()));
        }
        if args.read.id == args.write.id {
            return Err(Error::Dispatch("read and write images alias".into()));
        }

        let config: GpuConfig = self.read_pod(args.config)?;
        let state: GpuState = self.read_pod(args.state)?;
        let square = self.samples(args.square_samples)?;
        let disk = self.samples(args.disk_samples)?;
        let read = self.image(args.read, args.width, args.height)?;
        self.image(args.write, args.width, args.height)?;

        let num_sets = args.num_sample_sets.max(1);
        let per_set = square.len() / num_sets as usize;
        let end = args.sample_start + args.batch_size;
        if end as usize > per_set || disk.len() != square.len() {
            return Err(Error::Dispatch(format!(
                "samples {}..{end} outside a pool of {per_set} per set",
                args.sample_start
            )));
        }

        let width = args.width;
        let height = args.height;
        let start = args.sample_start;
        let batch = args.batch_size;
        let cycle = args.cycle;
        let kernel = &self.kernel;

        let mut out = vec![[0.0f32; 4]; read.len()];
        out.par_chunks_mut(width as usize).enumerate().for_each(|(y, row)| {
            let y = y as u32;
            for (x, pixel) in row.iter_mut().enumerate() {
                let x = x as u32;
                let base = sample_set(x, y, cycle, num_sets) as usize * per_set;
                let mut sum = [0.0f32; 4];
                for k in start..end {
                    let index = base + k as usize;
                    let ctx = SampleContext {
                        config: &config,
                        state: &state,
                        x,
                        y,
                        width,
                        height,
                        sample_index: k,
                        square: square[index],
                        disk: disk[index],
                    };
                    let value = kernel.sample(&ctx);
                    for c in 0..4 {
                        sum[c] += value[c];
                    }
                }

                let prev = read[(y * width + x) as usize];
                for c in 0..4 {
                    pixel[c] = if start > 0 {
                        (prev[c] * start as f32 + sum[c]) / end as f32
                    } else {
                        sum[c] / batch.max(1) as f32
                    };
                }
            }
        });

        self.images[args.write.id] = out;
        self.dispatches.push((start, batch));
        Ok(())
    }

    fn read_image(&mut self, image: &CpuImage, width: u32, height: u32) -> Result<Vec<[f32; 4]>> {
        Ok(self.image(image, width, height)?.to_vec())
    }
}
