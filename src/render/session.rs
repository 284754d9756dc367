//! The render session: one object owning everything the loop mutates.
//!
//! ```text
//! commands → State/Configuration (dirty, maybe restart)
//!          → next batch size → settle write→read → flush dirty params
//!          → dispatch (wait) → advance progress → frame time on convergence
//! ```

use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::collections::VecDeque;
use std::time::Instant;

use crate::config::Configuration;
use crate::sampling::{SamplePool, MAX_SAMPLE_ROOT};
use crate::util::Result;

use super::accum::AccumulationBuffers;
use super::device::{ComputeDevice, KernelArgs};
use super::input::{Command, Control, HeldInputs};
use super::params::DeviceParams;
use super::pools::PoolBuffers;
use super::present::{FrameView, Presenter};
use super::refine::{Batch, BatchThrottle, Phase, Refinement};
use super::state::State;
use super::timing::FrameTimer;

/// What one [`Session::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A batch was dispatched and accumulated.
    Accumulated { batch: Batch, converged: bool },
    /// The image is complete; nothing was dispatched.
    Converged,
    /// Sampling is paused; nothing was dispatched.
    Paused,
}

pub struct Session<D: ComputeDevice> {
    device: D,
    params: DeviceParams<D>,
    buffers: AccumulationBuffers<D::Image>,
    pools: PoolBuffers<D::Buffer>,
    refine: Refinement,
    throttle: BatchThrottle,
    held: HeldInputs,
    timer: FrameTimer,
    rng: Pcg32,
    cycle: u32,
    pending: VecDeque<Command>,
}

impl<D: ComputeDevice> Session<D> {
    /// Create a session with a randomly seeded sample generator.
    pub fn new(device: D, config: Configuration) -> Result<Self> {
        Self::with_seed(device, config, rand::random())
    }

    /// Create a session whose sample pools are reproducible from `seed`.
    pub fn with_seed(mut device: D, config: Configuration, seed: u64) -> Result<Self> {
        config.validate()?;

        let mut rng = Pcg32::seed_from_u64(seed);
        let pool = SamplePool::generate(config.sample_root, &mut rng)?;
        let pools = PoolBuffers::upload(&mut device, &pool)?;
        let buffers = AccumulationBuffers::new(&mut device, config.width, config.height)?;
        let refine = Refinement::new(config.sample_root);

        tracing::info!(
            backend = device.name(),
            width = config.width,
            height = config.height,
            sample_root = config.sample_root,
            batch_size = config.batch_size,
            "render session ready"
        );

        let params = DeviceParams::new(&mut device, config, State::default())?;

        Ok(Self {
            device,
            params,
            buffers,
            pools,
            refine,
            throttle: BatchThrottle::default(),
            held: HeldInputs::default(),
            timer: FrameTimer::default(),
            rng,
            cycle: 0,
            pending: VecDeque::new(),
        })
    }

    pub fn config(&self) -> &Configuration {
        self.params.config.get()
    }

    pub fn state(&self) -> &State {
        self.params.state.get()
    }

    pub fn params(&self) -> &DeviceParams<D> {
        &self.params
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn buffers(&self) -> &AccumulationBuffers<D::Image> {
        &self.buffers
    }

    pub fn pools(&self) -> &PoolBuffers<D::Buffer> {
        &self.pools
    }

    pub fn sample_num(&self) -> u32 {
        self.refine.sample_num()
    }

    pub fn sample_target(&self) -> u32 {
        self.refine.target()
    }

    pub fn phase(&self) -> Phase {
        self.refine.phase()
    }

    pub fn is_converged(&self) -> bool {
        self.refine.is_converged()
    }

    /// Number of restarts so far.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// Image holding the latest accumulated result.
    pub fn display_image(&self) -> &D::Image {
        self.buffers.display()
    }

    /// Batch size the next dispatch will use before clamping.
    pub fn effective_batch_size(&self) -> u32 {
        let mut throttle = self.throttle.clone();
        throttle.update(self.held.any());
        throttle.effective(self.config().batch_size)
    }

    /// Queue a command for the next tick.
    pub fn submit(&mut self, command: Command) {
        self.pending.push_back(command);
    }

    /// Apply a command right away.
    pub fn apply(&mut self, command: Command) -> Result<()> {
        tracing::trace!(?command, "apply");
        match command {
            Command::RotateHeading(angle) => self.rotate_heading(angle),
            Command::Translate { dx, dz } => self.translate(dx, dz),
            Command::AdjustLensRadius(delta) => self.adjust_lens_radius(delta),
            Command::AdjustTraceDepth(delta) => self.adjust_trace_depth(delta),
            Command::AdjustSampleRoot(delta) => return self.adjust_sample_root(delta),
            Command::AdjustBatchSize(delta) => self.adjust_batch_size(delta),
            Command::ToggleOverlay => self.toggle_overlay(),
            Command::TogglePause => self.toggle_pause(),
            Command::Press(control) => self.press(control),
            Command::Release(control) => self.release(control),
        }
        Ok(())
    }

    pub fn rotate_heading(&mut self, angle: f32) {
        self.update_state(true, |s| s.rotate_heading(angle));
    }

    pub fn translate(&mut self, dx: f32, dz: f32) {
        self.update_state(true, |s| s.translate(dx, dz));
    }

    pub fn adjust_lens_radius(&mut self, delta: f32) {
        self.update_state(true, |s| s.lens_radius = (s.lens_radius + delta).max(0.0));
    }

    pub fn adjust_trace_depth(&mut self, delta: i32) {
        self.update_config(true, |c| c.trace_depth = c.trace_depth.saturating_add_signed(delta));
    }

    /// Change the sample root by `delta`, clamped to `1..=MAX_SAMPLE_ROOT`.
    pub fn adjust_sample_root(&mut self, delta: i32) -> Result<()> {
        let current = self.config().sample_root as i64;
        let root = (current + delta as i64).clamp(1, MAX_SAMPLE_ROOT as i64) as u32;
        self.set_sample_root(root)
    }

    /// Regenerate the sample pools for `sample_root` and restart.
    ///
    /// On failure the previous pools, configuration and progress are kept.
    pub fn set_sample_root(&mut self, sample_root: u32) -> Result<()> {
        if sample_root == self.config().sample_root {
            return Ok(());
        }

        let pool = SamplePool::generate(sample_root, &mut self.rng)?;
        self.pools.replace(&mut self.device, &pool)?;

        self.params.config.update(|c| c.sample_root = sample_root);
        self.refine.set_sample_root(sample_root);
        self.restart();
        tracing::info!(sample_root, samples = self.refine.target(), "sample root changed");
        Ok(())
    }

    /// Change the configured batch size (at least one). Progress is kept.
    pub fn adjust_batch_size(&mut self, delta: i32) {
        self.update_config(false, |c| c.batch_size = c.batch_size.saturating_add_signed(delta).max(1));
    }

    pub fn toggle_overlay(&mut self) {
        self.update_state(false, |s| s.show_overlay = !s.show_overlay);
    }

    /// Stop or resume dispatching. Progress is kept.
    pub fn toggle_pause(&mut self) {
        self.update_config(false, |c| c.paused = !c.paused);
        tracing::info!(paused = self.config().paused, "toggled pause");
    }

    pub fn press(&mut self, control: Control) {
        self.held.press(control);
    }

    pub fn release(&mut self, control: Control) {
        self.held.release(control);
    }

    /// Drop the accumulated image and start a new cycle.
    pub fn restart(&mut self) {
        self.refine.restart();
        self.cycle = self.cycle.wrapping_add(1);
        self.timer.cancel();
        if self.params.state.get().sample_num != 0 {
            self.params.state.update(|s| s.sample_num = 0);
        }
    }

    /// Apply queued commands, then run at most one accumulation step.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        while let Some(command) = self.pending.pop_front() {
            self.apply(command)?;
        }
        self.accumulate()
    }

    /// Tick until the image converges or sampling is paused.
    ///
    /// Returns the number of batches dispatched. Stops after `max_ticks`.
    pub fn run_to_convergence(&mut self, max_ticks: usize) -> Result<usize> {
        let mut batches = 0;
        for _ in 0..max_ticks {
            match self.tick()? {
                TickOutcome::Accumulated { converged, .. } => {
                    batches += 1;
                    if converged {
                        break;
                    }
                }
                TickOutcome::Converged | TickOutcome::Paused => break,
            }
        }
        Ok(batches)
    }

    /// Hand the display image to the presentation layer.
    pub fn present<P: Presenter<D>>(&mut self, presenter: &mut P) -> Result<()> {
        let frame = FrameView {
            image: self.buffers.display(),
            config: self.params.config.get(),
            state: self.params.state.get(),
        };
        presenter.render(&mut self.device, frame)
    }

    /// Read the display image back to host memory.
    pub fn read_display(&mut self) -> Result<Vec<[f32; 4]>> {
        let (width, height) = self.buffers.dimensions();
        self.device.read_image(self.buffers.display(), width, height)
    }

    /// Release device buffers and return the device.
    pub fn shutdown(self) -> D {
        let Self { mut device, params, pools, .. } = self;
        pools.release(&mut device);
        let DeviceParams { config, state } = params;
        config.release(&mut device);
        state.release(&mut device);
        device
    }

    fn accumulate(&mut self) -> Result<TickOutcome> {
        if self.throttle.update(self.held.any()) {
            if self.throttle.is_engaged() {
                tracing::debug!("input held, batch size throttled to 1");
            } else {
                tracing::debug!(batch_size = self.config().batch_size, "input released, batch size restored");
            }
        }

        if self.refine.is_converged() {
            return Ok(TickOutcome::Converged);
        }
        if self.config().paused {
            return Ok(TickOutcome::Paused);
        }

        let batch_size = self.throttle.effective(self.config().batch_size);
        let Some(batch) = self.refine.next_batch(batch_size) else {
            return Ok(TickOutcome::Converged);
        };

        if batch.is_first() {
            self.timer.start(Instant::now());
            if self.params.state.get().last_frame_time.is_some() {
                self.params.state.update(|s| s.last_frame_time = None);
            }
        }

        if let Err(err) = self.dispatch(batch) {
            // The read image no longer holds the last completed average
            self.restart();
            return Err(err);
        }

        let progress = self.refine.complete(batch);
        self.params.state.update(|s| s.sample_num = progress.sample_num);

        if progress.converged {
            let elapsed = self.timer.stop(Instant::now());
            self.params.state.update(|s| s.last_frame_time = elapsed);
            tracing::info!(
                samples = progress.sample_num,
                frame_time_ms = elapsed.map_or(0.0, |t| t.as_secs_f64() * 1000.0),
                "image converged"
            );
        }

        Ok(TickOutcome::Accumulated { batch, converged: progress.converged })
    }

    fn dispatch(&mut self, batch: Batch) -> Result<()> {
        self.buffers.settle(&mut self.device)?;
        self.params.flush_all(&mut self.device)?;

        let (width, height) = self.buffers.dimensions();
        let args = KernelArgs::<D> {
            config: self.params.config.buffer(),
            state: self.params.state.buffer(),
            read: self.buffers.read(),
            write: self.buffers.write(),
            square_samples: self.pools.square(),
            disk_samples: self.pools.disk(),
            num_sample_sets: self.pools.num_sets(),
            cycle: self.cycle,
            sample_start: batch.start,
            batch_size: batch.size,
            width,
            height,
        };
        tracing::trace!(start = batch.start, size = batch.size, "dispatch");
        self.device.dispatch(&args)
    }

    fn update_state(&mut self, restart: bool, f: impl FnOnce(&mut State)) {
        let mut next = self.params.state.get().clone();
        f(&mut next);
        if &next == self.params.state.get() {
            return;
        }
        self.params.state.update(|s| *s = next);
        if restart {
            self.restart();
        }
    }

    fn update_config(&mut self, restart: bool, f: impl FnOnce(&mut Configuration)) {
        let mut next = self.params.config.get().clone();
        f(&mut next);
        if &next == self.params.config.get() {
            return;
        }
        self.params.config.update(|c| *c = next);
        if restart {
            self.restart();
        }
    }
}
