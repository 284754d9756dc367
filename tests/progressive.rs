//! End-to-end accumulation scenarios on the CPU reference device.

use t2::backend::{ConstantKernel, CpuDevice, Kernel, PreviewKernel, SampleContext, SampleIndexKernel};
use t2::config::Configuration;
use t2::render::{Batch, Command, ComputeDevice, Control, FrameView, Phase, Presenter, Session, TickOutcome};
use t2::Error;

const SEED: u64 = 0x5eed;

fn config(sample_root: u32, batch_size: u32) -> Configuration {
    Configuration {
        width: 8,
        height: 6,
        sample_root,
        batch_size,
        ..Default::default()
    }
}

fn session<K: Kernel>(kernel: K, config: Configuration) -> Session<CpuDevice<K>> {
    Session::with_seed(CpuDevice::new(kernel), config, SEED).unwrap()
}

fn batch(outcome: TickOutcome) -> Batch {
    match outcome {
        TickOutcome::Accumulated { batch, .. } => batch,
        other => panic!("expected a dispatch, got {other:?}"),
    }
}

#[test]
fn test_constant_kernel_converges_to_constant() {
    let value = [0.25, 0.5, 0.75, 1.0];
    let mut session = session(ConstantKernel(value), config(4, 4));

    assert_eq!(session.run_to_convergence(100).unwrap(), 4);
    assert_eq!(session.device().dispatches(), &[(0, 4), (4, 4), (8, 4), (12, 4)]);
    assert_eq!(session.phase(), Phase::Converged);
    assert_eq!(session.sample_num(), 16);
    assert_eq!(session.state().sample_num, 16);

    let pixels = session.read_display().unwrap();
    assert_eq!(pixels.len(), 8 * 6);
    assert!(pixels.iter().all(|&p| p == value));
}

#[test]
fn test_running_average_with_clamped_last_batch() {
    let mut session = session(SampleIndexKernel, config(4, 6));

    assert_eq!(session.run_to_convergence(100).unwrap(), 3);
    assert_eq!(session.device().dispatches(), &[(0, 6), (6, 6), (12, 4)]);

    // Mean of sample indices 0..16
    let pixels = session.read_display().unwrap();
    assert!(pixels.iter().all(|&p| p == [7.5; 4]));
}

#[test]
fn test_each_pixel_consumes_one_stratified_set() {
    let kernel = |ctx: &SampleContext<'_>| [ctx.square[0], ctx.square[1], 0.0, 1.0];
    let mut session = session(kernel, config(4, 16));
    session.run_to_convergence(10).unwrap();

    // Every column and row of the 4×4 grid is hit four times
    for p in session.read_display().unwrap() {
        assert!((0.375..=0.625).contains(&p[0]), "x mean {}", p[0]);
        assert!((0.375..=0.625).contains(&p[1]), "y mean {}", p[1]);
    }
}

#[test]
fn test_camera_move_restarts() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));
    session.tick().unwrap();
    session.tick().unwrap();
    assert_eq!(session.sample_num(), 8);

    session.submit(Command::RotateHeading(0.1));
    assert_eq!(batch(session.tick().unwrap()), Batch { start: 0, size: 4 });
    assert_eq!(session.sample_num(), 4);

    session.submit(Command::Translate { dx: 0.0, dz: 0.2 });
    assert!(batch(session.tick().unwrap()).is_first());

    session.submit(Command::AdjustLensRadius(0.1));
    assert!(batch(session.tick().unwrap()).is_first());

    session.submit(Command::AdjustTraceDepth(1));
    assert!(batch(session.tick().unwrap()).is_first());
    assert_eq!(session.config().trace_depth, 6);
}

#[test]
fn test_no_op_mutations_keep_progress() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));
    session.tick().unwrap();

    // Lens radius is already zero
    session.submit(Command::AdjustLensRadius(-1.0));
    session.submit(Command::ToggleOverlay);
    session.submit(Command::AdjustBatchSize(2));
    assert_eq!(batch(session.tick().unwrap()), Batch { start: 4, size: 6 });
    assert!(!session.state().show_overlay);
    assert_eq!(session.state().lens_radius, 0.0);
}

#[test]
fn test_sample_root_change_regenerates_pool() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));
    session.tick().unwrap();
    let live = session.device().live_buffers();

    session.submit(Command::AdjustSampleRoot(1));
    assert_eq!(batch(session.tick().unwrap()), Batch { start: 0, size: 4 });
    assert_eq!(session.config().sample_root, 5);
    assert_eq!(session.sample_target(), 25);
    assert_eq!(session.pools().sample_root(), 5);
    assert_eq!(session.device().live_buffers(), live);

    assert_eq!(session.run_to_convergence(100).unwrap(), 6);
    assert_eq!(session.sample_num(), 25);
}

#[test]
fn test_sample_root_is_clamped() {
    let mut session = session(ConstantKernel([1.0; 4]), config(1, 4));
    session.run_to_convergence(10).unwrap();

    session.adjust_sample_root(-3).unwrap();
    assert_eq!(session.config().sample_root, 1);
    assert!(session.is_converged());

    session.set_sample_root(32).unwrap();
    session.adjust_sample_root(5).unwrap();
    assert_eq!(session.config().sample_root, 32);
    assert_eq!(session.sample_target(), 1024);
}

#[test]
fn test_failed_pool_regeneration_keeps_old_pool() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));
    session.tick().unwrap();

    let live = session.device().live_buffers();
    session.device_mut().set_buffer_limit(Some(live));
    let err = session.adjust_sample_root(1);
    assert!(matches!(err, Err(Error::Allocation { .. })));

    assert_eq!(session.config().sample_root, 4);
    assert_eq!(session.pools().sample_root(), 4);
    assert_eq!(session.sample_num(), 4);

    session.device_mut().set_buffer_limit(None);
    assert_eq!(batch(session.tick().unwrap()), Batch { start: 4, size: 4 });
}

#[test]
fn test_held_input_throttles_without_touching_config() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));

    session.submit(Command::Press(Control::Key(17)));
    assert_eq!(batch(session.tick().unwrap()).size, 1);
    assert_eq!(session.effective_batch_size(), 1);
    session.submit(Command::Press(Control::Mouse(0)));
    session.submit(Command::Release(Control::Key(17)));
    assert_eq!(batch(session.tick().unwrap()).size, 1);
    assert_eq!(session.config().batch_size, 4);

    session.submit(Command::Release(Control::Mouse(0)));
    assert_eq!(batch(session.tick().unwrap()), Batch { start: 2, size: 4 });
    session.run_to_convergence(10).unwrap();
    assert_eq!(session.device().dispatches(), &[(0, 1), (1, 1), (2, 4), (6, 4), (10, 4), (14, 2)]);

    // Uploaded once at the first dispatch, never again
    let config_buffer = session.params().config.buffer();
    assert_eq!(session.device().write_count(config_buffer), 1);
}

#[test]
fn test_any_held_key_code_throttles() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));

    for key in [87, 200, 255] {
        session.submit(Command::Press(Control::Key(key)));
        assert_eq!(batch(session.tick().unwrap()).size, 1, "key {key}");
        session.submit(Command::Release(Control::Key(key)));
    }
    session.submit(Command::Press(Control::Mouse(64)));
    assert_eq!(batch(session.tick().unwrap()).size, 1);
    session.submit(Command::Release(Control::Mouse(64)));
    assert_eq!(batch(session.tick().unwrap()), Batch { start: 4, size: 4 });
}

#[test]
fn test_restart_draws_new_samples() {
    let kernel = |ctx: &SampleContext<'_>| [ctx.square[0], ctx.square[1], ctx.disk[0], ctx.disk[1]];
    let mut session = session(kernel, config(4, 1));

    session.tick().unwrap();
    let mut seen = vec![session.read_display().unwrap()];
    for cycle in 1..=5 {
        session.submit(Command::RotateHeading(0.01));
        assert!(batch(session.tick().unwrap()).is_first());
        assert_eq!(session.cycle(), cycle);

        let first_batch = session.read_display().unwrap();
        assert!(!seen.contains(&first_batch), "cycle {cycle} repeated an earlier cycle");
        seen.push(first_batch);
    }
}

#[test]
fn test_converged_session_is_idle() {
    let mut session = session(ConstantKernel([1.0; 4]), config(4, 4));
    session.run_to_convergence(100).unwrap();

    // Config and state at the first dispatch, state after each later one
    assert_eq!(session.device().transfers(), 5);

    assert_eq!(session.tick().unwrap(), TickOutcome::Converged);
    assert_eq!(session.tick().unwrap(), TickOutcome::Converged);
    assert_eq!(session.device().transfers(), 5);
    assert_eq!(session.device().dispatches().len(), 4);
    assert_eq!(session.device().copies(), 4);
}

#[test]
fn test_pause_keeps_progress() {
    let mut session = session(SampleIndexKernel, config(4, 4));
    session.tick().unwrap();

    session.submit(Command::TogglePause);
    assert_eq!(session.tick().unwrap(), TickOutcome::Paused);
    assert_eq!(session.tick().unwrap(), TickOutcome::Paused);
    assert_eq!(session.sample_num(), 4);

    session.submit(Command::TogglePause);
    assert_eq!(batch(session.tick().unwrap()).start, 4);
    session.run_to_convergence(10).unwrap();
    assert!(session.read_display().unwrap().iter().all(|&p| p == [7.5; 4]));
}

#[test]
fn test_frame_time_measured_per_cycle() {
    let mut session = session(ConstantKernel([1.0; 4]), config(2, 2));
    assert_eq!(session.state().last_frame_time, None);

    session.run_to_convergence(10).unwrap();
    assert!(session.state().last_frame_time.is_some());

    session.submit(Command::AdjustTraceDepth(1));
    session.tick().unwrap();
    assert_eq!(session.state().last_frame_time, None);
    session.tick().unwrap();
    assert!(session.state().last_frame_time.is_some());
}

#[test]
fn test_dispatch_failure_restarts_cycle() {
    let mut session = session(SampleIndexKernel, config(4, 4));
    session.tick().unwrap();
    session.tick().unwrap();

    session.device_mut().fail_next_dispatch();
    assert!(matches!(session.tick(), Err(Error::Dispatch(_))));
    assert_eq!(session.sample_num(), 0);

    session.run_to_convergence(10).unwrap();
    assert!(session.read_display().unwrap().iter().all(|&p| p == [7.5; 4]));
}

#[derive(Default)]
struct CountingPresenter {
    frames: usize,
    overlays: Vec<String>,
}

impl<D: ComputeDevice> Presenter<D> for CountingPresenter {
    fn render(&mut self, _device: &mut D, frame: FrameView<'_, D::Image>) -> t2::Result<()> {
        self.frames += 1;
        self.overlays.extend(frame.overlay());
        Ok(())
    }
}

#[test]
fn test_presenter_called_every_tick() {
    let mut session = session(ConstantKernel([1.0; 4]), config(2, 2));
    let mut presenter = CountingPresenter::default();

    for _ in 0..4 {
        session.tick().unwrap();
        session.present(&mut presenter).unwrap();
    }
    assert_eq!(presenter.frames, 4);
    assert_eq!(presenter.overlays[0], "2/4 samples | radius 0.000000 | depth 5");
    assert!(presenter.overlays[1].starts_with("4/4 samples"));
    assert!(presenter.overlays[3].contains("| frame "));

    session.toggle_overlay();
    session.present(&mut presenter).unwrap();
    assert_eq!(presenter.frames, 5);
    assert_eq!(presenter.overlays.len(), 4);
}

#[test]
fn test_same_seed_same_image() {
    let render = || {
        let mut session = session(PreviewKernel, config(3, 4));
        session.adjust_lens_radius(0.2);
        session.run_to_convergence(100).unwrap();
        session.read_display().unwrap()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_invalid_configuration_rejected() {
    let result = Session::with_seed(CpuDevice::new(ConstantKernel([0.0; 4])), config(0, 4), SEED);
    assert!(matches!(result, Err(Error::InvalidSampleRoot(0))));
}

#[test]
fn test_shutdown_releases_buffers() {
    let mut session = session(ConstantKernel([1.0; 4]), config(2, 4));
    session.run_to_convergence(10).unwrap();
    let device = session.shutdown();
    assert_eq!(device.live_buffers(), 0);
}
