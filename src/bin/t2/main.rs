//! t2 - progressive renderer, headless driver.
//!
//! Renders one image to convergence on the chosen backend, logging progress,
//! and optionally writes it to disk.

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use t2::cli::{self, Backend, CliOptions, Invocation};
use t2::export::save_image;
use t2::prelude::*;
use t2::render::status_line;

/// Logs the overlay status line whenever it changes.
#[derive(Default)]
struct LogPresenter {
    last: Option<String>,
}

impl<D: ComputeDevice> Presenter<D> for LogPresenter {
    fn render(&mut self, _device: &mut D, frame: FrameView<'_, D::Image>) -> t2::Result<()> {
        if let Some(line) = frame.overlay() {
            if self.last.as_deref() != Some(line.as_str()) {
                tracing::debug!(status = %line);
                self.last = Some(line);
            }
        }
        Ok(())
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match cli::parse_args(&args) {
        Ok(Invocation::Help) => {
            print!("{}", cli::usage());
            return;
        }
        Ok(Invocation::Run(options)) => options,
        Err(e) => {
            eprintln!("Error: {e}\n");
            eprint!("{}", cli::usage());
            std::process::exit(1);
        }
    };

    let code = {
        let _trace_guard = init_tracing(options.config.log_level);
        match run(options) {
            Ok(()) => 0,
            Err(e) => {
                tracing::error!("{e:#}");
                eprintln!("Error: {e:#}");
                1
            }
        }
    };
    std::process::exit(code);
}

/// fmt output filtered by the configured level (`RUST_LOG` wins), plus a
/// Chrome trace when `T2_TRACE=1`.
fn init_tracing(level: LogLevel) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level.as_tracing()).into())
        .from_env_lossy();

    let (chrome_layer, guard) = if std::env::var("T2_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(chrome_layer)
        .init();

    guard
}

fn run(options: CliOptions) -> Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("T2_COMMIT"),
        built = env!("T2_BUILD_DATE"),
        backend = %options.backend,
        "t2"
    );

    match options.backend {
        Backend::Cpu => {
            if options.kernel.is_some() {
                tracing::warn!("--kernel only applies to the gpu backend, ignored");
            }
            render(CpuDevice::new(PreviewKernel), &options)
        }
        Backend::Gpu => run_gpu(&options),
    }
}

#[cfg(feature = "gpu")]
fn run_gpu(options: &CliOptions) -> Result<()> {
    let device = WgpuDevice::new(options.kernel.as_deref()).context("failed to initialize GPU")?;
    render(device, options)
}

#[cfg(not(feature = "gpu"))]
fn run_gpu(_options: &CliOptions) -> Result<()> {
    anyhow::bail!("built without the `gpu` feature, use --backend cpu")
}

fn render<D: ComputeDevice>(device: D, options: &CliOptions) -> Result<()> {
    if options.config.fullscreen {
        tracing::debug!("fullscreen has no effect in headless mode");
    }

    let mut session = Session::new(device, options.config.clone()).context("failed to create render session")?;
    let mut presenter = LogPresenter::default();

    loop {
        let outcome = session.tick().context("render tick failed")?;
        session.present(&mut presenter)?;
        match outcome {
            TickOutcome::Accumulated { converged: false, .. } => {}
            TickOutcome::Paused => {
                tracing::warn!("started paused, nothing accumulated");
                break;
            }
            TickOutcome::Accumulated { converged: true, .. } | TickOutcome::Converged => break,
        }
    }

    tracing::info!(status = %status_line(session.config(), session.state()), "finished");

    if let Some(path) = &options.output {
        let pixels = session.read_display().context("failed to read back image")?;
        let (width, height) = session.buffers().dimensions();
        save_image(path, width, height, &pixels).with_context(|| format!("failed to write {}", path.display()))?;
    }

    session.shutdown();
    Ok(())
}
