//! Presentation hook and the overlay status line.

use crate::config::Configuration;
use crate::util::Result;

use super::device::ComputeDevice;
use super::state::State;

/// Everything a presenter may show for one loop iteration.
pub struct FrameView<'a, I> {
    /// Image holding the latest accumulated result.
    pub image: &'a I,
    pub config: &'a Configuration,
    pub state: &'a State,
}

impl<I> FrameView<'_, I> {
    /// Overlay text, or `None` when the overlay is hidden.
    pub fn overlay(&self) -> Option<String> {
        self.state.show_overlay.then(|| status_line(self.config, self.state))
    }
}

/// Receives the display image once per loop iteration, whatever the phase.
pub trait Presenter<D: ComputeDevice> {
    fn render(&mut self, device: &mut D, frame: FrameView<'_, D::Image>) -> Result<()>;
}

/// `"12/16 samples | radius 0.000000 | depth 5"`, plus the frame time once measured.
pub fn status_line(config: &Configuration, state: &State) -> String {
    let total = config.samples_per_pixel();
    let mut line = format!(
        "{}/{} sample{} | radius {:.6} | depth {}",
        state.sample_num,
        total,
        if total == 1 { "" } else { "s" },
        state.lens_radius,
        config.trace_depth,
    );
    if config.paused && state.sample_num < total {
        line.push_str(" | paused");
    }
    if let Some(t) = state.last_frame_time {
        line.push_str(&format!(" | frame {:.3}s", t.as_secs_f64()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_line() {
        let config = Configuration::default();
        let state = State { sample_num: 12, ..Default::default() };
        assert_eq!(status_line(&config, &state), "12/16 samples | radius 0.000000 | depth 5");
    }

    #[test]
    fn test_status_line_singular_and_timed() {
        let config = Configuration { sample_root: 1, trace_depth: 2, ..Default::default() };
        let state = State {
            sample_num: 1,
            lens_radius: 0.25,
            last_frame_time: Some(Duration::from_millis(1234)),
            ..Default::default()
        };
        assert_eq!(
            status_line(&config, &state),
            "1/1 sample | radius 0.250000 | depth 2 | frame 1.234s"
        );
    }

    #[test]
    fn test_status_line_paused() {
        let config = Configuration { paused: true, ..Default::default() };
        let state = State::default();
        assert!(status_line(&config, &state).ends_with("| paused"));
    }

    #[test]
    fn test_hidden_overlay() {
        let config = Configuration::default();
        let state = State { show_overlay: false, ..Default::default() };
        let view = FrameView { image: &(), config: &config, state: &state };
        assert_eq!(view.overlay(), None);
    }
}
