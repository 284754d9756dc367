//! Input commands and held-control tracking.

/// A tracked control. Every `u8` index is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Key(u8),
    Mouse(u8),
}

/// 256-bit press mask, one bit per `u8` index.
type Mask = [u64; 4];

/// Press state of keyboard keys and mouse buttons as two bitmasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldInputs {
    keys: Mask,
    mouse: Mask,
}

impl HeldInputs {
    pub fn press(&mut self, control: Control) {
        let (mask, index) = self.mask_mut(control);
        mask[index as usize / 64] |= 1u64 << (index % 64);
    }

    pub fn release(&mut self, control: Control) {
        let (mask, index) = self.mask_mut(control);
        mask[index as usize / 64] &= !(1u64 << (index % 64));
    }

    /// Any key or button down. Which one does not matter.
    pub fn any(&self) -> bool {
        self.keys.iter().chain(&self.mouse).any(|&word| word != 0)
    }

    fn mask_mut(&mut self, control: Control) -> (&mut Mask, u8) {
        match control {
            Control::Key(k) => (&mut self.keys, k),
            Control::Mouse(b) => (&mut self.mouse, b),
        }
    }
}

/// A user action, applied at the start of the next tick in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Turn the camera about the up axis (radians).
    RotateHeading(f32),
    /// Move right by `dx` and forward by `dz`.
    Translate { dx: f32, dz: f32 },
    AdjustLensRadius(f32),
    AdjustTraceDepth(i32),
    AdjustSampleRoot(i32),
    AdjustBatchSize(i32),
    ToggleOverlay,
    TogglePause,
    Press(Control),
    Release(Control),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_control_counts() {
        let mut held = HeldInputs::default();
        assert!(!held.any());

        held.press(Control::Key(3));
        assert!(held.any());
        held.press(Control::Mouse(0));
        held.release(Control::Key(3));
        assert!(held.any());
        held.release(Control::Mouse(0));
        assert!(!held.any());
    }

    #[test]
    fn test_release_of_unpressed_is_harmless() {
        let mut held = HeldInputs::default();
        held.release(Control::Key(7));
        assert!(!held.any());
        held.press(Control::Key(7));
        held.press(Control::Key(7));
        held.release(Control::Key(7));
        assert!(!held.any());
    }

    #[test]
    fn test_high_indices_are_tracked() {
        let mut held = HeldInputs::default();
        for index in [31, 32, 63, 64, 87, 200, 255] {
            held.press(Control::Key(index));
            assert!(held.any(), "key {index}");
            held.release(Control::Key(index));
            assert!(!held.any(), "key {index}");
        }

        held.press(Control::Mouse(200));
        held.press(Control::Key(64));
        held.release(Control::Key(0));
        held.release(Control::Key(63));
        assert!(held.any());
        held.release(Control::Mouse(200));
        held.release(Control::Key(64));
        assert!(!held.any());
    }
}
