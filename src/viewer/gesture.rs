use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Touch,
    Mouse,
}

/// Detects double taps and double clicks.
///
/// Touch input is followed by a synthesized mouse click on most hosts; a mouse
/// event inside the window of a touch belongs to the same interaction and is
/// dropped so the two handlers never both fire.
#[derive(Debug, Clone)]
pub struct TapDetector {
    window: Duration,
    last: Option<(PointerKind, Instant)>,
    last_touch: Option<Instant>,
}

impl TapDetector {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: None,
            last_touch: None,
        }
    }

    /// Returns `true` when `at` completes a double tap.
    pub fn register(&mut self, kind: PointerKind, at: Instant) -> bool {
        match kind {
            PointerKind::Touch => self.last_touch = Some(at),
            PointerKind::Mouse => {
                if self.within_window(self.last_touch, at) {
                    return false;
                }
            }
        }

        match self.last {
            Some((previous, started)) if previous == kind && self.within_window(Some(started), at) => {
                self.last = None;
                true
            }
            _ => {
                self.last = Some((kind, at));
                false
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.last_touch = None;
    }

    fn within_window(&self, earlier: Option<Instant>, at: Instant) -> bool {
        earlier.is_some_and(|earlier| {
            at.checked_duration_since(earlier)
                .is_some_and(|gap| gap <= self.window)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelAction {
    /// Not a pointing-device viewport; the host keeps its default scrolling.
    Ignored,
    /// Swallowed by the debounce window. Default scrolling is still suppressed.
    Suppressed,
    Next,
    Prev,
}

#[derive(Debug, Clone)]
pub struct WheelNavigator {
    debounce: Duration,
    min_viewport_px: u32,
    last_flip: Option<Instant>,
}

impl WheelNavigator {
    pub fn new(debounce: Duration, min_viewport_px: u32) -> Self {
        Self {
            debounce,
            min_viewport_px,
            last_flip: None,
        }
    }

    pub fn handle(&mut self, viewport_width: f64, delta_y: f64, at: Instant) -> WheelAction {
        if viewport_width < f64::from(self.min_viewport_px) {
            return WheelAction::Ignored;
        }
        if delta_y == 0.0 || !delta_y.is_finite() {
            return WheelAction::Suppressed;
        }
        let debounced = self.last_flip.is_some_and(|last| {
            at.checked_duration_since(last)
                .is_none_or(|gap| gap < self.debounce)
        });
        if debounced {
            return WheelAction::Suppressed;
        }

        self.last_flip = Some(at);
        if delta_y > 0.0 {
            WheelAction::Next
        } else {
            WheelAction::Prev
        }
    }

    pub fn reset(&mut self) {
        self.last_flip = None;
    }
}
