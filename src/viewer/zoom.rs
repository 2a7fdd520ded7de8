pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 1.5;
pub const ZOOM_STEP: f32 = 0.1;
pub const TOGGLE_ZOOM: f32 = 1.4;

pub(crate) fn zoom_eq(left: f32, right: f32) -> bool {
    (left - right).abs() <= 0.0005
}

/// Visual scale applied on top of the base layout. Never feeds back into layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    scale: f32,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl ZoomState {
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set(self.scale + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set(self.scale - ZOOM_STEP)
    }

    pub fn reset(&mut self) -> f32 {
        self.set(1.0)
    }

    /// Double-tap behavior: 1.0 goes to 1.4, anything else returns to 1.0.
    pub fn toggle(&mut self) -> f32 {
        if zoom_eq(self.scale, 1.0) {
            self.set(TOGGLE_ZOOM)
        } else {
            self.set(1.0)
        }
    }

    pub fn set(&mut self, scale: f32) -> f32 {
        let scale = if scale.is_finite() { scale } else { 1.0 };
        // Snap to the step grid so repeated steps do not drift.
        self.scale = ((scale / ZOOM_STEP).round() * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_ZOOM, MIN_ZOOM, ZoomState, zoom_eq};

    #[test]
    fn steps_are_clamped_to_range() {
        let mut zoom = ZoomState::default();
        for _ in 0..20 {
            zoom.zoom_in();
        }
        assert!(zoom_eq(zoom.scale(), MAX_ZOOM));

        for _ in 0..20 {
            zoom.zoom_out();
        }
        assert!(zoom_eq(zoom.scale(), MIN_ZOOM));

        zoom.reset();
        assert!(zoom_eq(zoom.scale(), 1.0));
    }

    #[test]
    fn repeated_steps_do_not_drift() {
        let mut zoom = ZoomState::default();
        zoom.zoom_in();
        zoom.zoom_in();
        zoom.zoom_in();
        zoom.zoom_out();
        assert!(zoom_eq(zoom.scale(), 1.2));
    }

    #[test]
    fn toggle_switches_between_one_and_one_point_four() {
        let mut zoom = ZoomState::default();
        assert!(zoom_eq(zoom.toggle(), 1.4));
        assert!(zoom_eq(zoom.toggle(), 1.0));

        zoom.set(0.7);
        assert!(zoom_eq(zoom.toggle(), 1.0));
        assert!(zoom_eq(zoom.set(f32::NAN), 1.0));
    }
}
