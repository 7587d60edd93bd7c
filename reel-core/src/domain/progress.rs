//! Progress windows
//!
//! Every pipeline stage owns a fixed slice of the job's 0-100 progress
//! range. A stage reports a completion fraction inside its slice and the
//! orchestrator translates it into the absolute value it persists.

use serde::{Deserialize, Serialize};

/// Inclusive `[low, high]` progress range owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressWindow {
    pub low: u8,
    pub high: u8,
}

impl ProgressWindow {
    pub const SCRIPTING: ProgressWindow = ProgressWindow::new(0, 15);
    pub const IMAGING: ProgressWindow = ProgressWindow::new(15, 40);
    pub const NARRATING: ProgressWindow = ProgressWindow::new(40, 55);
    pub const CODEGEN: ProgressWindow = ProgressWindow::new(55, 70);
    pub const RENDERING: ProgressWindow = ProgressWindow::new(70, 95);
    pub const FINALIZE: ProgressWindow = ProgressWindow::new(95, 100);

    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    /// Absolute progress for a completion fraction inside this window.
    ///
    /// Fractions are clamped to `[0, 1]` and NaN counts as zero. The value is
    /// floored so a stage never reports its upper bound before it is done.
    pub fn at(&self, fraction: f64) -> u8 {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let span = f64::from(self.high - self.low);
        self.low + (fraction * span).floor() as u8
    }
}

/// Which tenth of a stage has been completed, `0..=10`.
pub fn decile(fraction: f64) -> u8 {
    if fraction.is_nan() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * 10.0).floor() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_maps_fraction_onto_its_range() {
        let window = ProgressWindow::RENDERING;
        assert_eq!(window.at(0.0), 70);
        assert_eq!(window.at(0.4), 80);
        assert_eq!(window.at(1.0), 95);
    }

    #[test]
    fn test_window_clamps_out_of_range_fractions() {
        let window = ProgressWindow::IMAGING;
        assert_eq!(window.at(-3.0), 15);
        assert_eq!(window.at(7.5), 40);
        assert_eq!(window.at(f64::NAN), 15);
    }

    #[test]
    fn test_decile() {
        assert_eq!(decile(0.0), 0);
        assert_eq!(decile(0.09), 0);
        assert_eq!(decile(0.1), 1);
        assert_eq!(decile(0.95), 9);
        assert_eq!(decile(1.0), 10);
        assert_eq!(decile(2.0), 10);
    }
}
