//! Severity bands, colors, and value formatting.
//!
//! Band and ratio logic is pure so it can be unit tested without a
//! terminal. Temperature is judged on absolute degrees; pressure metrics
//! (utilization, memory, power) on percentage of capacity.

use crossterm::style::Color;

/// Severity classification for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Green,
    Yellow,
    Red,
}

impl Band {
    /// Terminal color for this band.
    #[must_use]
    pub fn color(self) -> Color {
        match self {
            Band::Green => Color::Green,
            Band::Yellow => Color::Yellow,
            Band::Red => Color::Red,
        }
    }
}

/// Neutral accent for activity bars (GPU utilization), visually distinct
/// from the pressure bands.
pub const ACCENT: Color = Color::Cyan;

/// Color for placeholder segments ("N/A") and the footer.
pub const MUTED: Color = Color::DarkGrey;

/// Temperature band: green below 60 degC, yellow from 60, red from 80.
#[must_use]
pub fn temp_band(celsius: f64) -> Band {
    if celsius >= 80.0 {
        Band::Red
    } else if celsius >= 60.0 {
        Band::Yellow
    } else {
        Band::Green
    }
}

/// Pressure band for capacity percentages: green below 70, yellow from 70
/// through 90, red above 90.
#[must_use]
pub fn pressure_band(pct: f64) -> Band {
    if pct > 90.0 {
        Band::Red
    } else if pct >= 70.0 {
        Band::Yellow
    } else {
        Band::Green
    }
}

/// Color for a GPU-utilization bar: the neutral accent, unless the value
/// crosses into the red band, which overrides it.
#[must_use]
pub fn utilization_color(pct: f64) -> Color {
    if pressure_band(pct) == Band::Red {
        Band::Red.color()
    } else {
        ACCENT
    }
}

/// Ratio of value to scale, clamped to [0, 1]. Non-finite values and
/// non-positive scales collapse to 0 rather than poisoning the layout.
#[must_use]
pub fn ratio(value: f64, scale: f64) -> f64 {
    if !value.is_finite() || !scale.is_finite() || scale <= 0.0 {
        return 0.0;
    }
    (value / scale).clamp(0.0, 1.0)
}

/// Filled cell count for a bar of `len` cells: `floor(r * len)`, never
/// exceeding `len`.
#[must_use]
pub fn fill_cells(r: f64, len: usize) -> usize {
    ((r.clamp(0.0, 1.0) * len as f64) as usize).min(len)
}

/// Formats MiB for display: plain MB below 1 GiB, fractional GB above.
#[must_use]
pub fn format_mib(mib: u64) -> String {
    if mib < 1024 {
        format!("{mib}MB")
    } else {
        format!("{:.2}GB", mib as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_temp_band_boundaries() {
        assert_eq!(temp_band(59.9), Band::Green);
        assert_eq!(temp_band(60.0), Band::Yellow);
        assert_eq!(temp_band(79.9), Band::Yellow);
        assert_eq!(temp_band(80.0), Band::Red);
    }

    #[test]
    fn test_pressure_band_boundaries() {
        assert_eq!(pressure_band(69.9), Band::Green);
        assert_eq!(pressure_band(70.0), Band::Yellow);
        assert_eq!(pressure_band(90.0), Band::Yellow);
        assert_eq!(pressure_band(90.1), Band::Red);
    }

    #[test]
    fn test_utilization_accent_with_red_override() {
        assert_eq!(utilization_color(40.0), ACCENT);
        assert_eq!(utilization_color(85.0), ACCENT);
        assert_eq!(utilization_color(95.0), Band::Red.color());
    }

    #[test]
    fn test_ratio_clamps() {
        assert_relative_eq!(ratio(50.0, 100.0), 0.5);
        assert_relative_eq!(ratio(150.0, 100.0), 1.0);
        assert_relative_eq!(ratio(-10.0, 100.0), 0.0);
    }

    #[test]
    fn test_ratio_degenerate_inputs() {
        assert_eq!(ratio(50.0, 0.0), 0.0);
        assert_eq!(ratio(50.0, -1.0), 0.0);
        assert_eq!(ratio(f64::NAN, 100.0), 0.0);
        assert_eq!(ratio(f64::INFINITY, 100.0), 0.0);
        assert_eq!(ratio(50.0, f64::NAN), 0.0);
    }

    #[test]
    fn test_fill_cells_floors_and_bounds() {
        assert_eq!(fill_cells(0.0, 49), 0);
        assert_eq!(fill_cells(0.4, 49), 19);
        assert_eq!(fill_cells(1.0, 49), 49);
        assert_eq!(fill_cells(2.0, 49), 49);
        assert_eq!(fill_cells(0.999, 10), 9);
    }

    #[test]
    fn test_format_mib() {
        assert_eq!(format_mib(500), "500MB");
        assert_eq!(format_mib(1023), "1023MB");
        assert_eq!(format_mib(2000), "1.95GB");
        assert_eq!(format_mib(8000), "7.81GB");
    }
}
