//! Per-device metric records and cross-device aggregates.
//!
//! A [`DeviceMetric`] is built fresh from one line of query output each
//! tick and never mutated afterwards; [`Aggregate`] values are recomputed
//! from the full device list every tick and never persisted.

/// One GPU's sample at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceMetric {
    /// Stable device ordinal for the session.
    pub index: u32,
    /// Display name, e.g. "NVIDIA GeForce RTX 4090".
    pub name: String,
    /// Core temperature in Celsius; `None` when the sensor is unsupported.
    pub temperature_c: Option<i64>,
    /// GPU utilization percentage, 0-100.
    pub utilization_pct: u8,
    /// VRAM used in MiB. Never exceeds `memory_total_mib`.
    pub memory_used_mib: u64,
    /// VRAM total in MiB.
    pub memory_total_mib: u64,
    /// Power draw in watts; 0.0 when the board does not report it.
    pub power_draw_w: f64,
    /// Enforced power limit in watts; `None` when unsupported.
    pub power_limit_w: Option<f64>,
}

impl DeviceMetric {
    /// Fraction of VRAM in use, in [0, 1].
    #[must_use]
    pub fn memory_fraction(&self) -> f64 {
        if self.memory_total_mib == 0 {
            return 0.0;
        }
        self.memory_used_mib as f64 / self.memory_total_mib as f64
    }

    /// Formats the metric back into the query record shape accepted by the
    /// parser: same field order, comma separated, `[N/A]` for absent values.
    #[must_use]
    pub fn to_record(&self) -> String {
        let temp = match self.temperature_c {
            Some(t) => t.to_string(),
            None => "[N/A]".to_string(),
        };
        let limit = match self.power_limit_w {
            Some(w) => format!("{w:.2}"),
            None => "[N/A]".to_string(),
        };
        format!(
            "{}, {}, {}, {}, {}, {}, {:.2}, {}",
            self.index,
            self.name,
            temp,
            self.utilization_pct,
            self.memory_used_mib,
            self.memory_total_mib,
            self.power_draw_w,
            limit
        )
    }
}

/// Cross-device totals and means, recomputed every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    /// Sum of VRAM used across devices, MiB.
    pub memory_used_mib: u64,
    /// Sum of VRAM capacity across devices, MiB.
    pub memory_total_mib: u64,
    /// Mean GPU utilization percentage.
    pub mean_utilization_pct: f64,
    /// Sum of power draw across devices, watts.
    pub total_power_draw_w: f64,
    /// Sum of power limits over devices that report one; `None` if none do.
    pub total_power_limit_w: Option<f64>,
    /// Mean temperature over devices that report one; `None` if none do.
    pub mean_temperature_c: Option<f64>,
}

impl Aggregate {
    /// Derives aggregates from a device list. Returns `None` for an empty
    /// list: there is nothing meaningful to gauge.
    #[must_use]
    pub fn from_devices(devices: &[DeviceMetric]) -> Option<Self> {
        if devices.is_empty() {
            return None;
        }

        let memory_used_mib = devices.iter().map(|d| d.memory_used_mib).sum();
        let memory_total_mib = devices.iter().map(|d| d.memory_total_mib).sum();
        let mean_utilization_pct =
            devices.iter().map(|d| f64::from(d.utilization_pct)).sum::<f64>()
                / devices.len() as f64;
        let total_power_draw_w = devices.iter().map(|d| d.power_draw_w).sum();

        let limits: Vec<f64> = devices.iter().filter_map(|d| d.power_limit_w).collect();
        let total_power_limit_w =
            if limits.is_empty() { None } else { Some(limits.iter().sum()) };

        let temps: Vec<f64> =
            devices.iter().filter_map(|d| d.temperature_c).map(|t| t as f64).collect();
        let mean_temperature_c = if temps.is_empty() {
            None
        } else {
            Some(temps.iter().sum::<f64>() / temps.len() as f64)
        };

        Some(Self {
            memory_used_mib,
            memory_total_mib,
            mean_utilization_pct,
            total_power_draw_w,
            total_power_limit_w,
            mean_temperature_c,
        })
    }
}
