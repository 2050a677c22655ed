//! GPU telemetry sampling via the external query command.
//!
//! Each sample is one `nvidia-smi --query-gpu=... --format=csv,noheader,nounits`
//! invocation. The fixed field set and header-free CSV keep line-by-line
//! parsing deterministic across driver versions and locales.

use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::metrics::DeviceMetric;
use crate::subprocess;

/// Fields requested from the query command, one device record per line.
pub const QUERY_FIELDS: &str =
    "index,name,temperature.gpu,utilization.gpu,memory.used,memory.total,power.draw,power.limit";

const FIELD_COUNT: usize = 8;

/// Budget for one external invocation. A driver stuck in reset can wedge
/// nvidia-smi far longer than any sane query takes.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Markers the query command emits for unsupported or unreadable fields.
const SENTINELS: &[&str] = &["", "N/A", "[N/A]", "[Not Supported]", "[Unknown Error]"];

/// Samples GPU telemetry by invoking the query command afresh on every call.
///
/// No caching and no retry here: retry policy belongs to the loop that
/// owns the tick cadence.
#[derive(Debug)]
pub struct Sampler {
    command: String,
    skipped_records: u64,
}

impl Sampler {
    /// Creates a sampler that invokes `command` (normally `nvidia-smi`).
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), skipped_records: 0 }
    }

    /// Total number of malformed records skipped over the session.
    #[must_use]
    pub fn skipped_records(&self) -> u64 {
        self.skipped_records
    }

    /// Runs one query and parses its output into device metrics, in the
    /// order the driver reported them.
    ///
    /// # Errors
    ///
    /// [`MonitorError::QueryUnavailable`] when the command cannot run;
    /// [`MonitorError::Parse`] when output was present but no record
    /// survived parsing. Individual malformed lines are skipped (and
    /// counted) as long as at least one line parses.
    pub fn sample(&mut self) -> Result<Vec<DeviceMetric>> {
        let query = format!("--query-gpu={QUERY_FIELDS}");
        let stdout = subprocess::run_with_timeout(
            &self.command,
            &[&query, "--format=csv,noheader,nounits"],
            QUERY_TIMEOUT,
        )?;
        self.parse_output(&stdout)
    }

    /// Parses raw query output, skipping malformed records.
    pub fn parse_output(&mut self, stdout: &str) -> Result<Vec<DeviceMetric>> {
        let mut devices = Vec::new();
        let mut malformed = 0usize;
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            match parse_record(line) {
                Ok(metric) => devices.push(metric),
                Err(e) => {
                    malformed += 1;
                    self.skipped_records += 1;
                    log::warn!("skipping device record: {e}");
                }
            }
        }

        if devices.is_empty() && malformed > 0 {
            return Err(MonitorError::Parse(format!(
                "all {malformed} device records were malformed"
            )));
        }
        log::debug!("sampled {} devices ({malformed} records skipped)", devices.len());
        Ok(devices)
    }
}

/// Parses one CSV record into a [`DeviceMetric`].
///
/// Critical fields (index, utilization, memory) fail the whole record;
/// temperature and power degrade to absent/zero so one dead sensor does
/// not hide an otherwise healthy device.
pub fn parse_record(line: &str) -> Result<DeviceMetric> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != FIELD_COUNT {
        return Err(MonitorError::Parse(format!(
            "expected {FIELD_COUNT} fields, got {} in {line:?}",
            fields.len()
        )));
    }

    let index = require_u64(fields[0], "index", line)? as u32;
    let name = fields[1].to_string();

    let temperature_c =
        if is_sentinel(fields[2]) { None } else { coerce_f64(fields[2]).map(|t| t as i64) };

    let utilization_pct = require_u64(fields[3], "utilization", line)?.min(100) as u8;

    let memory_used = require_u64(fields[4], "memory.used", line)?;
    let memory_total = require_u64(fields[5], "memory.total", line)?;
    // used <= total is an invariant of the record, not of the driver.
    let memory_used_mib = memory_used.min(memory_total);

    let power_draw_w =
        if is_sentinel(fields[6]) { 0.0 } else { coerce_f64(fields[6]).unwrap_or(0.0) };
    let power_limit_w = if is_sentinel(fields[7]) { None } else { coerce_f64(fields[7]) };

    Ok(DeviceMetric {
        index,
        name,
        temperature_c,
        utilization_pct,
        memory_used_mib,
        memory_total_mib: memory_total,
        power_draw_w,
        power_limit_w,
    })
}

fn is_sentinel(field: &str) -> bool {
    SENTINELS.contains(&field)
}

/// Leniently coerces a field to a float, tolerating surrounding whitespace
/// and trailing unit suffixes ("55 C", "87.50 W", "40 %").
fn coerce_f64(field: &str) -> Option<f64> {
    let token = field.split_whitespace().next()?;
    let end = token
        .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-' && c != '+')
        .unwrap_or(token.len());
    token[..end].parse().ok()
}

fn require_u64(field: &str, what: &str, line: &str) -> Result<u64> {
    if is_sentinel(field) {
        return Err(MonitorError::Parse(format!("{what} unavailable in {line:?}")));
    }
    coerce_f64(field)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
        .ok_or_else(|| MonitorError::Parse(format!("bad {what} field {field:?} in {line:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "0, NVIDIA GeForce RTX 4090, 55, 40, 2000, 8000, 90.00, 150.00";

    #[test]
    fn test_parse_record_full() {
        let m = parse_record(GOOD).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.name, "NVIDIA GeForce RTX 4090");
        assert_eq!(m.temperature_c, Some(55));
        assert_eq!(m.utilization_pct, 40);
        assert_eq!(m.memory_used_mib, 2000);
        assert_eq!(m.memory_total_mib, 8000);
        assert!((m.power_draw_w - 90.0).abs() < f64::EPSILON);
        assert_eq!(m.power_limit_w, Some(150.0));
    }

    #[test]
    fn test_parse_record_round_trip() {
        let m = parse_record(GOOD).unwrap();
        let reparsed = parse_record(&m.to_record()).unwrap();
        assert_eq!(m, reparsed);
    }

    #[test]
    fn test_sentinel_temperature_is_absent() {
        let m = parse_record("0, Tesla K80, [N/A], 40, 2000, 8000, 90.00, 150.00").unwrap();
        assert_eq!(m.temperature_c, None);
    }

    #[test]
    fn test_sentinel_power_degrades() {
        let m = parse_record("0, Quadro P400, 55, 40, 2000, 8000, [N/A], [Not Supported]")
            .unwrap();
        assert_eq!(m.power_draw_w, 0.0);
        assert_eq!(m.power_limit_w, None);
    }

    #[test]
    fn test_missing_utilization_fails_record() {
        let err = parse_record("0, GPU, 55, [N/A], 2000, 8000, 90.00, 150.00");
        assert!(matches!(err, Err(MonitorError::Parse(_))));
    }

    #[test]
    fn test_missing_memory_fails_record() {
        let err = parse_record("0, GPU, 55, 40, N/A, 8000, 90.00, 150.00");
        assert!(matches!(err, Err(MonitorError::Parse(_))));
    }

    #[test]
    fn test_wrong_field_count_fails_record() {
        let err = parse_record("0, GPU, 55");
        assert!(matches!(err, Err(MonitorError::Parse(_))));
    }

    #[test]
    fn test_memory_used_clamps_to_total() {
        let m = parse_record("0, GPU, 55, 40, 9000, 8000, 90.00, 150.00").unwrap();
        assert_eq!(m.memory_used_mib, 8000);
    }

    #[test]
    fn test_unit_suffixes_tolerated() {
        let m = parse_record("1, GPU, 55 C, 40 %, 2000 MiB, 8000 MiB, 90.50 W, 150.00 W")
            .unwrap();
        assert_eq!(m.temperature_c, Some(55));
        assert_eq!(m.utilization_pct, 40);
        assert_eq!(m.memory_used_mib, 2000);
        assert!((m.power_draw_w - 90.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_utilization_clamped_to_100() {
        let m = parse_record("0, GPU, 55, 130, 2000, 8000, 90.00, 150.00").unwrap();
        assert_eq!(m.utilization_pct, 100);
    }

    #[test]
    fn test_parse_output_salvages_partial_sample() {
        let mut sampler = Sampler::new("nvidia-smi");
        let stdout = format!("{GOOD}\nnot a record at all\n");
        let devices = sampler.parse_output(&stdout).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(sampler.skipped_records(), 1);
    }

    #[test]
    fn test_parse_output_all_malformed_is_parse_error() {
        let mut sampler = Sampler::new("nvidia-smi");
        let err = sampler.parse_output("garbage\nmore garbage\n");
        assert!(matches!(err, Err(MonitorError::Parse(_))));
    }

    #[test]
    fn test_parse_output_empty_is_empty_sample() {
        let mut sampler = Sampler::new("nvidia-smi");
        let devices = sampler.parse_output("\n").unwrap();
        assert!(devices.is_empty());
        assert_eq!(sampler.skipped_records(), 0);
    }

    #[test]
    fn test_parse_output_preserves_driver_order() {
        let mut sampler = Sampler::new("nvidia-smi");
        let stdout = "1, B, 50, 10, 100, 200, 10.00, 20.00\n0, A, 50, 10, 100, 200, 10.00, 20.00\n";
        let devices = sampler.parse_output(stdout).unwrap();
        assert_eq!(devices[0].index, 1);
        assert_eq!(devices[1].index, 0);
    }
}
