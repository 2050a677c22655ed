//! Frame construction: pure text rendering of device metrics.
//!
//! `render` is a pure function from (metrics, width, context) to a
//! [`Frame`]; it owns every layout and banding decision and touches no
//! terminal state, so the full output is testable as plain data. The
//! display writer in `app` consumes frames by full repaint.

use std::time::Duration;

use crossterm::style::Color;

use crate::metrics::{Aggregate, DeviceMetric};
use crate::theme;

/// Narrowest layout the charts are designed for; narrower terminals are
/// rendered best-effort at this width.
pub const MIN_WIDTH: u16 = 80;
/// Widest layout; wider terminals leave the right margin unused.
pub const MAX_WIDTH: u16 = 160;

/// Columns consumed by a bar row outside the label and the bar itself:
/// outer borders, padding, bar borders, and the value column.
const FIXED_OVERHEAD: usize = 24;
const MAX_LABEL_WIDTH: usize = 50;
const MAX_GAUGE_WIDTH: usize = 50;
const VALUE_WIDTH: usize = 16;

/// Bar scale for temperatures, in Celsius.
const TEMP_SCALE: f64 = 100.0;
/// Power bar ceiling when a device reports no limit.
const NOMINAL_POWER_W: f64 = 100.0;

/// One colored run of text within a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub color: Color,
    pub bold: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), color: Color::Reset, bold: false }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self { text: text.into(), color: Color::Reset, bold: true }
    }

    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Self { text: text.into(), color, bold: false }
    }
}

/// One row of the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    fn blank() -> Self {
        Self::default()
    }

    /// Text content with styling stripped.
    #[must_use]
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Visible width in terminal cells (the charts are single-width glyphs).
    #[must_use]
    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }
}

impl From<Vec<Span>> for Line {
    fn from(spans: Vec<Span>) -> Self {
        Self { spans }
    }
}

/// A fully rendered tick: an ordered sequence of styled lines, written
/// top to bottom by the display writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub lines: Vec<Line>,
}

impl Frame {
    /// Unstyled text of the whole frame, for assertions and logging.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text());
            out.push('\n');
        }
        out
    }
}

/// Ambient values for the frame header and footer, supplied by the loop so
/// rendering itself stays deterministic.
#[derive(Debug, Clone)]
pub struct FrameContext<'a> {
    /// Wall-clock label shown in the title bar.
    pub timestamp: &'a str,
    /// Tick cadence shown in the footer.
    pub refresh: Duration,
}

/// Column budget derived from the terminal width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: usize,
    pub label_width: usize,
    pub bar_width: usize,
    pub gauge_width: usize,
}

impl Layout {
    /// Derives the layout for a terminal width, clamped to the supported
    /// range.
    #[must_use]
    pub fn for_width(terminal_width: u16) -> Self {
        let width = terminal_width.clamp(MIN_WIDTH, MAX_WIDTH) as usize;
        let usable = width - FIXED_OVERHEAD;
        let label_width = MAX_LABEL_WIDTH.min(usable / 3);
        let bar_width = usable.saturating_sub(label_width + 2).max(1);
        let gauge_width = MAX_GAUGE_WIDTH.min((width - 20) / 2).max(1);
        Self { width, label_width, bar_width, gauge_width }
    }
}

/// Renders one tick's metrics into a frame sized for `terminal_width`.
#[must_use]
pub fn render(devices: &[DeviceMetric], terminal_width: u16, ctx: &FrameContext) -> Frame {
    let layout = Layout::for_width(terminal_width);
    let mut lines = Vec::new();

    push_header(&mut lines, &layout, ctx);

    if devices.is_empty() {
        lines.push(Line::blank());
        lines.push(Line::from(vec![Span::colored(
            "⚠ No GPUs detected or query command returned nothing",
            theme::MUTED,
        )]));
        push_footer(&mut lines, &layout, ctx);
        return Frame { lines };
    }

    lines.push(Line::blank());
    lines.extend(temperature_section(devices, &layout));
    lines.push(Line::blank());
    lines.extend(utilization_section(devices, &layout));
    lines.push(Line::blank());
    lines.extend(memory_section(devices, &layout));
    lines.push(Line::blank());
    lines.extend(power_section(devices, &layout));
    lines.push(Line::blank());
    lines.extend(totals_section(devices, &layout));

    push_footer(&mut lines, &layout, ctx);
    Frame { lines }
}

/// Placeholder frame shown when sampling fails before any frame exists.
#[must_use]
pub fn render_unavailable(terminal_width: u16, ctx: &FrameContext) -> Frame {
    let layout = Layout::for_width(terminal_width);
    let mut lines = Vec::new();
    push_header(&mut lines, &layout, ctx);
    lines.push(Line::blank());
    lines.push(Line::from(vec![Span::colored(
        "GPU data unavailable - waiting for the query command to recover",
        theme::MUTED,
    )]));
    push_footer(&mut lines, &layout, ctx);
    Frame { lines }
}

fn push_header(lines: &mut Vec<Line>, layout: &Layout, ctx: &FrameContext) {
    lines.push(Line::from(vec![Span::bold("═".repeat(layout.width))]));
    lines.push(Line::from(vec![Span::plain(format!(
        "  NVSTAT - GPU Monitor  │  {}  │  {} cols",
        ctx.timestamp, layout.width
    ))]));
    lines.push(Line::from(vec![Span::plain("═".repeat(layout.width))]));
}

fn push_footer(lines: &mut Vec<Line>, layout: &Layout, ctx: &FrameContext) {
    lines.push(Line::blank());
    lines.push(Line::from(vec![Span::plain("═".repeat(layout.width))]));
    lines.push(Line::from(vec![Span::colored(
        format!("Press Ctrl+C to exit  │  Refresh: {}", format_refresh(ctx.refresh)),
        theme::MUTED,
    )]));
    lines.push(Line::from(vec![Span::plain("═".repeat(layout.width))]));
}

fn format_refresh(interval: Duration) -> String {
    let secs = interval.as_secs_f64();
    if interval.subsec_millis() == 0 {
        format!("{}s", interval.as_secs())
    } else {
        format!("{secs:.1}s")
    }
}

fn temperature_section(devices: &[DeviceMetric], layout: &Layout) -> Vec<Line> {
    let mut lines = vec![section_header("TEMPERATURE", layout)];
    for d in devices {
        let label = device_label(d);
        match d.temperature_c {
            Some(t) => {
                let t = t as f64;
                lines.push(bar_row(
                    &label,
                    &format!("{t:.0}°C"),
                    theme::ratio(t, TEMP_SCALE),
                    theme::temp_band(t).color(),
                    layout,
                ));
            }
            None => lines.push(placeholder_row(&label, layout)),
        }
    }
    lines.push(section_footer(layout));
    lines
}

fn utilization_section(devices: &[DeviceMetric], layout: &Layout) -> Vec<Line> {
    let mut lines = vec![section_header("GPU UTILIZATION", layout)];
    for d in devices {
        let pct = f64::from(d.utilization_pct);
        lines.push(bar_row(
            &device_label(d),
            &format!("{pct:.1}%"),
            theme::ratio(pct, 100.0),
            theme::utilization_color(pct),
            layout,
        ));
    }
    lines.push(section_footer(layout));
    lines
}

fn memory_section(devices: &[DeviceMetric], layout: &Layout) -> Vec<Line> {
    let mut lines = vec![section_header("MEMORY USAGE", layout)];
    for d in devices {
        let r = d.memory_fraction();
        lines.push(bar_row(
            &device_label(d),
            &format!(
                "{}/{}",
                theme::format_mib(d.memory_used_mib),
                theme::format_mib(d.memory_total_mib)
            ),
            r,
            theme::pressure_band(r * 100.0).color(),
            layout,
        ));
    }
    lines.push(section_footer(layout));
    lines
}

fn power_section(devices: &[DeviceMetric], layout: &Layout) -> Vec<Line> {
    let mut lines = vec![section_header("POWER USAGE", layout)];
    for d in devices {
        let limit = d.power_limit_w.filter(|l| *l > 0.0);
        let scale = limit.unwrap_or(NOMINAL_POWER_W);
        let r = theme::ratio(d.power_draw_w, scale);
        let value = match limit {
            Some(l) => format!("{:.0}W/{:.0}W", d.power_draw_w, l),
            None => format!("{:.0}W/--", d.power_draw_w),
        };
        lines.push(bar_row(
            &device_label(d),
            &value,
            r,
            theme::pressure_band(r * 100.0).color(),
            layout,
        ));
    }
    lines.push(section_footer(layout));
    lines
}

fn totals_section(devices: &[DeviceMetric], layout: &Layout) -> Vec<Line> {
    let mut lines = vec![section_header("TOTALS", layout)];
    let Some(agg) = Aggregate::from_devices(devices) else {
        lines.push(section_footer(layout));
        return lines;
    };
    lines.push(boxed(vec![], layout));

    let mem_r = theme::ratio(agg.memory_used_mib as f64, agg.memory_total_mib as f64);
    gauge(
        &mut lines,
        "Total VRAM",
        &format!(
            "{:.1}%  ({} / {})",
            mem_r * 100.0,
            theme::format_mib(agg.memory_used_mib),
            theme::format_mib(agg.memory_total_mib)
        ),
        mem_r,
        theme::pressure_band(mem_r * 100.0).color(),
        layout,
    );
    lines.push(boxed(vec![], layout));

    gauge(
        &mut lines,
        "Average GPU Utilization",
        &format!("{:.1}%", agg.mean_utilization_pct),
        theme::ratio(agg.mean_utilization_pct, 100.0),
        theme::utilization_color(agg.mean_utilization_pct),
        layout,
    );
    lines.push(boxed(vec![], layout));

    let power_scale = agg
        .total_power_limit_w
        .filter(|l| *l > 0.0)
        .unwrap_or(NOMINAL_POWER_W * devices.len() as f64);
    let power_r = theme::ratio(agg.total_power_draw_w, power_scale);
    let power_value = match agg.total_power_limit_w {
        Some(l) => format!(
            "{:.0}W  ({:.0}W / {:.0}W)",
            agg.total_power_draw_w, agg.total_power_draw_w, l
        ),
        None => format!("{:.0}W", agg.total_power_draw_w),
    };
    gauge(
        &mut lines,
        "Total Power Draw",
        &power_value,
        power_r,
        theme::pressure_band(power_r * 100.0).color(),
        layout,
    );
    lines.push(boxed(vec![], layout));

    match agg.mean_temperature_c {
        Some(t) => gauge(
            &mut lines,
            "Average Temperature",
            &format!("{t:.1}°C"),
            theme::ratio(t, TEMP_SCALE),
            theme::temp_band(t).color(),
            layout,
        ),
        None => {
            lines.push(boxed(vec![Span::bold("  Average Temperature")], layout));
            lines.push(boxed(
                vec![Span::plain("    "), Span::colored("N/A", theme::MUTED)],
                layout,
            ));
        }
    }
    lines.push(boxed(vec![], layout));

    lines.push(section_footer(layout));
    lines
}

fn device_label(d: &DeviceMetric) -> String {
    format!("GPU {}: {}", d.index, d.name)
}

fn section_header(title: &str, layout: &Layout) -> Line {
    let title_part = format!("─ {title} ");
    let remaining = (layout.width - 2).saturating_sub(title_part.chars().count());
    Line::from(vec![Span::bold(format!("┌{title_part}{}┐", "─".repeat(remaining)))])
}

fn section_footer(layout: &Layout) -> Line {
    Line::from(vec![Span::bold(format!("└{}┘", "─".repeat(layout.width - 2)))])
}

/// Wraps content spans in the section borders, padding to the full width.
fn boxed(content: Vec<Span>, layout: &Layout) -> Line {
    let visible: usize = content.iter().map(|s| s.text.chars().count()).sum();
    let pad = (layout.width - 2).saturating_sub(visible);
    let mut spans = vec![Span::plain("│")];
    spans.extend(content);
    spans.push(Span::plain(format!("{}│", " ".repeat(pad))));
    Line::from(spans)
}

fn bar_row(label: &str, value: &str, r: f64, color: Color, layout: &Layout) -> Line {
    let filled = theme::fill_cells(r, layout.bar_width);
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(layout.bar_width - filled));
    boxed(
        vec![
            Span::plain(format!(
                " {:<width$} ",
                truncate(label, layout.label_width),
                width = layout.label_width
            )),
            Span::colored(format!("│{bar}│"), color),
            Span::plain(format!(" {value:>VALUE_WIDTH$}")),
        ],
        layout,
    )
}

/// Row for a device whose sensor reports nothing: an explicit placeholder
/// instead of a zero-filled bar.
fn placeholder_row(label: &str, layout: &Layout) -> Line {
    boxed(
        vec![
            Span::plain(format!(
                " {:<width$} ",
                truncate(label, layout.label_width),
                width = layout.label_width
            )),
            Span::colored("N/A", theme::MUTED),
        ],
        layout,
    )
}

fn gauge(
    lines: &mut Vec<Line>,
    title: &str,
    value: &str,
    r: f64,
    color: Color,
    layout: &Layout,
) {
    let filled = theme::fill_cells(r, layout.gauge_width);
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(layout.gauge_width - filled));

    lines.push(boxed(vec![Span::bold(format!("  {title}"))], layout));
    lines.push(boxed(
        vec![Span::plain(format!("    ╔{}╗", "═".repeat(layout.gauge_width)))],
        layout,
    ));
    lines.push(boxed(
        vec![
            Span::plain("    "),
            Span::colored(format!("║{bar}║"), color),
            Span::plain(format!("  {value}")),
        ],
        layout,
    ));
    lines.push(boxed(
        vec![Span::plain(format!("    ╚{}╝", "═".repeat(layout.gauge_width)))],
        layout,
    ));
}

fn truncate(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        return label.to_string();
    }
    let cut: String = label.chars().take(max.saturating_sub(2)).collect();
    format!("{cut}..")
}
