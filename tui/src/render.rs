//! Terminal widgets for the spectrum, spectrogram and status lines

use micscope_core::audio::ProcessorStats;
use micscope_core::filters::DenoiseMode;
use micscope_core::spectrum::{DbRange, SpectrogramHistory};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

use crate::theme::{viridis, Theme};
use crate::view::{PlotMode, Viewport};

/// Partial bar heights in eighths, index 1..=7
const EIGHTHS: [char; 8] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇'];
const FULL_BLOCK: char = '█';
const UPPER_HALF: char = '▀';

/// Group `values` into `width` columns, keeping the maximum of each group
///
/// With fewer values than columns, values repeat across neighbouring columns.
pub fn column_maxima(values: &[f64], width: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || width == 0 {
        return Vec::new();
    }
    (0..width)
        .map(|c| {
            let start = c * n / width;
            let end = ((c + 1) * n / width).max(start + 1).min(n);
            values[start..end]
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect()
}

/// Glyph for row `row` (0 = bottom) of a bar `eighths` eighth-cells tall
pub fn bar_glyph(eighths: usize, row: usize) -> char {
    let below = row * 8;
    if eighths >= below + 8 {
        FULL_BLOCK
    } else if eighths > below {
        EIGHTHS[eighths - below]
    } else {
        ' '
    }
}

/// Vertical bars over the visible band
pub struct SpectrumWidget<'a> {
    pub frequencies: &'a [f64],
    pub magnitudes_db: &'a [f64],
    pub viewport: &'a Viewport,
    pub range: DbRange,
    pub theme: &'a Theme,
}

impl Widget for SpectrumWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bg = self.theme.background.into();
        buf.set_style(area, Style::default().bg(bg));
        if area.width == 0 || area.height == 0 {
            return;
        }

        let visible = self.viewport.bin_range(self.frequencies);
        let visible = visible.start..visible.end.min(self.magnitudes_db.len());
        let columns = column_maxima(&self.magnitudes_db[visible], area.width as usize);
        let count = columns.len();

        for (c, &db) in columns.iter().enumerate() {
            let level = self.range.normalize(db);
            let eighths = (level * area.height as f64 * 8.0).round() as usize;
            let color = self.theme.bar_color(c, count, level).into();
            let x = area.x + c as u16;

            for row in 0..area.height as usize {
                let glyph = bar_glyph(eighths, row);
                if glyph == ' ' {
                    break;
                }
                let y = area.y + area.height - 1 - row as u16;
                buf.get_mut(x, y).set_char(glyph).set_fg(color).set_bg(bg);
            }
        }
    }
}

/// Scrolling heatmap, newest column at the right edge
pub struct SpectrogramWidget<'a> {
    pub history: &'a SpectrogramHistory,
    pub viewport: &'a Viewport,
    pub range: DbRange,
    pub theme: &'a Theme,
}

impl Widget for SpectrogramWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        buf.set_style(area, Style::default().bg(self.theme.background.into()));
        if area.width == 0 || area.height == 0 || self.history.is_empty() {
            return;
        }

        let visible = self.viewport.bin_range(self.history.frequencies());
        let visible = visible.start..visible.end.min(self.history.num_bins());
        if visible.is_empty() {
            return;
        }

        // Two frequency rows per cell
        let freq_rows = area.height as usize * 2;
        let width = area.width as usize;
        let shown = self.history.len().min(width);
        let x_offset = (width - shown) as u16;

        let mut bins = Vec::with_capacity(visible.len());
        for (i, column) in self.history.latest(width).enumerate() {
            bins.clear();
            bins.extend(column.iter().skip(visible.start).take(visible.len()).copied());
            self.draw_column(&bins, freq_rows, area, x_offset + i as u16, buf);
        }
    }
}

impl SpectrogramWidget<'_> {
    fn draw_column(&self, bins: &[f64], freq_rows: usize, area: Rect, col: u16, buf: &mut Buffer) {
        let rows = column_maxima(bins, freq_rows);
        let x = area.x + col;
        for cell in 0..area.height as usize {
            let lower = rows[cell * 2];
            let upper = rows[cell * 2 + 1];
            let y = area.y + area.height - 1 - cell as u16;
            buf.get_mut(x, y)
                .set_char(UPPER_HALF)
                .set_fg(viridis(self.range.normalize(upper)).into())
                .set_bg(viridis(self.range.normalize(lower)).into());
        }
    }
}

/// Everything the status line reports
pub struct StatusInfo<'a> {
    pub streaming: bool,
    pub device: Option<&'a str>,
    pub capture_rate: Option<u32>,
    pub analysis_rate: u32,
    pub mode: PlotMode,
    pub denoise: DenoiseMode,
    pub viewport: &'a Viewport,
    pub peak: Option<(f64, f64)>,
    pub level_dbfs: Option<f64>,
    pub stats: ProcessorStats,
    pub message: Option<&'a str>,
}

pub fn status_line(info: &StatusInfo<'_>, theme: &Theme) -> Line<'static> {
    let fg = Style::default().fg(theme.foreground.into());
    let strong = fg.add_modifier(Modifier::BOLD);

    let state = if info.streaming { "● LIVE" } else { "○ STOPPED" };
    let mut spans = vec![Span::styled(state.to_string(), strong), Span::raw("  ")];

    if let Some(device) = info.device {
        spans.push(Span::styled(device.to_string(), fg));
        spans.push(Span::raw("  "));
    }

    let rate = match info.capture_rate {
        Some(capture) if capture != info.analysis_rate => {
            format!("{capture}→{} Hz", info.analysis_rate)
        }
        _ => format!("{} Hz", info.analysis_rate),
    };
    spans.push(Span::styled(rate, fg));
    spans.push(Span::raw("  "));

    spans.push(Span::styled(
        format!("{} | denoise {}", info.mode, info.denoise),
        fg,
    ));
    spans.push(Span::raw("  "));

    spans.push(Span::styled(
        format!(
            "{:.0}-{:.0} Hz",
            info.viewport.lo_hz(),
            info.viewport.hi_hz()
        ),
        fg,
    ));

    if let Some((hz, db)) = info.peak {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("peak {hz:.0} Hz {db:.1} dB"), fg));
    }
    if let Some(level) = info.level_dbfs {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("{level:.1} dBFS"), fg));
    }

    let lost = info.stats.dropped + info.stats.lagged;
    if lost > 0 || info.stats.stream_errors > 0 {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!(
                "dropped {} smp / {} frm, {} err",
                info.stats.dropped,
                info.stats.lagged,
                info.stats.stream_errors + info.stats.processing_errors
            ),
            fg.add_modifier(Modifier::ITALIC),
        ));
    }

    if let Some(msg) = info.message {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(msg.to_string(), strong));
    }

    Line::from(spans)
}

pub fn help_line(theme: &Theme) -> Line<'static> {
    let key = Style::default()
        .fg(theme.foreground.into())
        .add_modifier(Modifier::BOLD);
    let text = Style::default().fg(theme.foreground.into());

    let bindings = [
        ("Space", "start/stop"),
        ("m", "mode"),
        ("+/-", "zoom"),
        ("←/→", "pan"),
        ("0", "reset"),
        ("t", "theme"),
        ("d", "denoise"),
        ("s", "save"),
        ("c", "clear"),
        ("q", "quit"),
    ];

    let mut spans = Vec::with_capacity(bindings.len() * 3);
    for (k, action) in bindings {
        spans.push(Span::styled(k, key));
        spans.push(Span::styled(format!(" {action}"), text));
        spans.push(Span::raw("  "));
    }
    Line::from(spans)
}
