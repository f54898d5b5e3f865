//! Image export of the current plot
//!
//! Renders with plotters' bitmap backend. No font backend is compiled in, so
//! the image carries the plot area, grid and frame but no text.

use micscope_core::spectrum::DbRange;
use plotters::prelude::*;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::theme::{viridis, Rgb, Theme};

/// Image size used by the interactive save key
pub const DEFAULT_EXPORT_SIZE: (u32, u32) = (1000, 500);

const MARGIN: i32 = 24;
const GRID_DIVISIONS: i32 = 8;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("unsupported image format: .{0} (use png, jpg or bmp)")]
    UnsupportedFormat(String),

    #[error("nothing to export yet")]
    EmptyPlot,

    #[error("failed to draw image: {0}")]
    Draw(String),
}

/// Data needed to redraw the visible plot off-screen
#[derive(Debug, Clone, PartialEq)]
pub enum PlotSnapshot {
    Spectrum {
        /// Visible bins, ascending
        frequencies: Vec<f64>,
        magnitudes_db: Vec<f64>,
        lo_hz: f64,
        hi_hz: f64,
        range: DbRange,
    },
    Spectrogram {
        /// Oldest first; each column holds the visible bins, low to high
        columns: Vec<Vec<f64>>,
        range: DbRange,
    },
}

impl PlotSnapshot {
    pub fn is_empty(&self) -> bool {
        match self {
            PlotSnapshot::Spectrum { frequencies, .. } => frequencies.is_empty(),
            PlotSnapshot::Spectrogram { columns, .. } => {
                columns.is_empty() || columns.iter().all(|c| c.is_empty())
            }
        }
    }
}

/// `<dir>/micscope-<unix-ms>.png`
pub fn timestamped_path(dir: &Path, unix_ms: u128) -> PathBuf {
    dir.join(format!("micscope-{unix_ms}.png"))
}

/// Append `.png` when `path` has no extension, and check the format
pub fn resolve_path(path: &Path) -> Result<PathBuf, ExportError> {
    let Some(ext) = path.extension() else {
        let mut raw: OsString = path.as_os_str().to_owned();
        raw.push(".png");
        return Ok(PathBuf::from(raw));
    };

    let ext = ext.to_string_lossy().to_ascii_lowercase();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "bmp" => Ok(path.to_path_buf()),
        _ => Err(ExportError::UnsupportedFormat(ext)),
    }
}

/// Draw `snapshot` to an image file and return the path written
pub fn save_plot(
    path: &Path,
    snapshot: &PlotSnapshot,
    theme: &Theme,
    size: (u32, u32),
) -> Result<PathBuf, ExportError> {
    let path = resolve_path(path)?;
    if snapshot.is_empty() {
        return Err(ExportError::EmptyPlot);
    }

    let size = (size.0.max(4 * MARGIN as u32), size.1.max(4 * MARGIN as u32));
    let root = BitMapBackend::new(&path, size).into_drawing_area();
    root.fill(&rgb(theme.background)).map_err(draw_err)?;

    let plot = PlotArea {
        left: MARGIN,
        top: MARGIN,
        right: size.0 as i32 - MARGIN,
        bottom: size.1 as i32 - MARGIN,
    };

    match snapshot {
        PlotSnapshot::Spectrum {
            frequencies,
            magnitudes_db,
            lo_hz,
            hi_hz,
            range,
        } => draw_spectrum(&root, &plot, theme, frequencies, magnitudes_db, (*lo_hz, *hi_hz), *range)?,
        PlotSnapshot::Spectrogram { columns, range } => {
            draw_spectrogram(&root, &plot, columns, *range)?
        }
    }

    draw_grid(&root, &plot, theme)?;
    root.present().map_err(draw_err)?;
    // The backend borrows `path` until dropped
    drop(root);

    tracing::info!(path = %path.display(), "plot exported");
    Ok(path)
}

struct PlotArea {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl PlotArea {
    fn width(&self) -> i32 {
        self.right - self.left
    }

    fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

type Area<'a> = DrawingArea<BitMapBackend<'a>, plotters::coord::Shift>;

fn draw_spectrum(
    root: &Area<'_>,
    plot: &PlotArea,
    theme: &Theme,
    frequencies: &[f64],
    magnitudes_db: &[f64],
    (lo_hz, hi_hz): (f64, f64),
    range: DbRange,
) -> Result<(), ExportError> {
    let span = (hi_hz - lo_hz).max(f64::EPSILON);
    let count = frequencies.len().min(magnitudes_db.len());
    let bar_width = (plot.width() as f64 / count as f64).max(1.0);

    for (i, (&freq, &db)) in frequencies.iter().zip(magnitudes_db).enumerate() {
        let level = range.normalize(db);
        let x0 = plot.left + ((freq - lo_hz) / span * plot.width() as f64) as i32;
        let x1 = (x0 + bar_width.ceil() as i32).min(plot.right);
        let y_top = plot.bottom - (level * plot.height() as f64).round() as i32;
        if y_top >= plot.bottom || x0 >= plot.right {
            continue;
        }
        let color = theme.bar_color(i, count, level);
        root.draw(&Rectangle::new([(x0, y_top), (x1, plot.bottom)], rgb(color).filled()))
            .map_err(draw_err)?;
    }
    Ok(())
}

fn draw_spectrogram(
    root: &Area<'_>,
    plot: &PlotArea,
    columns: &[Vec<f64>],
    range: DbRange,
) -> Result<(), ExportError> {
    let cols = columns.len() as f64;
    let rows = columns.iter().map(Vec::len).max().unwrap_or(0) as f64;

    for (c, column) in columns.iter().enumerate() {
        let x0 = plot.left + (c as f64 / cols * plot.width() as f64) as i32;
        let x1 = plot.left + ((c + 1) as f64 / cols * plot.width() as f64).ceil() as i32;
        for (r, &db) in column.iter().enumerate() {
            // Low frequencies at the bottom
            let y1 = plot.bottom - (r as f64 / rows * plot.height() as f64) as i32;
            let y0 = plot.bottom - ((r + 1) as f64 / rows * plot.height() as f64).ceil() as i32;
            let color = viridis(range.normalize(db));
            root.draw(&Rectangle::new([(x0, y0), (x1, y1)], rgb(color).filled()))
                .map_err(draw_err)?;
        }
    }
    Ok(())
}

fn draw_grid(root: &Area<'_>, plot: &PlotArea, theme: &Theme) -> Result<(), ExportError> {
    let grid = rgb(theme.grid);
    for i in 1..GRID_DIVISIONS {
        let x = plot.left + plot.width() * i / GRID_DIVISIONS;
        let y = plot.top + plot.height() * i / GRID_DIVISIONS;
        root.draw(&PathElement::new(vec![(x, plot.top), (x, plot.bottom)], grid))
            .map_err(draw_err)?;
        root.draw(&PathElement::new(vec![(plot.left, y), (plot.right, y)], grid))
            .map_err(draw_err)?;
    }
    root.draw(&Rectangle::new(
        [(plot.left, plot.top), (plot.right, plot.bottom)],
        rgb(theme.foreground).stroke_width(1),
    ))
    .map_err(draw_err)?;
    Ok(())
}

fn rgb(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

fn draw_err<E: std::fmt::Display>(e: E) -> ExportError {
    ExportError::Draw(e.to_string())
}
