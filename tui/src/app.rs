//! Interactive state and the fixed-cadence draw loop

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use micscope_core::audio::{AudioProcessor, GateParams, ProcessorConfig, StreamInfo};
use micscope_core::filters::DenoiseMode;
use micscope_core::spectrum::{
    DbRange, SpectrogramConfig, SpectrogramHistory, SpectrumConfig, SpectrumFrame,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::Style,
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::io;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::export::{save_plot, timestamped_path, PlotSnapshot, DEFAULT_EXPORT_SIZE};
use crate::render::{help_line, status_line, SpectrogramWidget, SpectrumWidget, StatusInfo};
use crate::terminal::TerminalGuard;
use crate::theme::Theme;
use crate::view::{PlotMode, Viewport};

/// Fraction of the visible span moved per pan key
const PAN_STEP: f64 = 0.1;

/// Colour range used until the history has something to autoscale to
const SPECTROGRAM_FALLBACK_RANGE: DbRange = DbRange::new(-200.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleStream,
    ToggleMode,
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    ResetView,
    CycleTheme,
    CycleDenoise,
    Save,
    Clear,
    Quit,
}

/// Map a key press to an action
pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(Action::Quit);
    }

    match key.code {
        KeyCode::Char(' ') => Some(Action::ToggleStream),
        KeyCode::Char('m') => Some(Action::ToggleMode),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Action::ZoomIn),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(Action::ZoomOut),
        KeyCode::Left => Some(Action::PanLeft),
        KeyCode::Right => Some(Action::PanRight),
        KeyCode::Char('0') => Some(Action::ResetView),
        KeyCode::Char('t') => Some(Action::CycleTheme),
        KeyCode::Char('d') => Some(Action::CycleDenoise),
        KeyCode::Char('s') => Some(Action::Save),
        KeyCode::Char('c') => Some(Action::Clear),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

/// Build the core processor settings from the resolved config
pub fn processor_config(config: &Config) -> ProcessorConfig {
    let sample_rate = config.sample_rate as f64;
    ProcessorConfig {
        device: config.device.clone(),
        sample_rate: config.sample_rate,
        chunk_size: config.chunk_size,
        // Two seconds of slack, and never less than a few chunks
        ring_capacity: (config.sample_rate as usize * 2).max(config.chunk_size * 8),
        denoise: config.denoise,
        spectrum: SpectrumConfig {
            chunk_size: config.chunk_size,
            sample_rate,
            range: config.spectrum_range,
            ..SpectrumConfig::default()
        },
        spectrogram: SpectrogramConfig {
            nperseg: config.nperseg,
            noverlap: config.noverlap,
            sample_rate,
            ..SpectrogramConfig::default()
        },
        gate: GateParams {
            threshold_db: config.gate_threshold_db,
            ..GateParams::default()
        },
        ..ProcessorConfig::default()
    }
}

pub struct App {
    config: Config,
    processor: AudioProcessor,
    stream: Option<StreamInfo>,
    mode: PlotMode,
    viewport: Viewport,
    theme: Theme,
    denoise: DenoiseMode,
    spectrum: Option<SpectrumFrame>,
    level_dbfs: Option<f64>,
    history: SpectrogramHistory,
    message: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> Self {
        let mut theme = Theme::new(config.theme);
        if let Some(coloring) = config.bar_coloring {
            theme = theme.with_coloring(coloring);
        }
        let bins = config.nperseg / 2 + 1;

        Self {
            processor: AudioProcessor::new(processor_config(&config)),
            stream: None,
            mode: config.mode,
            viewport: Viewport::new(config.nyquist()),
            theme,
            denoise: config.denoise,
            spectrum: None,
            level_dbfs: None,
            history: SpectrogramHistory::new(bins, config.history_columns),
            message: None,
            should_quit: false,
            config,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.processor.is_running()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    #[cfg(test)]
    pub fn mode(&self) -> PlotMode {
        self.mode
    }

    #[cfg(test)]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[cfg(test)]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Start capture; failures are reported on the status line
    pub fn start(&mut self) {
        match self.processor.start() {
            Ok(info) => {
                self.message = info
                    .is_resampling()
                    .then(|| format!("resampling {} Hz", info.capture_rate));
                self.stream = Some(info);
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to start capture");
                self.message = Some(format!("audio error: {err}"));
            }
        }
    }

    pub fn stop(&mut self) {
        self.processor.stop();
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::ToggleStream => {
                if self.is_streaming() {
                    self.stop();
                    self.message = None;
                } else {
                    self.start();
                }
            }
            Action::ToggleMode => self.mode = self.mode.toggle(),
            Action::ZoomIn => self.viewport.zoom_in(),
            Action::ZoomOut => self.viewport.zoom_out(),
            Action::PanLeft => self.viewport.pan(-PAN_STEP),
            Action::PanRight => self.viewport.pan(PAN_STEP),
            Action::ResetView => self.viewport.reset(),
            Action::CycleTheme => {
                let mut theme = self.theme.next();
                if let Some(coloring) = self.config.bar_coloring {
                    theme = theme.with_coloring(coloring);
                }
                self.theme = theme;
            }
            Action::CycleDenoise => {
                self.denoise = self.denoise.cycle();
                self.processor.set_denoise(self.denoise);
                self.message = Some(format!("denoise {}", self.denoise));
            }
            Action::Save => self.save(),
            Action::Clear => {
                self.history.clear();
                self.spectrum = None;
                self.level_dbfs = None;
            }
            Action::Quit => self.should_quit = true,
        }
    }

    /// Pull every pending frame from the processor
    pub fn tick(&mut self) {
        for frame in self.processor.drain() {
            self.history.push_frame(&frame.spectrogram);
            self.level_dbfs = Some(frame.rms_dbfs);
            self.spectrum = Some(frame.spectrum);
        }
    }

    fn spectrogram_range(&self) -> DbRange {
        self.config
            .spectrogram_range
            .or_else(|| self.history.value_range())
            .unwrap_or(SPECTROGRAM_FALLBACK_RANGE)
    }

    /// Data for the visible plot, or `None` when there is nothing to show
    pub fn snapshot(&self) -> Option<PlotSnapshot> {
        match self.mode {
            PlotMode::Spectrum => {
                let spectrum = self.spectrum.as_ref()?;
                let (frequencies, magnitudes) =
                    spectrum.band(self.viewport.lo_hz(), self.viewport.hi_hz());
                Some(PlotSnapshot::Spectrum {
                    frequencies: frequencies.to_vec(),
                    magnitudes_db: magnitudes.to_vec(),
                    lo_hz: self.viewport.lo_hz(),
                    hi_hz: self.viewport.hi_hz(),
                    range: self.config.spectrum_range,
                })
            }
            PlotMode::Spectrogram => {
                if self.history.is_empty() {
                    return None;
                }
                let bins = self.viewport.bin_range(self.history.frequencies());
                let columns = self
                    .history
                    .columns()
                    .map(|c| c.iter().skip(bins.start).take(bins.len()).copied().collect())
                    .collect();
                Some(PlotSnapshot::Spectrogram {
                    columns,
                    range: self.spectrogram_range(),
                })
            }
        }
    }

    fn save(&mut self) {
        let Some(snapshot) = self.snapshot() else {
            self.message = Some("nothing to save yet".to_string());
            return;
        };

        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let path = timestamped_path(self.export_dir(), unix_ms);

        let result = std::fs::create_dir_all(self.export_dir())
            .map_err(|e| e.to_string())
            .and_then(|_| {
                save_plot(&path, &snapshot, &self.theme, DEFAULT_EXPORT_SIZE)
                    .map_err(|e| e.to_string())
            });

        self.message = Some(match result {
            Ok(written) => format!("saved {}", written.display()),
            Err(err) => {
                tracing::error!(error = %err, path = %path.display(), "export failed");
                format!("save failed: {err}")
            }
        });
    }

    pub fn draw(&self, frame: &mut Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(frame.size());

        let base = Style::default()
            .fg(self.theme.foreground.into())
            .bg(self.theme.background.into());
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" micscope · {} ", self.mode))
            .style(base)
            .border_style(Style::default().fg(self.theme.grid.into()));
        let inner = block.inner(chunks[0]);
        frame.render_widget(block, chunks[0]);

        match self.mode {
            PlotMode::Spectrum => {
                if let Some(spectrum) = &self.spectrum {
                    frame.render_widget(
                        SpectrumWidget {
                            frequencies: &spectrum.frequencies,
                            magnitudes_db: &spectrum.magnitudes_db,
                            viewport: &self.viewport,
                            range: self.config.spectrum_range,
                            theme: &self.theme,
                        },
                        inner,
                    );
                }
            }
            PlotMode::Spectrogram => frame.render_widget(
                SpectrogramWidget {
                    history: &self.history,
                    viewport: &self.viewport,
                    range: self.spectrogram_range(),
                    theme: &self.theme,
                },
                inner,
            ),
        }

        let peak = self
            .spectrum
            .as_ref()
            .and_then(|s| s.peak_in(self.viewport.lo_hz(), self.viewport.hi_hz()));
        let info = StatusInfo {
            streaming: self.is_streaming(),
            device: self.stream.as_ref().map(|s| s.device.name.as_str()),
            capture_rate: self.stream.as_ref().map(|s| s.capture_rate),
            analysis_rate: self.config.sample_rate,
            mode: self.mode,
            denoise: self.denoise,
            viewport: &self.viewport,
            peak,
            level_dbfs: self.level_dbfs,
            stats: self.processor.stats(),
            message: self.message.as_deref(),
        };
        frame.render_widget(
            Paragraph::new(status_line(&info, &self.theme)).style(base),
            chunks[1],
        );
        frame.render_widget(Paragraph::new(help_line(&self.theme)).style(base), chunks[2]);
    }

    /// Export directory in use
    pub fn export_dir(&self) -> &Path {
        &self.config.export_dir
    }
}

/// Take over the terminal and run until quit
pub fn run(config: Config) -> Result<()> {
    let mut stdout = io::stdout();
    let guard = TerminalGuard::enter(&mut stdout).context("failed to prepare terminal")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let frame_dt = Duration::from_millis(config.frame_ms);
    let mut app = App::new(config);
    app.start();

    let result = event_loop(&mut terminal, &mut app, frame_dt);

    app.stop();
    drop(terminal);
    drop(guard);

    tracing::info!(stats = ?app.processor.stats(), "exiting");
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    frame_dt: Duration,
) -> Result<()> {
    let mut next_frame = Instant::now();

    while !app.should_quit() {
        app.tick();
        terminal.draw(|frame| app.draw(frame))?;
        app.theme.advance();

        next_frame += frame_dt;
        let now = Instant::now();
        if next_frame < now {
            // Fell behind; resync instead of bursting
            next_frame = now;
        }

        // Handle input until the next redraw is due
        loop {
            let now = Instant::now();
            if now >= next_frame || app.should_quit() {
                break;
            }
            if event::poll(next_frame - now)? {
                match event::read()? {
                    Event::Key(key) => {
                        if let Some(action) = action_for_key(key) {
                            tracing::debug!(?action, "key");
                            app.apply(action);
                        }
                    }
                    Event::Resize(_, _) => break,
                    _ => {}
                }
            }
        }
    }
    Ok(())
}
