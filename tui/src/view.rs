//! Visible frequency window and plot mode

use std::fmt;
use std::str::FromStr;

/// Narrowest span the viewport will zoom to
pub const MIN_SPAN_HZ: f64 = 100.0;

/// What the main pane shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlotMode {
    #[default]
    Spectrum,
    Spectrogram,
}

impl PlotMode {
    pub fn name(&self) -> &'static str {
        match self {
            PlotMode::Spectrum => "spectrum",
            PlotMode::Spectrogram => "spectrogram",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            PlotMode::Spectrum => PlotMode::Spectrogram,
            PlotMode::Spectrogram => PlotMode::Spectrum,
        }
    }
}

impl fmt::Display for PlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spectrum" | "fft" => Ok(PlotMode::Spectrum),
            "spectrogram" | "stft" => Ok(PlotMode::Spectrogram),
            other => Err(format!("unknown plot mode: {other}")),
        }
    }
}

/// Zoom and pan state over `0..nyquist`
///
/// Invariant: `0 <= lo_hz < hi_hz <= nyquist` and the span never drops below
/// [`MIN_SPAN_HZ`] (or the whole band, if that is narrower).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    lo_hz: f64,
    hi_hz: f64,
    nyquist: f64,
}

impl Viewport {
    pub fn new(nyquist: f64) -> Self {
        let nyquist = if nyquist.is_finite() && nyquist > 0.0 {
            nyquist
        } else {
            1.0
        };
        Self {
            lo_hz: 0.0,
            hi_hz: nyquist,
            nyquist,
        }
    }

    pub fn lo_hz(&self) -> f64 {
        self.lo_hz
    }

    pub fn hi_hz(&self) -> f64 {
        self.hi_hz
    }

    #[cfg(test)]
    pub fn nyquist(&self) -> f64 {
        self.nyquist
    }

    pub fn span(&self) -> f64 {
        self.hi_hz - self.lo_hz
    }

    #[cfg(test)]
    pub fn is_full(&self) -> bool {
        self.lo_hz <= 0.0 && self.hi_hz >= self.nyquist
    }

    fn min_span(&self) -> f64 {
        MIN_SPAN_HZ.min(self.nyquist)
    }

    /// Place a window of `span` around `centre`, sliding it back inside the band
    fn set_window(&mut self, centre: f64, span: f64) {
        let span = span.clamp(self.min_span(), self.nyquist);
        let mut lo = centre - span / 2.0;
        lo = lo.clamp(0.0, self.nyquist - span);
        self.lo_hz = lo;
        self.hi_hz = lo + span;
    }

    fn centre(&self) -> f64 {
        (self.lo_hz + self.hi_hz) / 2.0
    }

    /// Halve the span around the centre
    pub fn zoom_in(&mut self) {
        self.set_window(self.centre(), self.span() / 2.0);
    }

    /// Double the span around the centre
    pub fn zoom_out(&mut self) {
        self.set_window(self.centre(), self.span() * 2.0);
    }

    /// Shift by `fraction` of the span; negative pans down
    pub fn pan(&mut self, fraction: f64) {
        let span = self.span();
        self.set_window(self.centre() + fraction * span, span);
    }

    pub fn reset(&mut self) {
        self.lo_hz = 0.0;
        self.hi_hz = self.nyquist;
    }

    /// Index range of `frequencies` (ascending) inside the window
    pub fn bin_range(&self, frequencies: &[f64]) -> std::ops::Range<usize> {
        let start = frequencies.partition_point(|&f| f < self.lo_hz);
        let end = frequencies.partition_point(|&f| f <= self.hi_hz);
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(v: &Viewport) {
        assert!(v.lo_hz() >= 0.0);
        assert!(v.lo_hz() < v.hi_hz());
        assert!(v.hi_hz() <= v.nyquist() + 1e-9);
        assert!(v.span() >= MIN_SPAN_HZ - 1e-9);
    }

    #[test]
    fn test_zoom_in_halves_around_centre() {
        let mut v = Viewport::new(24000.0);
        v.zoom_in();
        assert_eq!(v.lo_hz(), 6000.0);
        assert_eq!(v.hi_hz(), 18000.0);
        v.zoom_out();
        assert!(v.is_full());
    }

    #[test]
    fn test_zoom_stops_at_min_span() {
        let mut v = Viewport::new(24000.0);
        for _ in 0..20 {
            v.zoom_in();
            assert_invariants(&v);
        }
        assert!((v.span() - MIN_SPAN_HZ).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_out_never_exceeds_band() {
        let mut v = Viewport::new(24000.0);
        v.zoom_out();
        assert!(v.is_full());
        assert_invariants(&v);
    }

    #[test]
    fn test_pan_clamps_at_edges() {
        let mut v = Viewport::new(24000.0);
        v.zoom_in();
        v.zoom_in();
        // span is 6000 around 12000
        v.pan(0.5);
        assert_eq!(v.lo_hz(), 12000.0);
        for _ in 0..10 {
            v.pan(0.5);
            assert_invariants(&v);
        }
        assert_eq!(v.hi_hz(), 24000.0);
        for _ in 0..20 {
            v.pan(-0.5);
        }
        assert_eq!(v.lo_hz(), 0.0);
        assert_eq!(v.span(), 6000.0);
    }

    #[test]
    fn test_reset() {
        let mut v = Viewport::new(22050.0);
        v.zoom_in();
        v.pan(0.25);
        v.reset();
        assert!(v.is_full());
        assert_eq!(v.hi_hz(), 22050.0);
    }

    #[test]
    fn test_bin_range() {
        let freqs: Vec<f64> = (0..512).map(|k| k as f64 * 46.875).collect();
        let mut v = Viewport::new(24000.0);
        assert_eq!(v.bin_range(&freqs), 0..512);

        v.zoom_in();
        let r = v.bin_range(&freqs);
        assert_eq!(r.start, 128);
        assert_eq!(r.end, 385);
        assert!(freqs[r.end - 1] <= v.hi_hz());
    }

    #[test]
    fn test_plot_mode() {
        assert_eq!("STFT".parse::<PlotMode>(), Ok(PlotMode::Spectrogram));
        assert_eq!(PlotMode::Spectrum.toggle(), PlotMode::Spectrogram);
        assert!("bars".parse::<PlotMode>().is_err());
    }
}
