//! Themes, bar colouring and colormaps

use std::fmt;
use std::str::FromStr;

/// Hue step in degrees per drawn frame for the cycling theme
pub const COLOR_INCREMENT: f64 = 5.0;

/// 8-bit RGB triple shared by the terminal and image renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.0, c.1, c.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeKind {
    /// White background, black axes
    #[default]
    Light,
    Dark,
    /// Dark background with bars whose hue advances every frame
    Cycle,
}

impl ThemeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ThemeKind::Light => "light",
            ThemeKind::Dark => "dark",
            ThemeKind::Cycle => "cycle",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ThemeKind::Light => ThemeKind::Dark,
            ThemeKind::Dark => ThemeKind::Cycle,
            ThemeKind::Cycle => ThemeKind::Light,
        }
    }
}

impl fmt::Display for ThemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ThemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeKind::Light),
            "dark" => Ok(ThemeKind::Dark),
            "cycle" => Ok(ThemeKind::Cycle),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

/// How spectrum bars pick their colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarColoring {
    Solid,
    /// By level through viridis
    Gradient,
    /// Hue spread across the bars, rotating over time
    Cycle,
}

impl FromStr for BarColoring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solid" => Ok(BarColoring::Solid),
            "gradient" => Ok(BarColoring::Gradient),
            "cycle" => Ok(BarColoring::Cycle),
            other => Err(format!("unknown bar coloring: {other}")),
        }
    }
}

/// Resolved colours plus the running hue for [`ThemeKind::Cycle`]
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub kind: ThemeKind,
    pub background: Rgb,
    pub foreground: Rgb,
    pub grid: Rgb,
    pub bar: Rgb,
    pub coloring: BarColoring,
    hue: f64,
}

impl Theme {
    pub fn new(kind: ThemeKind) -> Self {
        match kind {
            ThemeKind::Light => Self {
                kind,
                background: Rgb(255, 255, 255),
                foreground: Rgb(0, 0, 0),
                grid: Rgb(200, 200, 200),
                bar: Rgb(31, 119, 180),
                coloring: BarColoring::Solid,
                hue: 0.0,
            },
            ThemeKind::Dark => Self {
                kind,
                background: Rgb(16, 16, 20),
                foreground: Rgb(220, 220, 220),
                grid: Rgb(60, 60, 70),
                bar: Rgb(94, 201, 98),
                coloring: BarColoring::Gradient,
                hue: 0.0,
            },
            ThemeKind::Cycle => Self {
                kind,
                background: Rgb(0, 0, 0),
                foreground: Rgb(230, 230, 230),
                grid: Rgb(50, 50, 50),
                bar: Rgb(255, 0, 0),
                coloring: BarColoring::Cycle,
                hue: 0.0,
            },
        }
    }

    pub fn next(&self) -> Self {
        Self::new(self.kind.next())
    }

    pub fn with_coloring(mut self, coloring: BarColoring) -> Self {
        self.coloring = coloring;
        self
    }

    /// Advance the rotating hue by one frame
    pub fn advance(&mut self) {
        if self.coloring == BarColoring::Cycle {
            self.hue = (self.hue + COLOR_INCREMENT) % 360.0;
        }
    }

    #[cfg(test)]
    pub fn hue(&self) -> f64 {
        self.hue
    }

    /// Colour of bar `index` of `count` at normalised level `level` (0..1)
    pub fn bar_color(&self, index: usize, count: usize, level: f64) -> Rgb {
        match self.coloring {
            BarColoring::Solid => self.bar,
            BarColoring::Gradient => viridis(level),
            BarColoring::Cycle => {
                let spread = if count > 0 {
                    360.0 * index as f64 / count as f64
                } else {
                    0.0
                };
                hsv_to_rgb(self.hue + spread, 0.85, 1.0)
            }
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::new(ThemeKind::default())
    }
}

/// Samples of matplotlib's viridis at t = 0, 1/8, ..., 1
const VIRIDIS: [(f64, f64, f64); 9] = [
    (0.267004, 0.004874, 0.329415),
    (0.282623, 0.140926, 0.457517),
    (0.253935, 0.265254, 0.529983),
    (0.206756, 0.371758, 0.553117),
    (0.163625, 0.471133, 0.558148),
    (0.127568, 0.566949, 0.550556),
    (0.134692, 0.658636, 0.517649),
    (0.266941, 0.748751, 0.440573),
    (0.993248, 0.906157, 0.143936),
];

/// Map 0..1 to viridis; out-of-range and NaN inputs clamp
pub fn viridis(t: f64) -> Rgb {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (VIRIDIS.len() - 1) as f64;
    let i = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = pos - i as f64;

    let (r0, g0, b0) = VIRIDIS[i];
    let (r1, g1, b1) = VIRIDIS[i + 1];
    Rgb(
        to_u8(r0 + (r1 - r0) * frac),
        to_u8(g0 + (g1 - g0) * frac),
        to_u8(b0 + (b1 - b0) * frac),
    )
}

/// HSV to RGB; hue in degrees (wrapped), saturation and value in 0..1
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb {
    let h = hue.rem_euclid(360.0) / 60.0;
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);

    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Rgb(to_u8(r + m), to_u8(g + m), to_u8(b + m))
}

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(viridis(0.0), Rgb(68, 1, 84));
        assert_eq!(viridis(1.0), Rgb(253, 231, 37));
        assert_eq!(viridis(-3.0), viridis(0.0));
        assert_eq!(viridis(f64::NAN), viridis(0.0));
        assert_eq!(viridis(7.0), viridis(1.0));
    }

    #[test]
    fn test_viridis_is_monotonic_in_green() {
        let mut last = 0;
        for i in 0..=100 {
            let Rgb(_, g, _) = viridis(i as f64 / 100.0);
            assert!(g >= last);
            last = g;
        }
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb(255, 0, 0));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb(0, 255, 0));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb(0, 0, 255));
        assert_eq!(hsv_to_rgb(360.0, 1.0, 1.0), Rgb(255, 0, 0));
        assert_eq!(hsv_to_rgb(-120.0, 1.0, 1.0), Rgb(0, 0, 255));
        assert_eq!(hsv_to_rgb(42.0, 0.0, 0.5), Rgb(128, 128, 128));
    }

    #[test]
    fn test_cycle_advances_hue() {
        let mut theme = Theme::new(ThemeKind::Cycle);
        let first = theme.bar_color(0, 10, 0.5);
        theme.advance();
        assert_eq!(theme.hue(), COLOR_INCREMENT);
        assert_ne!(theme.bar_color(0, 10, 0.5), first);

        for _ in 0..71 {
            theme.advance();
        }
        assert_eq!(theme.hue(), 0.0);
    }

    #[test]
    fn test_static_themes_ignore_advance() {
        let mut theme = Theme::new(ThemeKind::Light);
        theme.advance();
        assert_eq!(theme.hue(), 0.0);
        assert_eq!(theme.bar_color(3, 10, 0.9), theme.bar);
        assert_eq!(theme.background, Rgb(255, 255, 255));
        assert_eq!(theme.foreground, Rgb(0, 0, 0));
    }

    #[test]
    fn test_theme_cycle_order() {
        let kind = ThemeKind::Light.next().next().next();
        assert_eq!(kind, ThemeKind::Light);
        assert_eq!("Dark".parse::<ThemeKind>(), Ok(ThemeKind::Dark));
        assert_eq!(Theme::new(ThemeKind::Dark).next().kind, ThemeKind::Cycle);
    }
}
