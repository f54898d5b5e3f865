//! Window functions for spectral analysis and denoising
//!
//! Symmetric windows follow the filter-design convention (denominator M-1),
//! periodic windows the FFT convention (denominator M).

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Taper fraction used by [`WindowType::Tukey`]
pub const TUKEY_ALPHA: f64 = 0.25;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,

    /// Tukey (tapered cosine) window with α = [`TUKEY_ALPHA`]
    Tukey,
}

impl WindowType {
    pub fn name(&self) -> &'static str {
        match self {
            WindowType::Hann => "hann",
            WindowType::Hamming => "hamming",
            WindowType::Blackman => "blackman",
            WindowType::Rectangular => "rectangular",
            WindowType::Tukey => "tukey",
        }
    }
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hann" | "hanning" => Ok(WindowType::Hann),
            "hamming" => Ok(WindowType::Hamming),
            "blackman" => Ok(WindowType::Blackman),
            "rectangular" | "rect" | "boxcar" | "none" => Ok(WindowType::Rectangular),
            "tukey" => Ok(WindowType::Tukey),
            other => Err(format!("unknown window type: {other}")),
        }
    }
}

/// Generate symmetric window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length];
    }
    build_window(window_type, length, (length - 1) as f64)
}

/// Generate periodic window coefficients (the `fftbins=True` form)
///
/// Equivalent to the symmetric window of length M+1 with its last sample
/// dropped, which keeps overlap-added frames flat.
pub fn generate_periodic_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length];
    }
    build_window(window_type, length, length as f64)
}

fn build_window(window_type: WindowType, length: usize, denom: f64) -> Vec<f64> {
    let mut window = Vec::with_capacity(length);

    match window_type {
        WindowType::Hann => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / denom;
                window.push(0.5 - 0.5 * angle.cos());
            }
        }

        WindowType::Hamming => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / denom;
                window.push(0.54 - 0.46 * angle.cos());
            }
        }

        WindowType::Blackman => {
            for n in 0..length {
                let angle1 = 2.0 * PI * n as f64 / denom;
                let angle2 = 4.0 * PI * n as f64 / denom;
                window.push(0.42 - 0.5 * angle1.cos() + 0.08 * angle2.cos());
            }
        }

        WindowType::Rectangular => {
            window.resize(length, 1.0);
        }

        WindowType::Tukey => {
            // Cosine tapers over the first and last α/2 of the window,
            // flat top in between.
            let taper = TUKEY_ALPHA * denom / 2.0;
            for n in 0..length {
                let x = n as f64;
                let w = if x < taper {
                    0.5 * (1.0 + (PI * (x / taper - 1.0)).cos())
                } else if x > denom - taper {
                    0.5 * (1.0 + (PI * ((x - denom) / taper + 1.0)).cos())
                } else {
                    1.0
                };
                window.push(w);
            }
        }
    }

    window
}
