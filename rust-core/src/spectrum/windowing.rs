//! Windowing applied to time-domain frames before the FFT

/// Multiply `signal` by a precomputed window in-place
///
/// Extra samples beyond the window length are left untouched.
pub fn apply_window_inplace(signal: &mut [f64], window: &[f64]) {
    for (s, w) in signal.iter_mut().zip(window.iter()) {
        *s *= w;
    }
}

/// Sum of squared window coefficients, the power normalisation of a PSD estimate
pub fn window_power_sum(window: &[f64]) -> f64 {
    window.iter().map(|&w| w * w).sum()
}

/// Subtract the mean from a segment (constant detrend)
pub fn detrend_constant(segment: &mut [f64]) {
    if segment.is_empty() {
        return;
    }
    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    for s in segment.iter_mut() {
        *s -= mean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::windows::{generate_periodic_window, WindowType};

    #[test]
    fn test_apply_window() {
        let mut signal = vec![1.0; 100];
        let window = generate_periodic_window(WindowType::Hamming, 100);
        apply_window_inplace(&mut signal, &window);

        assert!((signal[50] - 1.0).abs() < 0.01);
        assert!(signal[0] < 0.1);
    }

    #[test]
    fn test_detrend_constant_removes_mean() {
        let mut seg = vec![3.0, 5.0, 7.0];
        detrend_constant(&mut seg);
        assert_eq!(seg, vec![-2.0, 0.0, 2.0]);

        let mut empty: Vec<f64> = Vec::new();
        detrend_constant(&mut empty);
        assert!(empty.is_empty());
    }
}
