//! Noise gate with RMS envelope detection
//!
//! Reduces gain when signal level falls below threshold, useful for
//! removing background noise during silent periods.

/// Gap between the opening and closing thresholds
const HYSTERESIS_DB: f64 = 3.0;

/// Length of the sliding RMS window in seconds
const RMS_WINDOW_S: f64 = 0.050;

/// Gate parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateParams {
    /// Threshold in dBFS below which the gate closes
    pub threshold_db: f64,

    /// Opening time in milliseconds
    pub attack_ms: f64,

    /// Closing time in milliseconds
    pub release_ms: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            threshold_db: -40.0,
            attack_ms: 10.0,
            release_ms: 100.0,
        }
    }
}

/// Noise gate processor
pub struct NoiseGate {
    params: GateParams,

    /// Exponential smoothing coefficients
    attack_coeff: f64,
    release_coeff: f64,

    /// Current gain (linear, 0.0 to 1.0)
    envelope: f64,

    /// Sliding window for RMS calculation
    rms_buffer: Vec<f64>,
    rms_cursor: usize,
    sum_of_squares: f64,

    sample_rate: f64,

    /// Whether gate is currently open (for hysteresis)
    is_open: bool,
}

impl NoiseGate {
    /// Create a new noise gate
    ///
    /// # Arguments
    /// * `params` - Threshold and timing
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(params: GateParams, sample_rate: f64) -> Self {
        let rms_window_size = ((RMS_WINDOW_S * sample_rate) as usize).max(1);

        Self {
            attack_coeff: Self::time_constant_to_coeff(params.attack_ms, sample_rate),
            release_coeff: Self::time_constant_to_coeff(params.release_ms, sample_rate),
            params,
            envelope: 0.0,
            rms_buffer: vec![0.0; rms_window_size],
            rms_cursor: 0,
            sum_of_squares: 0.0,
            sample_rate,
            is_open: false,
        }
    }

    /// coeff = exp(-1 / (tau * sample_rate)); zero time means instant
    fn time_constant_to_coeff(time_ms: f64, sample_rate: f64) -> f64 {
        let tau = time_ms / 1000.0;
        if tau <= 0.0 || sample_rate <= 0.0 {
            return 0.0;
        }
        (-1.0 / (tau * sample_rate)).exp()
    }

    /// Replace threshold and timing, keeping the current envelope
    pub fn set_params(&mut self, params: GateParams) {
        self.attack_coeff = Self::time_constant_to_coeff(params.attack_ms, self.sample_rate);
        self.release_coeff = Self::time_constant_to_coeff(params.release_ms, self.sample_rate);
        self.params = params;
    }

    #[inline]
    fn process_sample(&mut self, input: f64) -> f64 {
        let old_sample = self.rms_buffer[self.rms_cursor];
        self.rms_buffer[self.rms_cursor] = input;
        // Clamp away negative drift from float cancellation
        self.sum_of_squares = (self.sum_of_squares - old_sample * old_sample + input * input).max(0.0);
        self.rms_cursor = (self.rms_cursor + 1) % self.rms_buffer.len();

        let rms = (self.sum_of_squares / self.rms_buffer.len() as f64).sqrt();
        let level_db = 20.0 * (rms + 1e-10).log10();

        if self.is_open {
            if level_db < self.params.threshold_db - HYSTERESIS_DB {
                self.is_open = false;
            }
        } else if level_db >= self.params.threshold_db {
            self.is_open = true;
        }

        let target_gain = if self.is_open { 1.0 } else { 0.0 };
        let coeff = if target_gain > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * target_gain;

        input * self.envelope
    }

    /// Process a block in-place
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset gate state
    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.rms_buffer.fill(0.0);
        self.rms_cursor = 0;
        self.sum_of_squares = 0.0;
        self.is_open = false;
    }

    /// Current gain (0.0 to 1.0)
    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn params(&self) -> GateParams {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(threshold_db: f64, attack_ms: f64, release_ms: f64) -> NoiseGate {
        NoiseGate::new(
            GateParams {
                threshold_db,
                attack_ms,
                release_ms,
            },
            48000.0,
        )
    }

    #[test]
    fn test_opens_above_threshold() {
        let mut g = gate(-40.0, 10.0, 100.0);
        // 0.1 is -20 dBFS
        let mut loud = vec![0.1; 4800];
        g.process_block_inplace(&mut loud);
        assert!(g.is_open());
        assert!(g.envelope() > 0.5);
    }

    #[test]
    fn test_closes_below_threshold() {
        let mut g = gate(-40.0, 1.0, 5.0);
        let mut loud = vec![0.1; 4800];
        g.process_block_inplace(&mut loud);

        // -80 dBFS for 200 ms
        let mut quiet = vec![0.0001; 9600];
        g.process_block_inplace(&mut quiet);
        assert!(!g.is_open());
        assert!(g.envelope() < 0.01);
        assert!(quiet.last().unwrap().abs() < 1e-5);
    }

    #[test]
    fn test_hysteresis_holds_gate_open() {
        let mut g = gate(-40.0, 1.0, 1.0);
        assert!(!g.is_open());

        // ~-38 dBFS opens it
        let mut above = vec![0.0126; 4800];
        g.process_block_inplace(&mut above);
        assert!(g.is_open());

        // ~-42 dBFS is inside the 3 dB band, so it stays open
        let mut slightly_below = vec![0.0079; 4800];
        g.process_block_inplace(&mut slightly_below);
        assert!(g.is_open());
    }

    #[test]
    fn test_reset_closes() {
        let mut g = gate(-40.0, 1.0, 1.0);
        let mut loud = vec![0.5; 1000];
        g.process_block_inplace(&mut loud);
        g.reset();
        assert!(!g.is_open());
        assert_eq!(g.envelope(), 0.0);
    }

    #[test]
    fn test_zero_times_are_instant() {
        let mut g = gate(-40.0, 0.0, 0.0);
        let mut loud = vec![0.5; 2400];
        g.process_block_inplace(&mut loud);
        assert_eq!(g.envelope(), 1.0);
        assert_eq!(*loud.last().unwrap(), 0.5);
    }
}
