//! Decibel conversion and display clamping

/// Convert an amplitude to dB: 20·log10(mag + ε)
#[inline]
pub fn amplitude_to_db(magnitude: f64, epsilon: f64) -> f64 {
    20.0 * (magnitude + epsilon).log10()
}

/// Convert a power value to dB: 10·log10(p + ε)
#[inline]
pub fn power_to_db(power: f64, epsilon: f64) -> f64 {
    10.0 * (power + epsilon).log10()
}

/// Closed dB interval used for clamping and colour scaling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbRange {
    pub floor: f64,
    pub ceil: f64,
}

impl DbRange {
    pub const fn new(floor: f64, ceil: f64) -> Self {
        Self { floor, ceil }
    }

    /// Whether the range is usable (finite and non-empty)
    pub fn is_valid(&self) -> bool {
        self.floor.is_finite() && self.ceil.is_finite() && self.floor < self.ceil
    }

    pub fn span(&self) -> f64 {
        self.ceil - self.floor
    }

    /// Clamp into the range; NaN and inverted ranges map to the floor
    #[inline]
    pub fn clamp(&self, db: f64) -> f64 {
        if db.is_nan() || !(self.floor <= self.ceil) {
            return self.floor;
        }
        db.clamp(self.floor, self.ceil)
    }

    /// Position of `db` inside the range, 0.0 at the floor and 1.0 at the ceiling
    #[inline]
    pub fn normalize(&self, db: f64) -> f64 {
        let span = self.span();
        if span <= 0.0 {
            return 0.0;
        }
        (self.clamp(db) - self.floor) / span
    }
}

impl Default for DbRange {
    fn default() -> Self {
        Self::new(-200.0, 200.0)
    }
}
