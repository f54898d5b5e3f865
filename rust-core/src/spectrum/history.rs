//! Rolling spectrogram history
//!
//! Fixed-capacity ring of dB columns backing the scrolling spectrogram view.

use super::scale::DbRange;
use super::stft::SpectrogramFrame;
use ndarray::{Array2, ArrayView1, Axis};

pub struct SpectrogramHistory {
    /// Column storage, shape `(bins, capacity)`
    columns: Array2<f64>,

    /// Bin frequencies for the stored columns
    frequencies: Vec<f64>,

    /// Next column to overwrite
    write_col: usize,

    /// Number of valid columns
    len: usize,

    /// Time between columns in seconds
    seconds_per_column: f64,
}

impl SpectrogramHistory {
    /// Create an empty history for `bins` frequency rows and `capacity` columns
    pub fn new(bins: usize, capacity: usize) -> Self {
        Self {
            columns: Array2::zeros((bins, capacity.max(1))),
            frequencies: Vec::new(),
            write_col: 0,
            len: 0,
            seconds_per_column: 0.0,
        }
    }

    /// Append every column of `frame`, evicting the oldest past capacity
    ///
    /// A frame with a different bin count reshapes the history and drops
    /// what was stored.
    pub fn push_frame(&mut self, frame: &SpectrogramFrame) {
        let bins = frame.num_bins();
        if bins != self.columns.nrows() {
            let capacity = self.capacity();
            self.columns = Array2::zeros((bins, capacity));
            self.clear();
        }
        if frame.frequencies != self.frequencies {
            self.frequencies = frame.frequencies.clone();
        }
        if frame.times.len() >= 2 {
            self.seconds_per_column = frame.times[1] - frame.times[0];
        }

        for column in frame.power_db.axis_iter(Axis(1)) {
            self.push_column(column);
        }
    }

    fn push_column(&mut self, column: ArrayView1<'_, f64>) {
        let capacity = self.capacity();
        self.columns.column_mut(self.write_col).assign(&column);
        self.write_col = (self.write_col + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    /// Stored columns, oldest first
    pub fn columns(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> + '_ {
        let capacity = self.capacity();
        let start = (self.write_col + capacity - self.len) % capacity;
        (0..self.len).map(move |i| self.columns.column((start + i) % capacity))
    }

    /// The last `n` columns (or fewer), oldest first
    pub fn latest(&self, n: usize) -> impl Iterator<Item = ArrayView1<'_, f64>> + '_ {
        let skip = self.len.saturating_sub(n);
        self.columns().skip(skip)
    }

    /// Min/max dB over the stored columns
    ///
    /// `None` while empty or when every value is identical.
    pub fn value_range(&self) -> Option<DbRange> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for column in self.columns() {
            for &v in column.iter() {
                if v.is_finite() {
                    lo = lo.min(v);
                    hi = hi.max(v);
                }
            }
        }
        let range = DbRange::new(lo, hi);
        range.is_valid().then_some(range)
    }

    pub fn clear(&mut self) {
        self.write_col = 0;
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.columns.ncols()
    }

    pub fn num_bins(&self) -> usize {
        self.columns.nrows()
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn seconds_per_column(&self) -> f64 {
        self.seconds_per_column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bins: usize, values: &[f64]) -> SpectrogramFrame {
        let mut power_db = Array2::zeros((bins, values.len()));
        for (c, &v) in values.iter().enumerate() {
            power_db.column_mut(c).fill(v);
        }
        SpectrogramFrame {
            frequencies: (0..bins).map(|k| k as f64 * 100.0).collect(),
            times: (0..values.len()).map(|i| 0.005 + i as f64 * 0.005).collect(),
            power_db,
        }
    }

    fn firsts(history: &SpectrogramHistory) -> Vec<f64> {
        history.columns().map(|c| c[0]).collect()
    }

    #[test]
    fn test_push_and_order() {
        let mut history = SpectrogramHistory::new(4, 8);
        history.push_frame(&frame(4, &[1.0, 2.0, 3.0]));
        assert_eq!(history.len(), 3);
        assert_eq!(firsts(&history), vec![1.0, 2.0, 3.0]);
        assert!((history.seconds_per_column() - 0.005).abs() < 1e-12);
        assert_eq!(history.frequencies()[3], 300.0);
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let mut history = SpectrogramHistory::new(4, 4);
        history.push_frame(&frame(4, &[1.0, 2.0, 3.0]));
        history.push_frame(&frame(4, &[4.0, 5.0, 6.0]));
        assert_eq!(history.len(), 4);
        assert_eq!(firsts(&history), vec![3.0, 4.0, 5.0, 6.0]);

        let tail: Vec<f64> = history.latest(2).map(|c| c[0]).collect();
        assert_eq!(tail, vec![5.0, 6.0]);
    }

    #[test]
    fn test_bin_change_reshapes() {
        let mut history = SpectrogramHistory::new(4, 4);
        history.push_frame(&frame(4, &[1.0, 2.0]));
        history.push_frame(&frame(6, &[7.0]));
        assert_eq!(history.num_bins(), 6);
        assert_eq!(firsts(&history), vec![7.0]);
        assert_eq!(history.capacity(), 4);
    }

    #[test]
    fn test_value_range() {
        let mut history = SpectrogramHistory::new(2, 4);
        assert!(history.value_range().is_none());

        history.push_frame(&frame(2, &[-80.0]));
        assert!(history.value_range().is_none());

        history.push_frame(&frame(2, &[-20.0, -50.0]));
        let range = history.value_range().unwrap();
        assert_eq!(range, DbRange::new(-80.0, -20.0));

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.columns().count(), 0);
    }
}
