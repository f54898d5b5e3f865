//! Fixed-size chunking of the sample stream

/// Accumulates samples and hands them out as consecutive, non-overlapping
/// chunks of exactly `chunk_size` samples
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    chunk_size: usize,
    buffer: Vec<f64>,
    /// Start of the next unread chunk in `buffer`
    read_pos: usize,
}

impl FrameAssembler {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            buffer: Vec::with_capacity(chunk_size * 4),
            read_pos: 0,
        }
    }

    /// Append samples
    pub fn push(&mut self, samples: &[f64]) {
        // Compact before growing so the buffer stays bounded
        if self.read_pos > 0 {
            self.buffer.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(samples);
    }

    /// Next complete chunk, if one is buffered
    pub fn next_frame(&mut self) -> Option<&[f64]> {
        let end = self.read_pos + self.chunk_size;
        if end > self.buffer.len() {
            return None;
        }
        let start = self.read_pos;
        self.read_pos = end;
        Some(&self.buffer[start..end])
    }

    /// Samples waiting for the next chunk
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_contiguous_and_ordered() {
        let mut fa = FrameAssembler::new(4);
        let input: Vec<f64> = (0..10).map(|i| i as f64).collect();
        fa.push(&input[..3]);
        assert!(fa.next_frame().is_none());
        fa.push(&input[3..10]);

        assert_eq!(fa.next_frame().unwrap(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(fa.next_frame().unwrap(), &[4.0, 5.0, 6.0, 7.0]);
        assert!(fa.next_frame().is_none());
        assert_eq!(fa.pending(), 2);

        fa.push(&[10.0, 11.0]);
        assert_eq!(fa.next_frame().unwrap(), &[8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_no_sample_lost_across_many_pushes() {
        let mut fa = FrameAssembler::new(1024);
        let mut seen = Vec::new();
        let mut next = 0usize;
        for len in [100, 2000, 7, 1024, 333, 4096, 1] {
            let block: Vec<f64> = (next..next + len).map(|i| i as f64).collect();
            next += len;
            fa.push(&block);
            while let Some(frame) = fa.next_frame() {
                seen.extend_from_slice(frame);
            }
        }
        assert_eq!(seen.len() + fa.pending(), next);
        assert!(seen.iter().enumerate().all(|(i, &v)| v == i as f64));
    }

    #[test]
    fn test_clear() {
        let mut fa = FrameAssembler::new(8);
        fa.push(&[1.0; 12]);
        fa.clear();
        assert_eq!(fa.pending(), 0);
        assert!(fa.next_frame().is_none());
    }
}
