//! Lock-free ring buffer between the capture callback and the worker
//!
//! Single producer, single consumer. The producer never blocks: samples that
//! do not fit are dropped and reported back to the caller.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Ring buffer of mono samples, split before use
pub struct AudioRingBuffer {
    producer: HeapProducer<f64>,
    consumer: HeapConsumer<f64>,
    capacity: usize,
}

impl AudioRingBuffer {
    /// Create new ring buffer with given capacity in samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (producer, consumer) = HeapRb::<f64>::new(capacity).split();

        Self {
            producer,
            consumer,
            capacity,
        }
    }

    /// Split into producer and consumer ends
    pub fn split(self) -> (AudioProducer, AudioConsumer) {
        (
            AudioProducer {
                producer: self.producer,
            },
            AudioConsumer {
                consumer: self.consumer,
                capacity: self.capacity,
            },
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Writing end, owned by the audio callback
pub struct AudioProducer {
    producer: HeapProducer<f64>,
}

impl AudioProducer {
    /// Write samples to buffer
    ///
    /// # Returns
    /// Number of samples actually written (less than `samples.len()` if full)
    pub fn write(&mut self, samples: &[f64]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Get number of free slots
    pub fn free_len(&self) -> usize {
        self.producer.free_len()
    }
}

/// Reading end, owned by the processing thread
pub struct AudioConsumer {
    consumer: HeapConsumer<f64>,
    capacity: usize,
}

impl AudioConsumer {
    /// Read up to `buffer.len()` samples
    ///
    /// # Returns
    /// Number of samples actually read
    pub fn read(&mut self, buffer: &mut [f64]) -> usize {
        self.consumer.pop_slice(buffer)
    }

    /// Drop everything currently buffered
    pub fn discard_all(&mut self) -> usize {
        let n = self.consumer.len();
        self.consumer.skip(n)
    }

    /// Check if buffer has n samples available
    pub fn has_data(&self, n: usize) -> bool {
        self.consumer.len() >= n
    }

    pub fn len(&self) -> usize {
        self.consumer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
