/// Circular buffer of f32 samples shared between a capture callback and
/// the mix/writer thread. Wrap in `Arc<parking_lot::Mutex<_>>` for
/// cross-thread use.
///
/// Overflow drops the oldest samples, so a stalled consumer bounds
/// memory at `capacity` instead of growing without limit.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<f32>,
    write_index: usize,
    read_index: usize,
    available: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer needs a nonzero capacity");
        Self {
            storage: vec![0.0; capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
        }
    }

    /// Append samples, discarding the oldest on overflow. If `samples`
    /// exceeds capacity outright, only its tail is kept.
    pub fn write(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        let capacity = self.storage.len();
        let samples = if samples.len() > capacity {
            &samples[samples.len() - capacity..]
        } else {
            samples
        };

        let overflow = (self.available + samples.len()).saturating_sub(capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % capacity;
            self.available -= overflow;
        }

        // At most two contiguous segments: up to the end, then wrapped.
        let first = samples.len().min(capacity - self.write_index);
        self.storage[self.write_index..self.write_index + first].copy_from_slice(&samples[..first]);
        let rest = samples.len() - first;
        if rest > 0 {
            self.storage[..rest].copy_from_slice(&samples[first..]);
        }
        self.write_index = (self.write_index + samples.len()) % capacity;
        self.available += samples.len();
    }

    /// Remove and return up to `count` samples in arrival order.
    pub fn read(&mut self, count: usize) -> Vec<f32> {
        let to_read = count.min(self.available);
        if to_read == 0 {
            return Vec::new();
        }

        let capacity = self.storage.len();
        let mut out = Vec::with_capacity(to_read);
        let first = to_read.min(capacity - self.read_index);
        out.extend_from_slice(&self.storage[self.read_index..self.read_index + first]);
        if to_read > first {
            out.extend_from_slice(&self.storage[..to_read - first]);
        }
        self.read_index = (self.read_index + to_read) % capacity;
        self.available -= to_read;
        out
    }

    pub fn len(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Discard everything and return to the empty state.
    pub fn clear(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_preserves_order() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0]);

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read(3), vec![1.0, 2.0, 3.0]);
        assert!(buf.is_empty());
    }

    #[test]
    fn short_read_leaves_remainder() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.read(3), vec![1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.read(10), vec![4.0, 5.0]);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0, 4.0]);
        buf.write(&[5.0, 6.0]);

        assert_eq!(buf.len(), 4);
        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn oversized_write_keeps_tail() {
        let mut buf = RingBuffer::new(3);
        buf.write(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(buf.read(3), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn wraparound() {
        let mut buf = RingBuffer::new(4);
        buf.write(&[1.0, 2.0, 3.0]);
        buf.read(2);
        buf.write(&[4.0, 5.0, 6.0]);

        assert_eq!(buf.read(4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn clear_releases_everything() {
        let mut buf = RingBuffer::new(10);
        buf.write(&[1.0, 2.0, 3.0]);
        buf.clear();

        assert!(buf.is_empty());
        assert!(buf.read(10).is_empty());
    }
}
