/// Where a capture buffer is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
    /// Buffer full, estimate available until cleared.
    Ready,
}

/// Fixed-capacity sample accumulator spanning several processing steps.
///
/// `Idle -> Capturing` on `start`, `Capturing -> Ready` when the buffer fills,
/// `Ready -> Idle` on `reset`. Starting while `Capturing` or `Ready` does nothing.
#[derive(Debug)]
pub struct Capture {
    buffer: Vec<f32>,
    capacity: usize,
    state: CaptureState,
    completed: u64,
}

impl Capture {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            state: CaptureState::Idle,
            completed: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn filled(&self) -> usize {
        self.buffer.len()
    }

    /// Number of times the buffer has filled.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Returns `true` if a new capture began.
    pub fn start(&mut self) -> bool {
        if self.state != CaptureState::Idle {
            return false;
        }
        self.buffer.clear();
        self.state = CaptureState::Capturing;
        true
    }

    /// Appends as much of `samples` as fits. Returns the full buffer on the
    /// call that fills it.
    pub fn push(&mut self, samples: &[f32]) -> Option<&[f32]> {
        if self.state != CaptureState::Capturing {
            return None;
        }
        let take = (self.capacity - self.buffer.len()).min(samples.len());
        self.buffer.extend_from_slice(&samples[..take]);
        if self.buffer.len() < self.capacity {
            return None;
        }
        self.state = CaptureState::Ready;
        self.completed += 1;
        Some(&self.buffer)
    }

    /// Drops any partial or finished buffer and returns to `Idle`.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = CaptureState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_across_pushes() {
        let mut capture = Capture::new(4);
        assert!(capture.start());
        assert!(capture.push(&[1.0, 2.0]).is_none());
        assert_eq!(capture.state(), CaptureState::Capturing);
        let full = capture.push(&[3.0, 4.0, 5.0]).unwrap().to_vec();
        assert_eq!(full, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(capture.state(), CaptureState::Ready);
        assert_eq!(capture.completed(), 1);
    }

    #[test]
    fn start_is_ignored_while_busy() {
        let mut capture = Capture::new(4);
        assert!(capture.start());
        capture.push(&[1.0, 2.0]);
        assert!(!capture.start());
        assert_eq!(capture.filled(), 2);
        capture.push(&[3.0, 4.0]);
        assert!(!capture.start());
        assert_eq!(capture.state(), CaptureState::Ready);
        capture.reset();
        assert!(capture.start());
        assert_eq!(capture.filled(), 0);
    }

    #[test]
    fn idle_capture_ignores_samples() {
        let mut capture = Capture::new(2);
        assert!(capture.push(&[1.0, 2.0]).is_none());
        assert_eq!(capture.filled(), 0);
        assert_eq!(capture.completed(), 0);
    }

    #[test]
    fn reset_abandons_partial_capture() {
        let mut capture = Capture::new(4);
        capture.start();
        capture.push(&[1.0]);
        capture.reset();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.completed(), 0);
    }
}
