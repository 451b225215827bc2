use std::sync::atomic::{AtomicBool, Ordering};

/// Progress and cancellation hooks for a decode.
///
/// Cancellation is polled before every block. A cancelled decode is not an
/// error; it returns whatever it assembled up to that point.
pub trait DecodeMonitor {
    fn start(&mut self, total_blocks: u64);
    fn advance(&mut self, blocks: u64);
    fn finish(&mut self);

    fn is_cancelled(&self) -> bool {
        false
    }
}

pub struct NoProgress;

impl DecodeMonitor for NoProgress {
    fn start(&mut self, _total_blocks: u64) {}
    fn advance(&mut self, _blocks: u64) {}
    fn finish(&mut self) {}
}

/// A bare cancellation flag, e.g. set from a Ctrl-C handler.
impl DecodeMonitor for AtomicBool {
    fn start(&mut self, _total_blocks: u64) {}
    fn advance(&mut self, _blocks: u64) {}
    fn finish(&mut self) {}

    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}
