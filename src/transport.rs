//! DMA-style register transport
//!
//! The emulated device queues register writes as 16-bit entries (port selector
//! in the high byte, value in the low byte) and exposes them through a small
//! mailbox: a status port reporting how many entries are pending, and a data
//! port that hands them out one at a time or in 32-bit words.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Read side of the register-write mailbox
pub trait RegisterTransport {
    /// Number of queued entries visible at the status port
    fn pending_writes(&mut self, port: u32) -> u16;

    /// Fetch a single entry from the data port
    fn read_scalar(&mut self, port: u32) -> u16;

    /// Fetch `dest.len()` words from the data port
    ///
    /// Each word carries two entries, the earlier one in the low half. The bulk
    /// path only moves whole words, so callers must request an even number of
    /// entries.
    fn read_bulk(&mut self, port: u32, dest: &mut [u32]);
}

/// In-process register mailbox
///
/// Cloning yields another handle onto the same queue, so an emulator thread
/// can [`push`](Self::push) writes while the bridge drains them through
/// [`RegisterTransport`]. Entries not fetched stay queued for the next poll.
/// The port arguments of the transport methods are ignored.
#[derive(Debug, Clone, Default)]
pub struct QueueTransport {
    queue: Arc<Mutex<VecDeque<u16>>>,
}

impl QueueTransport {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one port write
    pub fn push(&self, port: u8, value: u8) {
        self.queue
            .lock()
            .push_back(((port as u16) << 8) | value as u16);
    }

    /// Queue several port writes in order
    pub fn extend<I: IntoIterator<Item = (u8, u8)>>(&self, writes: I) {
        let mut queue = self.queue.lock();
        queue.extend(
            writes
                .into_iter()
                .map(|(port, value)| ((port as u16) << 8) | value as u16),
        );
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

impl RegisterTransport for QueueTransport {
    fn pending_writes(&mut self, _port: u32) -> u16 {
        self.queue.lock().len().min(u16::MAX as usize) as u16
    }

    fn read_scalar(&mut self, _port: u32) -> u16 {
        self.queue.lock().pop_front().unwrap_or(0)
    }

    fn read_bulk(&mut self, _port: u32, dest: &mut [u32]) {
        let mut queue = self.queue.lock();
        for word in dest.iter_mut() {
            let lo = queue.pop_front().unwrap_or(0) as u32;
            let hi = queue.pop_front().unwrap_or(0) as u32;
            *word = (hi << 16) | lo;
        }
    }
}
