//! Write-queue drain
//!
//! Fetches a bounded batch of pending register writes from a
//! [`RegisterTransport`] each poll tick. The batch capacity caps per-tick work;
//! the batch storage is allocated once and reused.

use crate::port::PendingWrite;
use crate::transport::RegisterTransport;
use tracing::trace;

/// Default batch capacity in entries
pub const DEFAULT_BATCH_CAPACITY: usize = 256;

/// Counters describing drain activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Poll ticks that observed at least one pending write
    pub polls_with_writes: u64,
    /// Writes fetched and handed to the demultiplexer
    pub writes_applied: u64,
    /// Ticks whose odd pending count left the last entry unfetched
    pub odd_tail_skipped: u64,
    /// Ticks skipped because audio bring-up failed
    pub init_failures: u64,
}

/// Fixed-capacity, order-preserving batch of pending writes
#[derive(Debug, Clone)]
pub struct WriteBatch {
    entries: Vec<PendingWrite>,
    words: Vec<u32>,
    len: usize,
}

impl WriteBatch {
    /// Create a batch holding at most `capacity` entries
    ///
    /// `capacity` is rounded up to an even number so a full batch always maps
    /// onto whole transport words.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_multiple_of(2);
        WriteBatch {
            entries: vec![PendingWrite::default(); capacity],
            words: vec![0; capacity / 2],
            len: 0,
        }
    }

    /// Maximum number of entries per batch
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of entries fetched in the current batch
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the current batch is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fetched entries in arrival order
    pub fn as_slice(&self) -> &[PendingWrite] {
        &self.entries[..self.len]
    }
}

/// Polling side of the register pipeline
#[derive(Debug, Clone)]
pub struct WriteQueueDrain {
    batch: WriteBatch,
    stats: DrainStats,
}

impl WriteQueueDrain {
    /// Create a drain with the given batch capacity
    pub fn new(batch_capacity: usize) -> Self {
        WriteQueueDrain {
            batch: WriteBatch::with_capacity(batch_capacity),
            stats: DrainStats::default(),
        }
    }

    /// Batch capacity in entries
    pub fn capacity(&self) -> usize {
        self.batch.capacity()
    }

    /// Activity counters
    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    /// Record a tick skipped because bring-up failed
    pub(crate) fn note_init_failure(&mut self) {
        self.stats.init_failures += 1;
    }

    /// Fetch up to one batch of `pending` entries from `port`
    ///
    /// A single pending entry is read through the scalar path. Larger batches
    /// use the bulk path, which only moves whole words: an odd count is rounded
    /// down and the last entry is left for the transport to report again.
    pub fn fetch<T: RegisterTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        port: u32,
        pending: u16,
    ) -> &[PendingWrite] {
        let mut count = (pending as usize).min(self.batch.capacity());
        self.batch.len = 0;

        if count == 0 {
            return self.batch.as_slice();
        }

        self.stats.polls_with_writes += 1;

        if count == 1 {
            self.batch.entries[0] = PendingWrite::from_entry(transport.read_scalar(port));
        } else {
            if count % 2 != 0 {
                count -= 1;
                self.stats.odd_tail_skipped += 1;
                trace!(pending, fetched = count, "odd pending count, last entry left queued");
            }

            let words = &mut self.batch.words[..count / 2];
            transport.read_bulk(port, words);

            for (pair, &word) in self.batch.entries[..count].chunks_exact_mut(2).zip(words.iter()) {
                pair[0] = PendingWrite::from_entry(word as u16);
                pair[1] = PendingWrite::from_entry((word >> 16) as u16);
            }
        }

        self.batch.len = count;
        self.stats.writes_applied += count as u64;
        self.batch.as_slice()
    }
}

impl Default for WriteQueueDrain {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_CAPACITY)
    }
}
