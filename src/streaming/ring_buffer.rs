//! Ring buffer of interleaved PCM samples
//!
//! One producer (the render callback) and one consumer (the audio device)
//! share a fixed allocation. Memory consumption is fixed at
//! `capacity * size_of::<i16>()` regardless of playback duration.

use crate::{Opl3Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Largest ring the output will allocate (64 MB of samples)
const MAX_CAPACITY: usize = 64 * 1024 * 1024 / std::mem::size_of::<i16>();

/// Ring buffer for streaming `i16` samples
///
/// Positions are tracked with atomics so fill queries never take the lock;
/// sample copies happen under a `parking_lot::Mutex`.
#[derive(Debug)]
pub struct SampleRing {
    buffer: Mutex<Vec<i16>>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    capacity: usize,
    mask: usize,
}

impl SampleRing {
    /// Create a ring holding at least `requested_capacity - 1` samples
    ///
    /// Capacity is rounded up to the next power of 2; one slot always stays
    /// empty to tell a full ring from an empty one.
    pub fn new(requested_capacity: usize) -> Result<Self> {
        if requested_capacity == 0 {
            return Err(Opl3Error::ConfigError(
                "Ring buffer capacity must be greater than 0".into(),
            ));
        }

        let capacity = requested_capacity.next_power_of_two();
        if capacity > MAX_CAPACITY {
            return Err(Opl3Error::ConfigError(format!(
                "Ring buffer capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }

        Ok(SampleRing {
            buffer: Mutex::new(vec![0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Allocated capacity in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples queued for the consumer
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Samples the producer can write without overwriting unread data
    pub fn available_write(&self) -> usize {
        self.capacity - 1 - self.available_read()
    }

    /// Write samples (producer); returns the number written
    pub fn write(&self, samples: &[i16]) -> usize {
        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let free = self.capacity - 1 - write_pos.wrapping_sub(read_pos);

        let to_write = samples.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let idx = write_pos & self.mask;
        let first = to_write.min(self.capacity - idx);
        buf[idx..idx + first].copy_from_slice(&samples[..first]);
        buf[..to_write - first].copy_from_slice(&samples[first..to_write]);
        drop(buf);

        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);
        to_write
    }

    /// Read samples (consumer); returns the number read
    pub fn read(&self, dest: &mut [i16]) -> usize {
        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);

        let to_read = dest.len().min(write_pos.wrapping_sub(read_pos));
        if to_read == 0 {
            return 0;
        }

        let idx = read_pos & self.mask;
        let first = to_read.min(self.capacity - idx);
        dest[..first].copy_from_slice(&buf[idx..idx + first]);
        dest[first..to_read].copy_from_slice(&buf[..to_read - first]);
        drop(buf);

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);
        to_read
    }

    /// Discard all queued samples
    pub fn clear(&self) {
        let _buf = self.buffer.lock();
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }
}
