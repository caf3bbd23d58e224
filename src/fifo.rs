//! Single-producer single-consumer byte queues shared between the
//! foreground loop and the line-engine tick.
//!
//! One queue carries outbound scan codes (scanner to engine), the other
//! inbound host bytes (engine to command processor). Capacity is 128 so an
//! index fits in one byte and wrap is a conditional assignment; `start ==
//! end` means empty, leaving 127 usable slots. Overflow drops the oldest
//! byte rather than the newest, trading event loss for bounded latency.

use std::sync::atomic::{AtomicU8, Ordering};

pub const CAPACITY: usize = 128;

pub struct Fifo {
    slots: [AtomicU8; CAPACITY],
    start: AtomicU8,
    end: AtomicU8,
}

impl Default for Fifo {
    fn default() -> Self {
        Self::new()
    }
}

impl Fifo {
    pub const fn new() -> Self {
        const ZERO: AtomicU8 = AtomicU8::new(0);
        Self {
            slots: [ZERO; CAPACITY],
            start: AtomicU8::new(0),
            end: AtomicU8::new(0),
        }
    }

    fn bump(ix: u8) -> u8 {
        if ix as usize + 1 == CAPACITY { 0 } else { ix + 1 }
    }

    pub fn is_empty(&self) -> bool {
        self.start.load(Ordering::Acquire) == self.end.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        let start = self.start.load(Ordering::Acquire) as usize;
        let end = self.end.load(Ordering::Acquire) as usize;
        (end + CAPACITY - start) % CAPACITY
    }

    /// Append a byte. When the queue is full the oldest byte is dropped by
    /// advancing the read index as well. That read-index write belongs to
    /// the consumer otherwise; on hardware the whole push runs with the
    /// tick interrupt masked.
    pub fn push(&self, byte: u8) {
        let end = self.end.load(Ordering::Relaxed);
        self.slots[end as usize].store(byte, Ordering::Relaxed);
        let next = Self::bump(end);
        self.end.store(next, Ordering::Release);
        if next == self.start.load(Ordering::Acquire) {
            self.start.store(Self::bump(next), Ordering::Release);
        }
    }

    /// Remove and return the oldest byte.
    pub fn pop(&self) -> Option<u8> {
        let start = self.start.load(Ordering::Relaxed);
        if start == self.end.load(Ordering::Acquire) {
            return None;
        }
        let byte = self.slots[start as usize].load(Ordering::Relaxed);
        self.start.store(Self::bump(start), Ordering::Release);
        Some(byte)
    }

    /// Read the oldest byte without consuming it. The engine loads its
    /// shift register from here at frame start and only pops once the stop
    /// bit has been clocked out.
    pub fn peek(&self) -> Option<u8> {
        let start = self.start.load(Ordering::Relaxed);
        if start == self.end.load(Ordering::Acquire) {
            return None;
        }
        Some(self.slots[start as usize].load(Ordering::Relaxed))
    }

    /// Reset both indices to zero, discarding all queued bytes. Used to
    /// drop stale outbound content when a host byte is accepted.
    pub fn clear(&self) {
        self.start.store(0, Ordering::Release);
        self.end.store(0, Ordering::Release);
    }
}
