// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Buffer Queue
//!
//! FIFO of frame buffers waiting for the DMA engine, shared between the
//! submission path and the frame-completion (interrupt) path. The list, the
//! skip-first-interrupt flag, the sequence counter and the completion counters
//! live behind a single [`spin::Mutex`]: it never sleeps, so the interrupt path
//! may take it. It is held only for the list mutation itself. Backend calls
//! and done notifications happen after it is released.
//!
//! The head of the queue is the buffer the hardware is currently writing.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use unix_ts::Timestamp;

/// Bus address of a frame buffer as seen by the DMA engine.
pub type DmaAddr = u64;

/// Frame buffer descriptor handed over by the buffer-queue collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Caller-side buffer index.
    pub index: u32,
    pub addr: DmaAddr,
    /// Allocated length in bytes.
    pub length: usize,
}

impl FrameBuffer {
    pub fn new(index: u32, addr: DmaAddr, length: usize) -> Self {
        FrameBuffer {
            index,
            addr,
            length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Filled with a captured frame.
    Done,
    /// Returned without data (stream torn down or buffers released).
    Error,
}

/// A buffer returned to its owner.
#[derive(Debug, Clone)]
pub struct CompletedBuffer {
    pub buffer: FrameBuffer,
    pub sequence: u32,
    pub timestamp: Timestamp,
    pub state: BufferState,
}

/// Receiver of buffers leaving the coordinator.
///
/// Called from the frame-completion path, so implementations must not block.
pub trait BufferDone: Send + Sync {
    fn buffer_done(&self, buffer: CompletedBuffer);
}

impl<F> BufferDone for F
where
    F: Fn(CompletedBuffer) + Send + Sync,
{
    fn buffer_done(&self, buffer: CompletedBuffer) {
        self(buffer)
    }
}

/// Outcome of one hardware frame-complete signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Signal arrived while not streaming; ignored.
    Spurious,
    /// First signal after stream enable, discarded.
    Skipped,
    /// No buffer queued; the hardware keeps the last programmed address.
    Dropped,
    /// The head buffer was returned with this sequence number.
    Completed { sequence: u32 },
}

/// Counters of the frame-completion path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Sequence number the next completed buffer will carry.
    pub sequence: u32,
    pub completed: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub spurious: u64,
    /// Failed `update_buffer_address` calls on the completion path.
    pub address_errors: u64,
    /// Buffers currently queued.
    pub queued: usize,
}

/// Wall-clock completion time.
pub fn now() -> Timestamp {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Timestamp::new(elapsed.as_secs() as i64, elapsed.subsec_nanos())
}

pub(crate) enum Completion {
    Spurious,
    Skipped,
    Dropped,
    Done {
        buffer: CompletedBuffer,
        next: Option<DmaAddr>,
    },
}

#[derive(Debug, Default)]
struct DmaQueue {
    buffers: VecDeque<FrameBuffer>,
    streaming: bool,
    skip_first_interrupt: bool,
    stats: CaptureStats,
}

#[derive(Debug, Default)]
pub struct BufferQueue {
    inner: spin::Mutex<DmaQueue>,
}

impl BufferQueue {
    pub fn new() -> Self {
        BufferQueue::default()
    }

    /// Appends `buffer`. Returns its address when it became the head of an
    /// armed queue: the hardware is still pointed at a buffer already handed
    /// back, so the caller must program this one.
    pub fn push(&self, buffer: FrameBuffer) -> Option<DmaAddr> {
        let mut queue = self.inner.lock();
        let refill = queue.streaming && queue.buffers.is_empty();
        let addr = buffer.addr;
        queue.buffers.push_back(buffer);
        refill.then_some(addr)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffers.is_empty()
    }

    /// Address of the buffer the hardware should be writing.
    pub fn head_addr(&self) -> Option<DmaAddr> {
        self.inner.lock().buffers.front().map(|buf| buf.addr)
    }

    pub fn stats(&self) -> CaptureStats {
        let queue = self.inner.lock();
        CaptureStats {
            queued: queue.buffers.len(),
            ..queue.stats
        }
    }

    /// Arms the completion path for a new streaming session.
    pub(crate) fn arm(&self) {
        let mut queue = self.inner.lock();
        queue.streaming = true;
        queue.skip_first_interrupt = true;
        queue.stats.sequence = 0;
    }

    pub(crate) fn disarm(&self) {
        let mut queue = self.inner.lock();
        queue.streaming = false;
        queue.skip_first_interrupt = false;
    }

    /// Removes every queued buffer, oldest first.
    pub(crate) fn drain(&self) -> Vec<FrameBuffer> {
        let mut queue = self.inner.lock();
        queue.buffers.drain(..).collect()
    }

    pub(crate) fn record_address_error(&self) {
        self.inner.lock().stats.address_errors += 1;
    }

    /// Bookkeeping for one frame-complete signal. Never calls out.
    pub(crate) fn complete(&self, timestamp: Timestamp) -> Completion {
        let mut queue = self.inner.lock();
        if !queue.streaming {
            queue.stats.spurious += 1;
            return Completion::Spurious;
        }
        if queue.skip_first_interrupt {
            queue.skip_first_interrupt = false;
            queue.stats.skipped += 1;
            return Completion::Skipped;
        }
        let Some(buffer) = queue.buffers.pop_front() else {
            queue.stats.dropped += 1;
            return Completion::Dropped;
        };

        let sequence = queue.stats.sequence;
        queue.stats.sequence = sequence.wrapping_add(1);
        queue.stats.completed += 1;
        let next = queue.buffers.front().map(|buf| buf.addr);

        Completion::Done {
            buffer: CompletedBuffer {
                buffer,
                sequence,
                timestamp,
                state: BufferState::Done,
            },
            next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done_index(completion: Completion) -> (u32, u32, Option<DmaAddr>) {
        match completion {
            Completion::Done { buffer, next } => (buffer.buffer.index, buffer.sequence, next),
            _ => panic!("expected a completed buffer"),
        }
    }

    #[test]
    fn test_spurious_when_idle() {
        let queue = BufferQueue::new();
        queue.push(FrameBuffer::new(0, 0x1000, 64));
        assert!(matches!(queue.complete(now()), Completion::Spurious));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stats().spurious, 1);
    }

    #[test]
    fn test_skip_then_fifo() {
        let queue = BufferQueue::new();
        for i in 0..3 {
            queue.push(FrameBuffer::new(i, 0x1000 * (u64::from(i) + 1), 64));
        }
        queue.arm();
        assert!(matches!(queue.complete(now()), Completion::Skipped));
        assert_eq!(queue.len(), 3);

        assert_eq!(done_index(queue.complete(now())), (0, 0, Some(0x2000)));
        assert_eq!(done_index(queue.complete(now())), (1, 1, Some(0x3000)));
        assert_eq!(done_index(queue.complete(now())), (2, 2, None));

        assert!(matches!(queue.complete(now()), Completion::Dropped));
        let stats = queue.stats();
        assert_eq!(stats.sequence, 3);
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.queued, 0);
    }

    #[test]
    fn test_arm_resets_sequence() {
        let queue = BufferQueue::new();
        queue.push(FrameBuffer::new(0, 0x1000, 64));
        queue.push(FrameBuffer::new(1, 0x2000, 64));
        queue.arm();
        queue.complete(now());
        queue.complete(now());
        queue.disarm();
        assert_eq!(queue.stats().sequence, 1);

        queue.arm();
        queue.complete(now());
        assert_eq!(done_index(queue.complete(now())).1, 0);
    }

    #[test]
    fn test_push_into_drained_queue_needs_programming() {
        let queue = BufferQueue::new();
        assert_eq!(queue.push(FrameBuffer::new(0, 0x1000, 64)), None);
        queue.arm();
        queue.complete(now());
        assert_eq!(done_index(queue.complete(now())), (0, 0, None));

        assert_eq!(queue.push(FrameBuffer::new(1, 0x2000, 64)), Some(0x2000));
        assert_eq!(queue.push(FrameBuffer::new(2, 0x3000, 64)), None);

        queue.disarm();
        queue.drain();
        assert_eq!(queue.push(FrameBuffer::new(3, 0x4000, 64)), None);
    }

    #[test]
    fn test_drain_preserves_order() {
        let queue = BufferQueue::new();
        queue.push(FrameBuffer::new(4, 0x4000, 64));
        queue.push(FrameBuffer::new(2, 0x2000, 64));
        assert_eq!(queue.head_addr(), Some(0x4000));
        let drained: Vec<u32> = queue.drain().into_iter().map(|b| b.index).collect();
        assert_eq!(drained, vec![4, 2]);
        assert!(queue.is_empty());
    }
}
