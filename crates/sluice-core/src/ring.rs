//! Multi-reader circular sample buffer with plungers and trapdoors.
//!
//! One producer writes, any number of attached readers consume at their own
//! pace. Free space is bounded by the slowest reader, so a stalled consumer
//! backpressures the producer.
//!
//! # Plungers
//!
//! A plunger is a zero-width segment boundary recorded at the write position.
//! [`RingBuffer::wait_ready`] never reports data past a plunger the reader has
//! not yet passed: it returns the distance to that plunger instead (possibly
//! zero). The reader then reads up to it and calls
//! [`skip_plungers`](RingBuffer::skip_plungers) to move on. Several plungers
//! may share one position; each must be skipped explicitly, and the per-reader
//! skip count resets whenever the reader advances.
//!
//! # Trapdoors
//!
//! Every blocking call takes the caller's [`Trapdoor`]. Opening it on the
//! buffer wakes all waiters, and every wait rechecks membership after each
//! wake, returning [`Bail`] so the caller can unwind.
//!
//! # Storage
//!
//! Positions are absolute `u64` sample counts. Committed data lives in a
//! queue of blocks: the vector a [`ScratchView`] was written into becomes
//! the next block as it is, so writing through a view never copies. A block
//! is recycled for later views once every reader has passed its end.
//! Capacity, always a power of two, bounds how many samples are held.

use std::collections::{HashSet, VecDeque};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::Bail;
use crate::signal::SignalType;
use crate::trapdoor::{Trapdoor, TrapdoorId};
use crate::view::{BufferData, ScratchView};

/// Negotiated type state of the wire a buffer carries.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypeSlot {
    /// The producer has not finished type negotiation.
    #[default]
    Pending,
    /// The producer published a type.
    Ready(SignalType),
    /// The producer has no type for this output.
    Null,
    /// The producer failed to start.
    Failed,
}

/// Handle for one attached reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(usize);

impl ReaderId {
    /// Slot index of this reader.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct ReaderState {
    read: u64,
    /// Plungers at `read` this reader has already passed.
    ignored: usize,
}

/// Spare block allocations kept for reuse.
const SPARE_BLOCKS: usize = 8;

/// One committed run of samples.
#[derive(Debug)]
struct Block {
    start: u64,
    words: Vec<f32>,
}

#[derive(Debug)]
struct RingState {
    blocks: VecDeque<Block>,
    spare: Vec<Vec<f32>>,
    capacity: usize,
    stride: usize,
    written: u64,
    plungers: VecDeque<u64>,
    readers: Vec<Option<ReaderState>>,
    trapdoors: HashSet<TrapdoorId>,
    scratch_live: bool,
    signal: TypeSlot,
    min_capacity: usize,
}

impl RingState {
    fn reader(&self, id: ReaderId) -> &ReaderState {
        match self.readers.get(id.0) {
            Some(Some(r)) => r,
            _ => panic!("reader {} is not attached", id.0),
        }
    }

    fn reader_mut(&mut self, id: ReaderId) -> &mut ReaderState {
        match self.readers.get_mut(id.0) {
            Some(Some(r)) => r,
            _ => panic!("reader {} is not attached", id.0),
        }
    }

    fn used_by(&self, r: &ReaderState) -> usize {
        (self.written - r.read) as usize
    }

    fn max_used(&self) -> usize {
        self.readers
            .iter()
            .flatten()
            .map(|r| self.used_by(r))
            .max()
            .unwrap_or(0)
    }

    fn free(&self) -> usize {
        self.capacity - self.max_used()
    }

    fn cancelled(&self, trapdoor: &Trapdoor) -> bool {
        trapdoor.is_open() || self.trapdoors.contains(&trapdoor.id())
    }

    /// Distance from `r` to the first plunger it has not passed.
    fn next_plunger(&self, r: &ReaderState) -> Option<usize> {
        let mut colocated = 0;
        for &p in &self.plungers {
            if p < r.read {
                continue;
            }
            if p == r.read {
                colocated += 1;
                if colocated <= r.ignored {
                    continue;
                }
            }
            return Some((p - r.read) as usize);
        }
        None
    }

    fn unskipped_at(&self, r: &ReaderState) -> usize {
        let at = self.plungers.iter().filter(|&&p| p == r.read).count();
        at.saturating_sub(r.ignored)
    }

    /// Drops plungers every reader has passed.
    fn prune(&mut self) {
        while let Some(&p) = self.plungers.front() {
            let passed = self
                .readers
                .iter()
                .flatten()
                .all(|r| r.read > p || (r.read == p && r.ignored >= 1));
            if !passed {
                break;
            }
            self.plungers.pop_front();
            for r in self.readers.iter_mut().flatten() {
                if r.read == p {
                    r.ignored -= 1;
                }
            }
        }
    }

    fn take_spare(&mut self) -> Vec<f32> {
        self.spare.pop().unwrap_or_default()
    }

    fn recycle(&mut self, mut words: Vec<f32>) {
        if self.spare.len() < SPARE_BLOCKS {
            words.clear();
            self.spare.push(words);
        }
    }

    /// Publishes `words` as the next block.
    fn append(&mut self, words: Vec<f32>) {
        let n = words.len() / self.stride;
        if n == 0 {
            self.recycle(words);
            return;
        }
        self.blocks.push_back(Block {
            start: self.written,
            words,
        });
        self.written += n as u64;
        self.release();
    }

    fn store(&mut self, words: &[f32]) {
        let mut block = self.take_spare();
        block.extend_from_slice(words);
        self.append(block);
    }

    fn block_end(&self, block: &Block) -> u64 {
        block.start + (block.words.len() / self.stride) as u64
    }

    fn load(&self, from: u64, n: usize) -> Vec<f32> {
        let stride = self.stride;
        let to = from + n as u64;
        let mut out = Vec::with_capacity(n * stride);
        for block in &self.blocks {
            let end = self.block_end(block);
            if end <= from {
                continue;
            }
            if block.start >= to {
                break;
            }
            let lo = (from.max(block.start) - block.start) as usize;
            let hi = (to.min(end) - block.start) as usize;
            out.extend_from_slice(&block.words[lo * stride..hi * stride]);
        }
        out
    }

    /// Recycles blocks every reader has passed.
    fn release(&mut self) {
        let low = self
            .readers
            .iter()
            .flatten()
            .map(|r| r.read)
            .min()
            .unwrap_or(self.written);
        while let Some(front) = self.blocks.front() {
            if self.block_end(front) > low {
                break;
            }
            if let Some(block) = self.blocks.pop_front() {
                self.recycle(block.words);
            }
        }
    }

    fn realloc(&mut self, capacity: usize, stride: usize) {
        assert!(
            !self.scratch_live,
            "cannot resize a ring buffer while a scratch view is outstanding"
        );
        self.capacity = capacity.max(1).next_power_of_two();
        self.stride = stride.max(1);
        self.reset_positions();
    }

    fn reset_positions(&mut self) {
        while let Some(block) = self.blocks.pop_front() {
            self.recycle(block.words);
        }
        self.written = 0;
        self.plungers.clear();
        for r in self.readers.iter_mut().flatten() {
            r.read = 0;
            r.ignored = 0;
        }
    }

    /// Checks a read of `n` samples and returns whether a plunger follows it.
    fn check_read(&self, r: &ReaderState, n: usize) -> bool {
        let used = self.used_by(r);
        assert!(n <= used, "read of {n} samples with only {used} available");
        match self.next_plunger(r) {
            Some(d) => {
                assert!(
                    n <= d,
                    "read of {n} samples crosses an unskipped plunger at distance {d}"
                );
                d == n
            }
            None => false,
        }
    }

    fn advance(&mut self, id: ReaderId, n: usize) {
        if n == 0 {
            return;
        }
        let r = self.reader_mut(id);
        r.read += n as u64;
        r.ignored = 0;
        self.prune();
        self.release();
    }
}

/// A bounded multi-reader queue of `f32` samples.
///
/// Guarded by one mutex and two condition variables (data ready, space
/// ready). All positions are in samples; one sample is `stride` words.
pub struct RingBuffer {
    state: Mutex<RingState>,
    data_ready: Condvar,
    space_ready: Condvar,
}

impl core::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("RingBuffer")
            .field("capacity", &st.capacity)
            .field("stride", &st.stride)
            .field("written", &st.written)
            .field("blocks", &st.blocks.len())
            .field("plungers", &st.plungers.len())
            .field("readers", &st.readers.iter().flatten().count())
            .finish_non_exhaustive()
    }
}

impl RingBuffer {
    /// Creates a buffer holding at least `capacity` samples of `stride`
    /// words each. Capacity is rounded up to a power of two.
    pub fn new(capacity: usize, stride: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let stride = stride.max(1);
        Self {
            state: Mutex::new(RingState {
                blocks: VecDeque::new(),
                spare: Vec::new(),
                capacity,
                stride,
                written: 0,
                plungers: VecDeque::new(),
                readers: Vec::new(),
                trapdoors: HashSet::new(),
                scratch_live: false,
                signal: TypeSlot::Pending,
                min_capacity: 0,
            }),
            data_ready: Condvar::new(),
            space_ready: Condvar::new(),
        }
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Words per sample.
    pub fn stride(&self) -> usize {
        self.state.lock().stride
    }

    /// Changes capacity and stride, discarding all content.
    ///
    /// # Panics
    ///
    /// Panics if a scratch view is outstanding.
    pub fn resize(&self, capacity: usize, stride: usize) {
        let mut st = self.state.lock();
        st.realloc(capacity, stride);
        drop(st);
        self.space_ready.notify_all();
    }

    /// Resets cursors and plungers, keeping capacity and type.
    ///
    /// # Panics
    ///
    /// Panics if a scratch view is outstanding.
    pub fn clear(&self) {
        let mut st = self.state.lock();
        assert!(
            !st.scratch_live,
            "cannot clear a ring buffer while a scratch view is outstanding"
        );
        st.reset_positions();
        drop(st);
        self.space_ready.notify_all();
    }

    /// Raises the minimum capacity applied at the next
    /// [`publish_type`](Self::publish_type).
    pub fn request_capacity(&self, samples: usize) {
        let mut st = self.state.lock();
        st.min_capacity = st.min_capacity.max(samples);
    }

    /// Publishes the wire's type and sizes storage for it.
    ///
    /// Capacity becomes the largest of the consumer request, `own_min`, and
    /// `default_words / stride`, rounded to a power of two.
    pub fn publish_type(&self, slot: TypeSlot, own_min: usize, default_words: usize) {
        let mut st = self.state.lock();
        if let TypeSlot::Ready(ty) = &slot {
            let stride = ty.stride();
            let capacity = st
                .min_capacity
                .max(own_min)
                .max(default_words / stride)
                .max(1);
            st.realloc(capacity, stride);
        }
        st.signal = slot;
        drop(st);
        self.data_ready.notify_all();
    }

    /// Returns the type slot to [`TypeSlot::Pending`].
    pub fn reset_type(&self) {
        self.state.lock().signal = TypeSlot::Pending;
    }

    /// Current type slot, without waiting.
    pub fn type_slot(&self) -> TypeSlot {
        self.state.lock().signal.clone()
    }

    /// Blocks until the producer has settled the wire's type.
    pub fn wait_type(&self, trapdoor: &Trapdoor) -> Result<TypeSlot, Bail> {
        let mut st = self.state.lock();
        loop {
            if st.cancelled(trapdoor) {
                return Err(Bail);
            }
            if st.signal != TypeSlot::Pending {
                return Ok(st.signal.clone());
            }
            self.data_ready.wait(&mut st);
        }
    }

    // ---- readers ----

    /// Attaches a reader at the current write position.
    ///
    /// Plungers already pending at that position are treated as passed.
    pub fn attach_reader(&self) -> ReaderId {
        let mut st = self.state.lock();
        let read = st.written;
        let ignored = st.plungers.iter().filter(|&&p| p == read).count();
        let state = ReaderState { read, ignored };
        let slot = st.readers.iter().position(Option::is_none);
        let index = if let Some(i) = slot {
            st.readers[i] = Some(state);
            i
        } else {
            st.readers.push(Some(state));
            st.readers.len() - 1
        };
        ReaderId(index)
    }

    /// Detaches a reader, releasing any space it was holding.
    pub fn detach_reader(&self, id: ReaderId) {
        let mut st = self.state.lock();
        if let Some(slot) = st.readers.get_mut(id.0) {
            *slot = None;
        }
        st.prune();
        st.release();
        drop(st);
        self.space_ready.notify_all();
    }

    /// Number of attached readers.
    pub fn reader_count(&self) -> usize {
        self.state.lock().readers.iter().flatten().count()
    }

    /// Samples the producer may write without blocking.
    pub fn elements_free(&self) -> usize {
        self.state.lock().free()
    }

    /// Samples written but not yet consumed by `reader`.
    pub fn elements_used(&self, reader: ReaderId) -> usize {
        let st = self.state.lock();
        st.used_by(st.reader(reader))
    }

    /// Number of plungers not yet passed by every reader.
    pub fn pending_plungers(&self) -> usize {
        self.state.lock().plungers.len()
    }

    // ---- writing ----

    fn wait_free_locked<'a>(
        &'a self,
        mut st: MutexGuard<'a, RingState>,
        n: usize,
        trapdoor: &Trapdoor,
    ) -> Result<MutexGuard<'a, RingState>, Bail> {
        assert!(
            n <= st.capacity,
            "write of {n} samples exceeds ring capacity {}",
            st.capacity
        );
        loop {
            if st.cancelled(trapdoor) {
                return Err(Bail);
            }
            if st.free() >= n {
                return Ok(st);
            }
            self.space_ready.wait(&mut st);
        }
    }

    /// Blocks until `n` samples are free.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds capacity.
    pub fn wait_free(&self, n: usize, trapdoor: &Trapdoor) -> Result<(), Bail> {
        let st = self.state.lock();
        self.wait_free_locked(st, n, trapdoor).map(drop)
    }

    /// Blocks until `n` samples are free and returns an exclusive view for
    /// writing them. Committing the view hands its block to the ring without
    /// copying.
    ///
    /// # Panics
    ///
    /// Panics if another scratch view on this buffer is outstanding, or if
    /// `n` exceeds capacity.
    pub fn write_scratch(&self, n: usize, trapdoor: &Trapdoor) -> Result<ScratchView<'_>, Bail> {
        let st = self.state.lock();
        assert!(
            !st.scratch_live,
            "a second scratch view was requested while one is outstanding"
        );
        let mut st = self.wait_free_locked(st, n, trapdoor)?;
        st.scratch_live = true;
        let stride = st.stride;
        let mut data = st.take_spare();
        drop(st);
        data.resize(n * stride, 0.0);
        Ok(ScratchView::new(self, data, stride))
    }

    pub(crate) fn commit_scratch(&self, mut data: Vec<f32>, n: usize) {
        let mut st = self.state.lock();
        data.truncate(n * st.stride);
        st.scratch_live = false;
        st.append(data);
        drop(st);
        self.data_ready.notify_all();
    }

    pub(crate) fn discard_scratch(&self, data: Vec<f32>) {
        let mut st = self.state.lock();
        st.scratch_live = false;
        st.recycle(data);
    }

    /// Copies caller-owned samples in at the write position.
    ///
    /// # Panics
    ///
    /// Panics on a stride mismatch, if the block exceeds capacity, or if a
    /// scratch view is outstanding.
    pub fn write_copy(&self, data: &BufferData, trapdoor: &Trapdoor) -> Result<(), Bail> {
        let st = self.state.lock();
        assert_eq!(
            data.stride(),
            st.stride,
            "foreign write stride does not match the ring"
        );
        assert!(
            !st.scratch_live,
            "foreign write while a scratch view is outstanding"
        );
        let mut st = self.wait_free_locked(st, data.samples(), trapdoor)?;
        st.store(data.words());
        drop(st);
        self.data_ready.notify_all();
        Ok(())
    }

    /// Records a plunger at the write position.
    ///
    /// Waits for one free sample so the marker's position is unambiguous.
    ///
    /// # Panics
    ///
    /// Panics if a scratch view is outstanding.
    pub fn insert_plunger(&self, trapdoor: &Trapdoor) -> Result<(), Bail> {
        let st = self.state.lock();
        assert!(
            !st.scratch_live,
            "cannot plunge while unpublished scratch data is pending"
        );
        let mut st = self.wait_free_locked(st, 1, trapdoor)?;
        let at = st.written;
        st.plungers.push_back(at);
        st.prune();
        drop(st);
        self.data_ready.notify_all();
        self.space_ready.notify_all();
        Ok(())
    }

    // ---- reading ----

    /// Blocks until `n` samples are readable or a plunger intervenes.
    ///
    /// Returns `n` when that much data is available, or the smaller distance
    /// to the next plunger this reader has not passed (possibly zero).
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds capacity.
    pub fn wait_ready(&self, reader: ReaderId, n: usize, trapdoor: &Trapdoor) -> Result<usize, Bail> {
        let mut st = self.state.lock();
        assert!(
            n <= st.capacity,
            "wait for {n} samples exceeds ring capacity {}",
            st.capacity
        );
        loop {
            if st.cancelled(trapdoor) {
                return Err(Bail);
            }
            let r = *st.reader(reader);
            if let Some(d) = st.next_plunger(&r).filter(|&d| d < n) {
                return Ok(d);
            }
            if st.used_by(&r) >= n {
                return Ok(n);
            }
            self.data_ready.wait(&mut st);
        }
    }

    /// Distance to the next plunger `reader` has not passed.
    pub fn next_plunger(&self, reader: ReaderId) -> Option<usize> {
        let st = self.state.lock();
        st.next_plunger(st.reader(reader))
    }

    /// Copies out and consumes `n` samples.
    ///
    /// The result's plunger flag is set if a plunger sits right after it.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `n` samples are available or the read would
    /// cross a plunger this reader has not skipped.
    pub fn read(&self, reader: ReaderId, n: usize) -> BufferData {
        let mut st = self.state.lock();
        let r = *st.reader(reader);
        let plunger = st.check_read(&r, n);
        let mut data = BufferData::from_words(st.load(r.read, n), st.stride);
        data.set_plunger(plunger);
        st.advance(reader, n);
        drop(st);
        self.space_ready.notify_all();
        data
    }

    /// Copies out `n` samples without consuming them.
    ///
    /// # Panics
    ///
    /// As for [`read`](Self::read).
    pub fn peek(&self, reader: ReaderId, n: usize) -> BufferData {
        let st = self.state.lock();
        let r = *st.reader(reader);
        let plunger = st.check_read(&r, n);
        let mut data = BufferData::from_words(st.load(r.read, n), st.stride);
        data.set_plunger(plunger);
        data
    }

    /// Consumes `n` samples without copying them.
    ///
    /// # Panics
    ///
    /// As for [`read`](Self::read).
    pub fn skip(&self, reader: ReaderId, n: usize) {
        let mut st = self.state.lock();
        let r = *st.reader(reader);
        st.check_read(&r, n);
        st.advance(reader, n);
        drop(st);
        self.space_ready.notify_all();
    }

    /// Passes `count` plungers at the reader's current position.
    ///
    /// # Panics
    ///
    /// Panics if fewer than `count` unskipped plungers sit at the position.
    pub fn skip_plungers(&self, reader: ReaderId, count: usize) {
        let mut st = self.state.lock();
        let r = *st.reader(reader);
        let available = st.unskipped_at(&r);
        assert!(
            count <= available,
            "cannot skip {count} plungers; {available} pending at the read position"
        );
        st.reader_mut(reader).ignored += count;
        st.prune();
    }

    // ---- trapdoors ----

    /// Opens `trapdoor` on this buffer, releasing any wait it is parked in.
    pub fn open_trapdoor(&self, trapdoor: &Trapdoor) {
        self.state.lock().trapdoors.insert(trapdoor.id());
        self.data_ready.notify_all();
        self.space_ready.notify_all();
    }

    /// Closes `trapdoor` on this buffer.
    pub fn close_trapdoor(&self, trapdoor: &Trapdoor) {
        self.state.lock().trapdoors.remove(&trapdoor.id());
        self.data_ready.notify_all();
        self.space_ready.notify_all();
    }

    /// Returns true if `trapdoor` is open on this buffer.
    pub fn is_trapdoor_open(&self, trapdoor: &Trapdoor) -> bool {
        self.state.lock().trapdoors.contains(&trapdoor.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn ramp(from: usize, n: usize) -> BufferData {
        BufferData::from_words((from..from + n).map(|v| v as f32).collect(), 1)
    }

    #[test]
    fn capacity_rounds_to_power_of_two() {
        assert_eq!(RingBuffer::new(5, 1).capacity(), 8);
        assert_eq!(RingBuffer::new(64, 3).capacity(), 64);
        assert_eq!(RingBuffer::new(0, 1).capacity(), 1);
    }

    #[test]
    fn scratch_commit_wraps_around() {
        let ring = RingBuffer::new(8, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();

        ring.write_copy(&ramp(0, 6), &t).unwrap();
        ring.skip(r, 6);

        let mut view = ring.write_scratch(5, &t).unwrap();
        for (i, w) in view.data_mut().iter_mut().enumerate() {
            *w = 100.0 + i as f32;
        }
        view.commit();

        assert_eq!(ring.elements_used(r), 5);
        let out = ring.read(r, 5);
        assert_eq!(out.words(), &[100.0, 101.0, 102.0, 103.0, 104.0]);
    }

    #[test]
    fn commit_hands_the_written_block_over_without_copying() {
        let ring = RingBuffer::new(8, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();

        let mut view = ring.write_scratch(4, &t).unwrap();
        view.data_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let written_at = view.data().as_ptr();
        view.commit();
        {
            let st = ring.state.lock();
            assert_eq!(st.blocks.len(), 1);
            assert_eq!(st.blocks[0].words.as_ptr(), written_at);
        }
        assert_eq!(ring.read(r, 4).words(), &[1.0, 2.0, 3.0, 4.0]);

        // Once read, the block is reused by the next view.
        assert!(ring.state.lock().blocks.is_empty());
        let view = ring.write_scratch(4, &t).unwrap();
        assert_eq!(view.data().as_ptr(), written_at);
        view.discard();
    }

    #[test]
    fn reads_span_block_boundaries() {
        let ring = RingBuffer::new(16, 2);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        for k in 0..3 {
            let words = (0..6).map(|i| (k * 6 + i) as f32).collect();
            ring.write_copy(&BufferData::from_words(words, 2), &t).unwrap();
        }
        ring.skip(r, 2);
        let out = ring.read(r, 5);
        assert_eq!(out.words(), &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0]);
        // Only the block still holding unread samples is kept.
        assert_eq!(ring.state.lock().blocks.len(), 1);
        assert_eq!(ring.read(r, 2).words(), &[14.0, 15.0, 16.0, 17.0]);
    }

    #[test]
    fn discard_publishes_nothing() {
        let ring = RingBuffer::new(8, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        let view = ring.write_scratch(4, &t).unwrap();
        view.discard();
        assert_eq!(ring.elements_used(r), 0);
        assert_eq!(ring.elements_free(), 8);
        // A fresh view is allowed after the discard.
        ring.write_scratch(2, &t).unwrap().commit();
        assert_eq!(ring.elements_used(r), 2);
    }

    #[test]
    fn commit_samples_publishes_a_prefix() {
        let ring = RingBuffer::new(8, 2);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        let mut view = ring.write_scratch(4, &t).unwrap();
        view.sample_mut(0).copy_from_slice(&[1.0, 2.0]);
        view.commit_samples(1);
        assert_eq!(ring.read(r, 1).words(), &[1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "second scratch view")]
    fn second_scratch_view_panics() {
        let ring = RingBuffer::new(8, 1);
        let t = Trapdoor::new();
        let _first = ring.write_scratch(1, &t).unwrap();
        let _second = ring.write_scratch(1, &t);
    }

    #[test]
    #[should_panic(expected = "exceeds ring capacity")]
    fn oversized_foreign_write_panics() {
        let ring = RingBuffer::new(4, 1);
        let _ = ring.write_copy(&ramp(0, 5), &Trapdoor::new());
    }

    #[test]
    #[should_panic(expected = "while a scratch view is outstanding")]
    fn resize_with_live_scratch_panics() {
        let ring = RingBuffer::new(4, 1);
        let _view = ring.write_scratch(1, &Trapdoor::new()).unwrap();
        ring.resize(16, 1);
    }

    #[test]
    fn slowest_reader_bounds_free_space() {
        let ring = RingBuffer::new(8, 1);
        let t = Trapdoor::new();
        let fast = ring.attach_reader();
        let slow = ring.attach_reader();
        ring.write_copy(&ramp(0, 8), &t).unwrap();
        assert_eq!(ring.elements_free(), 0);

        ring.skip(fast, 8);
        assert_eq!(ring.elements_free(), 0);
        ring.skip(slow, 3);
        assert_eq!(ring.elements_free(), 3);

        ring.detach_reader(slow);
        assert_eq!(ring.elements_free(), 8);
    }

    #[test]
    fn wait_ready_stops_at_plunger() {
        let ring = RingBuffer::new(16, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        ring.write_copy(&ramp(0, 3), &t).unwrap();
        ring.insert_plunger(&t).unwrap();
        ring.write_copy(&ramp(3, 5), &t).unwrap();

        assert_eq!(ring.wait_ready(r, 8, &t).unwrap(), 3);
        assert_eq!(ring.wait_ready(r, 3, &t).unwrap(), 3);
        let head = ring.read(r, 3);
        assert!(head.contains_plunger());
        assert_eq!(ring.wait_ready(r, 1, &t).unwrap(), 0);

        ring.skip_plungers(r, 1);
        assert_eq!(ring.pending_plungers(), 0);
        assert_eq!(ring.wait_ready(r, 5, &t).unwrap(), 5);
        assert!(!ring.read(r, 5).contains_plunger());
    }

    #[test]
    #[should_panic(expected = "crosses an unskipped plunger")]
    fn reading_across_a_plunger_panics() {
        let ring = RingBuffer::new(16, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        ring.write_copy(&ramp(0, 2), &t).unwrap();
        ring.insert_plunger(&t).unwrap();
        ring.write_copy(&ramp(2, 2), &t).unwrap();
        let _ = ring.read(r, 4);
    }

    #[test]
    fn colocated_plungers_need_explicit_skips() {
        let ring = RingBuffer::new(16, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        ring.write_copy(&ramp(0, 2), &t).unwrap();
        ring.insert_plunger(&t).unwrap();
        ring.insert_plunger(&t).unwrap();
        ring.write_copy(&ramp(2, 2), &t).unwrap();

        ring.skip(r, 2);
        assert_eq!(ring.wait_ready(r, 2, &t).unwrap(), 0);
        ring.skip_plungers(r, 1);
        assert_eq!(ring.wait_ready(r, 2, &t).unwrap(), 0);
        assert_eq!(ring.pending_plungers(), 1);
        ring.skip_plungers(r, 1);
        assert_eq!(ring.wait_ready(r, 2, &t).unwrap(), 2);
        assert_eq!(ring.pending_plungers(), 0);
    }

    #[test]
    fn plungers_stay_until_every_reader_passes() {
        let ring = RingBuffer::new(16, 1);
        let t = Trapdoor::new();
        let a = ring.attach_reader();
        let b = ring.attach_reader();
        ring.write_copy(&ramp(0, 1), &t).unwrap();
        ring.insert_plunger(&t).unwrap();

        ring.skip(a, 1);
        ring.skip_plungers(a, 1);
        assert_eq!(ring.pending_plungers(), 1);
        assert_eq!(ring.next_plunger(a), None);
        assert_eq!(ring.next_plunger(b), Some(1));

        ring.skip(b, 1);
        ring.skip_plungers(b, 1);
        assert_eq!(ring.pending_plungers(), 0);
    }

    #[test]
    #[should_panic(expected = "cannot skip 2 plungers")]
    fn skipping_missing_plungers_panics() {
        let ring = RingBuffer::new(16, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        ring.insert_plunger(&t).unwrap();
        ring.skip_plungers(r, 2);
    }

    #[test]
    fn open_trapdoor_cancels_immediately() {
        let ring = RingBuffer::new(16, 1);
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        ring.open_trapdoor(&t);
        assert!(ring.is_trapdoor_open(&t));
        assert_eq!(ring.wait_ready(r, 4, &t), Err(Bail));

        // Other callers are unaffected.
        let other = Trapdoor::new();
        ring.write_copy(&ramp(0, 4), &other).unwrap();
        assert_eq!(ring.wait_ready(r, 4, &other), Ok(4));

        ring.close_trapdoor(&t);
        assert_eq!(ring.wait_ready(r, 4, &t), Ok(4));
    }

    #[test]
    fn trapdoor_releases_a_blocked_reader() {
        let ring = Arc::new(RingBuffer::new(1024, 1));
        let t = Trapdoor::new();
        let r = ring.attach_reader();

        let waiter = {
            let ring = Arc::clone(&ring);
            let t = t.clone();
            thread::spawn(move || ring.wait_ready(r, 1000, &t))
        };
        thread::sleep(Duration::from_millis(20));
        let opened = Instant::now();
        ring.open_trapdoor(&t);
        assert_eq!(waiter.join().unwrap(), Err(Bail));
        assert!(opened.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn blocked_writer_resumes_when_reader_frees_space() {
        let ring = Arc::new(RingBuffer::new(4, 1));
        let t = Trapdoor::new();
        let r = ring.attach_reader();
        ring.write_copy(&ramp(0, 4), &t).unwrap();

        let writer = {
            let ring = Arc::clone(&ring);
            let t = t.clone();
            thread::spawn(move || ring.write_copy(&ramp(4, 2), &t))
        };
        thread::sleep(Duration::from_millis(10));
        assert_eq!(ring.read(r, 2).words(), &[0.0, 1.0]);
        writer.join().unwrap().unwrap();
        assert_eq!(ring.wait_ready(r, 4, &t), Ok(4));
        assert_eq!(ring.read(r, 4).words(), &[2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn publish_type_sizes_storage() {
        let ring = RingBuffer::new(1, 1);
        ring.request_capacity(100);
        ring.publish_type(
            TypeSlot::Ready(SignalType::Spectrum {
                bins: 4,
                rate: 10.0,
                step: 1,
            }),
            10,
            64,
        );
        assert_eq!(ring.capacity(), 128);
        assert_eq!(ring.stride(), 4);
        assert!(matches!(ring.wait_type(&Trapdoor::new()), Ok(TypeSlot::Ready(_))));

        ring.reset_type();
        assert_eq!(ring.type_slot(), TypeSlot::Pending);
    }

    #[test]
    fn readerless_ring_never_blocks() {
        let ring = RingBuffer::new(4, 1);
        let t = Trapdoor::new();
        for i in 0..10 {
            ring.write_copy(&ramp(i * 4, 4), &t).unwrap();
            ring.insert_plunger(&t).unwrap();
        }
        assert_eq!(ring.pending_plungers(), 0);
    }
}
