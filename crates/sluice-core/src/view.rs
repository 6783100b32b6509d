//! Buffer views: owned sample blocks and exclusive scratch handles.
//!
//! Two kinds of view exist:
//!
//! - [`BufferData`] is a standalone, owned copy of some samples. This is what
//!   reads return and what travels between threads and over the network.
//! - [`ScratchView`] is an exclusive, short-lived handle for writing the next
//!   block of a [`RingBuffer`]. At most one may be outstanding per buffer.
//!   [`commit`](ScratchView::commit) and [`discard`](ScratchView::discard)
//!   consume the view, so using it afterwards does not compile.
//!
//! [`Frames`] and [`FramesMut`] are borrowed, stride-aware slices used by
//! stateless stages.

use crate::ring::RingBuffer;
use crate::stage::Window;

/// An owned block of samples, `stride` words per sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BufferData {
    words: Vec<f32>,
    stride: usize,
    plunger: bool,
}

impl BufferData {
    /// Creates an empty block with the given stride.
    pub fn new(stride: usize) -> Self {
        Self {
            words: Vec::new(),
            stride: stride.max(1),
            plunger: false,
        }
    }

    /// Creates a zero-filled block of `samples` samples.
    pub fn zeroed(samples: usize, stride: usize) -> Self {
        let stride = stride.max(1);
        Self {
            words: vec![0.0; samples * stride],
            stride,
            plunger: false,
        }
    }

    /// Wraps raw words.
    ///
    /// # Panics
    ///
    /// Panics if `words.len()` is not a multiple of `stride`.
    pub fn from_words(words: Vec<f32>, stride: usize) -> Self {
        let stride = stride.max(1);
        assert!(
            words.len() % stride == 0,
            "{} words do not divide into samples of stride {}",
            words.len(),
            stride
        );
        Self {
            words,
            stride,
            plunger: false,
        }
    }

    /// Number of samples held.
    #[inline]
    pub fn samples(&self) -> usize {
        self.words.len() / self.stride
    }

    /// Words per sample.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns true if no samples are held.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Raw words.
    #[inline]
    pub fn words(&self) -> &[f32] {
        &self.words
    }

    /// Raw words, mutable.
    #[inline]
    pub fn words_mut(&mut self) -> &mut [f32] {
        &mut self.words
    }

    /// Consumes the block, returning its words.
    pub fn into_words(self) -> Vec<f32> {
        self.words
    }

    /// The `i`-th sample.
    #[inline]
    pub fn sample(&self, i: usize) -> &[f32] {
        &self.words[i * self.stride..(i + 1) * self.stride]
    }

    /// The `i`-th sample, mutable.
    #[inline]
    pub fn sample_mut(&mut self, i: usize) -> &mut [f32] {
        let stride = self.stride;
        &mut self.words[i * stride..(i + 1) * stride]
    }

    /// Appends the words of another block of the same stride.
    ///
    /// # Panics
    ///
    /// Panics on a stride mismatch.
    pub fn append(&mut self, other: &BufferData) {
        assert_eq!(self.stride, other.stride, "stride mismatch in append");
        self.words.extend_from_slice(&other.words);
    }

    /// Returns samples `start..start + len` as a new block.
    pub fn slice(&self, start: usize, len: usize) -> BufferData {
        BufferData {
            words: self.words[start * self.stride..(start + len) * self.stride].to_vec(),
            stride: self.stride,
            plunger: false,
        }
    }

    /// Returns true if a plunger immediately follows these samples in the
    /// stream they were read from.
    #[inline]
    pub fn contains_plunger(&self) -> bool {
        self.plunger
    }

    /// Sets the trailing-plunger flag.
    pub fn set_plunger(&mut self, plunger: bool) {
        self.plunger = plunger;
    }

    /// Borrowed, stride-aware view.
    pub fn frames(&self) -> Frames<'_> {
        Frames::new(&self.words, self.stride)
    }

    /// Borrowed, stride-aware mutable view.
    pub fn frames_mut(&mut self) -> FramesMut<'_> {
        FramesMut::new(&mut self.words, self.stride)
    }
}

/// A borrowed run of samples.
#[derive(Debug, Clone, Copy)]
pub struct Frames<'a> {
    words: &'a [f32],
    stride: usize,
}

impl<'a> Frames<'a> {
    /// Wraps a word slice.
    pub fn new(words: &'a [f32], stride: usize) -> Self {
        Self {
            words,
            stride: stride.max(1),
        }
    }

    /// Number of samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.words.len() / self.stride
    }

    /// Words per sample.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw words.
    #[inline]
    pub fn words(&self) -> &'a [f32] {
        self.words
    }

    /// The `i`-th sample.
    #[inline]
    pub fn sample(&self, i: usize) -> &'a [f32] {
        &self.words[i * self.stride..(i + 1) * self.stride]
    }

    /// Samples `start..start + len`.
    #[inline]
    pub fn range(&self, start: usize, len: usize) -> Frames<'a> {
        Frames {
            words: &self.words[start * self.stride..(start + len) * self.stride],
            stride: self.stride,
        }
    }

    /// The input window of chunk `k` under `window`.
    #[inline]
    pub fn chunk_in(&self, k: usize, window: Window) -> Frames<'a> {
        self.range(k * window.step, window.input)
    }
}

/// A mutable borrowed run of samples.
#[derive(Debug)]
pub struct FramesMut<'a> {
    words: &'a mut [f32],
    stride: usize,
}

impl<'a> FramesMut<'a> {
    /// Wraps a mutable word slice.
    pub fn new(words: &'a mut [f32], stride: usize) -> Self {
        Self {
            words,
            stride: stride.max(1),
        }
    }

    /// Number of samples.
    #[inline]
    pub fn samples(&self) -> usize {
        self.words.len() / self.stride
    }

    /// Words per sample.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw words.
    #[inline]
    pub fn words(&mut self) -> &mut [f32] {
        &mut *self.words
    }

    /// The `i`-th sample.
    #[inline]
    pub fn sample(&mut self, i: usize) -> &mut [f32] {
        let stride = self.stride;
        &mut self.words[i * stride..(i + 1) * stride]
    }

    /// Reborrows samples `start..start + len`.
    #[inline]
    pub fn range(&mut self, start: usize, len: usize) -> FramesMut<'_> {
        let stride = self.stride;
        FramesMut {
            words: &mut self.words[start * stride..(start + len) * stride],
            stride,
        }
    }
}

/// Exclusive handle for writing the next block of a [`RingBuffer`].
///
/// Obtained from [`RingBuffer::write_scratch`]. The handle must be completed
/// with [`commit`](Self::commit), [`commit_samples`](Self::commit_samples) or
/// [`discard`](Self::discard); dropping it uncompleted discards it.
///
/// The view owns the block it writes. Committing moves that block into the
/// ring's queue, so the samples written here are the ones readers copy out.
#[must_use = "a scratch view must be committed or discarded"]
pub struct ScratchView<'a> {
    ring: &'a RingBuffer,
    data: Vec<f32>,
    stride: usize,
    done: bool,
}

impl<'a> ScratchView<'a> {
    pub(crate) fn new(ring: &'a RingBuffer, data: Vec<f32>, stride: usize) -> Self {
        Self {
            ring,
            data,
            stride,
            done: false,
        }
    }

    /// Number of samples this view can hold.
    #[inline]
    pub fn samples(&self) -> usize {
        self.data.len() / self.stride
    }

    /// Words per sample.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw words.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw words, mutable.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// The `i`-th sample, mutable.
    #[inline]
    pub fn sample_mut(&mut self, i: usize) -> &mut [f32] {
        let stride = self.stride;
        &mut self.data[i * stride..(i + 1) * stride]
    }

    /// Stride-aware mutable view.
    pub fn frames_mut(&mut self) -> FramesMut<'_> {
        FramesMut::new(&mut self.data, self.stride)
    }

    /// Publishes every sample and wakes readers.
    pub fn commit(self) {
        let n = self.samples();
        self.commit_samples(n);
    }

    /// Publishes the first `n` samples and wakes readers.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the view's size.
    pub fn commit_samples(mut self, n: usize) {
        assert!(
            n <= self.samples(),
            "cannot commit {n} samples from a view of {}",
            self.samples()
        );
        self.done = true;
        let data = std::mem::take(&mut self.data);
        self.ring.commit_scratch(data, n);
    }

    /// Drops the view without publishing anything.
    pub fn discard(mut self) {
        self.done = true;
        let data = std::mem::take(&mut self.data);
        self.ring.discard_scratch(data);
    }
}

impl Drop for ScratchView<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!("scratch view dropped without commit; discarding");
            let data = std::mem::take(&mut self.data);
            self.ring.discard_scratch(data);
        }
    }
}

impl core::fmt::Debug for ScratchView<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScratchView")
            .field("samples", &self.samples())
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_data_sample_access() {
        let data = BufferData::from_words((0..12).map(|v| v as f32).collect(), 3);
        assert_eq!(data.samples(), 4);
        assert_eq!(data.sample(2), &[6.0, 7.0, 8.0]);
        let tail = data.slice(2, 2);
        assert_eq!(tail.words(), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    #[should_panic(expected = "do not divide")]
    fn ragged_words_are_rejected() {
        let _ = BufferData::from_words(vec![0.0; 5], 2);
    }

    #[test]
    fn frames_chunk_follows_window() {
        let words: Vec<f32> = (0..16).map(|v| v as f32).collect();
        let frames = Frames::new(&words, 1);
        let window = Window::new(8, 4, 1);
        assert_eq!(frames.chunk_in(0, window).words(), &words[0..8]);
        assert_eq!(frames.chunk_in(2, window).words(), &words[8..16]);
    }
}
