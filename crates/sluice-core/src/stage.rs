//! Stateless, re-entrant chunk transforms.
//!
//! A [`StatelessStage`] consumes fixed windows of input and produces fixed
//! blocks of output under an `(in, step, out)` [`Window`] rule. Because
//! [`process_chunk`](StatelessStage::process_chunk) takes `&self`, many
//! instances (or one shared instance) can run concurrently on different
//! chunks, which is what lets a [`WorkerPool`](crate::WorkerPool) scale a
//! stage across threads and machines.

use std::sync::Arc;

use crate::error::StageError;
use crate::properties::Properties;
use crate::signal::SignalType;
use crate::view::{Frames, FramesMut};

/// The `(in, step, out)` windowing rule of a stage, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    /// Input samples consumed per chunk.
    pub input: usize,
    /// Input samples advanced between chunks.
    pub step: usize,
    /// Output samples produced per chunk.
    pub output: usize,
}

impl Window {
    /// Creates a window rule.
    ///
    /// # Panics
    ///
    /// Panics if any component is zero.
    pub const fn new(input: usize, step: usize, output: usize) -> Self {
        assert!(input > 0 && step > 0 && output > 0, "window sizes must be non-zero");
        Self {
            input,
            step,
            output,
        }
    }

    /// The one-in, one-out rule.
    pub const fn unit() -> Self {
        Self::new(1, 1, 1)
    }

    /// Input samples spanned by `count` consecutive chunks.
    #[inline]
    pub fn span(&self, count: usize) -> usize {
        if count == 0 {
            0
        } else {
            self.input + (count - 1) * self.step
        }
    }

    /// Input samples that must be available before `count` chunks can be
    /// processed and consumed.
    ///
    /// Larger than [`span`](Self::span) when `step > input` because the gap
    /// after the last chunk is consumed too.
    #[inline]
    pub fn needed(&self, count: usize) -> usize {
        self.span(count).max(count * self.step)
    }

    /// Number of whole chunks that fit in `available` samples.
    #[inline]
    pub fn chunks_in(&self, available: usize) -> usize {
        if available < self.input {
            0
        } else {
            (available - self.input) / self.step + 1
        }
    }
}

/// A threadless, synchronous, re-entrant transform.
///
/// Implementations keep configuration (set in
/// [`init_from_properties`](Self::init_from_properties) and
/// [`specify_types`](Self::specify_types)) but no per-call mutable state.
///
/// # Example
///
/// ```rust
/// use sluice_core::{Frames, FramesMut, Properties, SignalType, StageError, StatelessStage, Window};
///
/// struct Negate;
///
/// impl StatelessStage for Negate {
///     fn type_name(&self) -> &str {
///         "negate"
///     }
///
///     fn init_from_properties(&mut self, _props: &Properties) -> Result<(), StageError> {
///         Ok(())
///     }
///
///     fn window(&self) -> Window {
///         Window::unit()
///     }
///
///     fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
///         Ok(inputs.to_vec())
///     }
///
///     fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
///         for (o, i) in outputs[0].words().iter_mut().zip(inputs[0].words()) {
///             *o = -*i;
///         }
///     }
/// }
/// ```
pub trait StatelessStage: Send + Sync {
    /// Registry identifier of this stage.
    fn type_name(&self) -> &str;

    /// Defaults for every property the stage understands.
    fn default_properties(&self) -> Properties {
        Properties::new()
    }

    /// Applies configuration. Called before [`window`](Self::window) is
    /// consulted.
    fn init_from_properties(&mut self, props: &Properties) -> Result<(), StageError>;

    /// Number of input and output channels.
    fn io(&self) -> (usize, usize) {
        (1, 1)
    }

    /// The windowing rule.
    fn window(&self) -> Window;

    /// Validates input types and returns one type per output.
    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError>;

    /// Processes one chunk.
    ///
    /// Each input holds exactly `window().input` samples and each output
    /// exactly `window().output` samples.
    fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]);

    /// Processes `count` consecutive chunks.
    ///
    /// Input `i` holds `window().span(count)` samples; output `j` holds
    /// `count * window().output` samples. The default slices the batch and
    /// calls [`process_chunk`](Self::process_chunk) per chunk.
    fn process_chunks(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>], count: usize) {
        let window = self.window();
        let mut chunk_in = Vec::with_capacity(inputs.len());
        for k in 0..count {
            chunk_in.clear();
            chunk_in.extend(inputs.iter().map(|f| f.chunk_in(k, window)));
            let mut chunk_out: Vec<FramesMut<'_>> = outputs
                .iter_mut()
                .map(|f| f.range(k * window.output, window.output))
                .collect();
            self.process_chunk(&chunk_in, &mut chunk_out);
        }
    }
}

/// Shared constructor for stage instances, one per worker.
pub type StageFactory = Arc<dyn Fn() -> Box<dyn StatelessStage> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_arithmetic() {
        let w = Window::new(8, 4, 1);
        assert_eq!(w.span(1), 8);
        assert_eq!(w.span(3), 16);
        assert_eq!(w.needed(3), 16);
        assert_eq!(w.chunks_in(7), 0);
        assert_eq!(w.chunks_in(16), 3);
        assert_eq!(w.chunks_in(19), 3);
        assert_eq!(w.chunks_in(20), 4);
    }

    #[test]
    fn gapped_window_consumes_the_gap() {
        let w = Window::new(2, 5, 1);
        assert_eq!(w.span(2), 7);
        assert_eq!(w.needed(2), 10);
    }

    struct Scale(f32);

    impl StatelessStage for Scale {
        fn type_name(&self) -> &str {
            "scale"
        }

        fn init_from_properties(&mut self, _props: &Properties) -> Result<(), StageError> {
            Ok(())
        }

        fn window(&self) -> Window {
            Window::new(2, 2, 2)
        }

        fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
            Ok(inputs.to_vec())
        }

        fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
            for (o, i) in outputs[0].words().iter_mut().zip(inputs[0].words()) {
                *o = *i * self.0;
            }
        }
    }

    #[test]
    fn default_process_chunks_slices_batches() {
        let stage = Scale(10.0);
        let input: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let mut output = vec![0.0; 6];
        stage.process_chunks(
            &[Frames::new(&input, 1)],
            &mut [FramesMut::new(&mut output, 1)],
            3,
        );
        assert_eq!(output, vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0]);
    }
}
