//! Fusing two stateless stages into one.
//!
//! A [`Combination`] routes the output of stage A straight into stage B
//! inside one call, so the pair can be scheduled as a single stage. A's
//! output block must evenly divide both B's input window and B's step; the
//! fused window is then
//!
//! ```text
//! in   = in_A + (in_B / out_A - 1) * step_A
//! step = (step_B / out_A) * step_A
//! out  = out_B
//! ```
//!
//! B's properties live under the [`NEXT_PREFIX`] key prefix so they cannot
//! collide with A's.

use parking_lot::Mutex;

use crate::error::StageError;
use crate::properties::Properties;
use crate::signal::SignalType;
use crate::stage::{StatelessStage, Window};
use crate::view::{Frames, FramesMut};

/// Key prefix for the second stage's properties.
pub const NEXT_PREFIX: &str = "next/";

/// Two stages fused into one.
pub struct Combination {
    name: String,
    first: Box<dyn StatelessStage>,
    second: Box<dyn StatelessStage>,
    /// Words per sample of each intermediate channel.
    mid_strides: Vec<usize>,
    /// Intermediate buffers kept between calls.
    mid: Mutex<Vec<Vec<f32>>>,
}

impl Combination {
    /// Wraps `first` then `second`. Compatibility is checked at
    /// [`init_from_properties`](StatelessStage::init_from_properties).
    pub fn new(first: Box<dyn StatelessStage>, second: Box<dyn StatelessStage>) -> Self {
        let name = format!("{}+{}", first.type_name(), second.type_name());
        Self {
            name,
            first,
            second,
            mid_strides: Vec::new(),
            mid: Mutex::new(Vec::new()),
        }
    }

    /// Intermediate chunks of A needed per chunk of B. Zero until the pair
    /// has been checked compatible.
    fn ratio(&self) -> usize {
        self.second.window().input / self.first.window().output
    }

    fn check_compatible(&self) -> Result<(), StageError> {
        let a = self.first.window();
        let b = self.second.window();
        if b.input % a.output != 0 || b.step % a.output != 0 {
            return Err(StageError::Incompatible(format!(
                "{} emits blocks of {} which do not divide {} (in {}, step {})",
                self.first.type_name(),
                a.output,
                self.second.type_name(),
                b.input,
                b.step
            )));
        }
        let (_, a_out) = self.first.io();
        let (b_in, _) = self.second.io();
        if a_out != b_in {
            return Err(StageError::Incompatible(format!(
                "{} has {a_out} outputs but {} has {b_in} inputs",
                self.first.type_name(),
                self.second.type_name()
            )));
        }
        Ok(())
    }

    /// Sizes the kept intermediate buffers for `samples` samples.
    fn size_intermediate(&self, mid: &mut Vec<Vec<f32>>, samples: usize) {
        mid.resize_with(self.mid_strides.len(), Vec::new);
        for (words, stride) in mid.iter_mut().zip(&self.mid_strides) {
            words.clear();
            words.resize(samples * stride, 0.0);
        }
    }
}

impl StatelessStage for Combination {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn default_properties(&self) -> Properties {
        let mut props = self.first.default_properties();
        props.extend(self.second.default_properties().stashed(NEXT_PREFIX));
        props
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<(), StageError> {
        let (own, next) = props.unstash(NEXT_PREFIX);
        self.first.init_from_properties(&own)?;
        self.second.init_from_properties(&next)?;
        self.check_compatible()
    }

    fn io(&self) -> (usize, usize) {
        (self.first.io().0, self.second.io().1)
    }

    fn window(&self) -> Window {
        let a = self.first.window();
        let b = self.second.window();
        Window::new(
            a.input + self.ratio().saturating_sub(1) * a.step,
            (b.step / a.output).max(1) * a.step,
            b.output,
        )
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
        let mid = self.first.specify_types(inputs)?;
        self.mid_strides = mid.iter().map(SignalType::stride).collect();
        self.second.specify_types(&mid)
    }

    fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
        self.process_chunks(inputs, outputs, 1);
    }

    fn process_chunks(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>], count: usize) {
        let a = self.first.window();
        let b = self.second.window();
        let mid_chunks = b.span(count) / a.output;
        let mut guard = self.mid.lock();
        let mid = &mut *guard;
        self.size_intermediate(mid, mid_chunks * a.output);
        {
            let mut mid_out: Vec<FramesMut<'_>> = mid
                .iter_mut()
                .zip(&self.mid_strides)
                .map(|(words, &stride)| FramesMut::new(words, stride))
                .collect();
            self.first.process_chunks(inputs, &mut mid_out, mid_chunks);
        }
        let mid_in: Vec<Frames<'_>> = mid
            .iter()
            .zip(&self.mid_strides)
            .map(|(words, &stride)| Frames::new(words, stride))
            .collect();
        self.second.process_chunks(&mid_in, outputs, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sums `size` samples every `hop`.
    struct BlockSum {
        size: usize,
        hop: usize,
    }

    impl StatelessStage for BlockSum {
        fn type_name(&self) -> &str {
            "block_sum"
        }

        fn default_properties(&self) -> Properties {
            Properties::new().with("size", 2usize).with("hop", 2usize)
        }

        fn init_from_properties(&mut self, props: &Properties) -> Result<(), StageError> {
            let props = props.over(&self.default_properties());
            self.size = props.get_usize("size").unwrap_or(2);
            self.hop = props.get_usize("hop").unwrap_or(2);
            if self.size == 0 || self.hop == 0 {
                return Err(StageError::invalid("size", "must be > 0"));
            }
            Ok(())
        }

        fn window(&self) -> Window {
            Window::new(self.size, self.hop, 1)
        }

        fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
            Ok(inputs.to_vec())
        }

        fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
            outputs[0].words()[0] = inputs[0].words().iter().sum();
        }
    }

    /// Emits two samples per two-sample chunk.
    struct Pairs;

    impl StatelessStage for Pairs {
        fn type_name(&self) -> &str {
            "pairs"
        }

        fn init_from_properties(&mut self, _: &Properties) -> Result<(), StageError> {
            Ok(())
        }

        fn window(&self) -> Window {
            Window::new(2, 2, 2)
        }

        fn specify_types(&mut self, i: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
            Ok(i.to_vec())
        }

        fn process_chunk(&self, _: &[Frames<'_>], _: &mut [FramesMut<'_>]) {}
    }

    fn block_sum() -> Box<dyn StatelessStage> {
        Box::new(BlockSum { size: 2, hop: 2 })
    }

    fn wave() -> Vec<SignalType> {
        vec![SignalType::Wave { rate: 100.0 }]
    }

    #[test]
    fn fused_window_arithmetic() {
        let mut combo = Combination::new(block_sum(), block_sum());
        let props = Properties::new()
            .with("size", 4usize)
            .with("hop", 2usize)
            .with("next/size", 3usize)
            .with("next/hop", 2usize);
        combo.init_from_properties(&props).unwrap();
        assert_eq!(combo.type_name(), "block_sum+block_sum");
        // in = 4 + (3 - 1) * 2, step = 2 * 2
        assert_eq!(combo.window(), Window::new(8, 4, 1));
    }

    #[test]
    fn fused_output_matches_sequential_application() {
        let mut combo = Combination::new(block_sum(), block_sum());
        combo.init_from_properties(&Properties::new()).unwrap();
        combo.specify_types(&wave()).unwrap();
        assert_eq!(combo.window(), Window::new(4, 4, 1));

        let input: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let mut output = vec![0.0; 3];
        combo.process_chunks(
            &[Frames::new(&input, 1)],
            &mut [FramesMut::new(&mut output, 1)],
            3,
        );
        assert_eq!(output, vec![6.0, 22.0, 38.0]);
    }

    #[test]
    fn non_dividing_blocks_are_incompatible() {
        let mut combo = Combination::new(Box::new(Pairs), block_sum());
        let props = Properties::new().with("next/size", 3usize);
        let err = combo.init_from_properties(&props).unwrap_err();
        assert!(matches!(err, StageError::Incompatible(_)));
    }

    #[test]
    fn intermediate_buffers_are_reused_across_calls() {
        let mut combo = Combination::new(block_sum(), block_sum());
        combo.init_from_properties(&Properties::new()).unwrap();
        combo.specify_types(&wave()).unwrap();

        let input: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let mut output = vec![0.0; 3];
        combo.process_chunks(&[Frames::new(&input, 1)], &mut [FramesMut::new(&mut output, 1)], 3);
        let first = combo.mid.lock()[0].as_ptr();

        let mut output = vec![0.0; 2];
        combo.process_chunks(&[Frames::new(&input[..8], 1)], &mut [FramesMut::new(&mut output, 1)], 2);
        assert_eq!(combo.mid.lock()[0].as_ptr(), first);
        assert_eq!(output, vec![6.0, 22.0]);
    }

    #[test]
    fn window_of_an_unchecked_pair_does_not_underflow() {
        // Pairs emits 2 per chunk, more than the 1-sample window after it.
        let combo = Combination::new(Box::new(Pairs), Box::new(BlockSum { size: 1, hop: 1 }));
        assert_eq!(combo.window(), Window::new(2, 2, 1));
    }

    #[test]
    fn default_properties_stash_the_second_stage() {
        let combo = Combination::new(block_sum(), block_sum());
        let props = combo.default_properties();
        assert!(props.contains("size"));
        assert!(props.contains("next/size"));
    }
}
