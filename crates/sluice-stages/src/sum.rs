//! Sum - collapses each sample to the sum of its words.

use sluice_core::{Frames, FramesMut, Properties, SignalType, StageError, StatelessStage, Window};

/// Per-sample sum across words, producing a scalar stream.
///
/// A feature vector `[0, 1, ..., 7]` becomes the value `28`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Sum {
    /// Creates the stage.
    pub fn new() -> Self {
        Self
    }
}

impl StatelessStage for Sum {
    fn type_name(&self) -> &str {
        "sum"
    }

    fn init_from_properties(&mut self, _props: &Properties) -> Result<(), StageError> {
        Ok(())
    }

    fn window(&self) -> Window {
        Window::unit()
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
        let input = inputs
            .first()
            .ok_or_else(|| StageError::Rejected("sum needs one input".into()))?;
        Ok(vec![SignalType::Value { rate: input.rate() }])
    }

    fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
        outputs[0].words()[0] = inputs[0].sample(0).iter().sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{BufferData, LocalCoupling};

    #[test]
    fn sums_each_vector() {
        let mut sum = Sum::new();
        let types = sum
            .specify_types(&[SignalType::Features { size: 3, rate: 5.0 }])
            .unwrap();
        assert_eq!(types, vec![SignalType::Value { rate: 5.0 }]);
        let input = BufferData::from_words(vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0], 3);
        let out = LocalCoupling::run(&sum, &[input], &[1], 2);
        assert_eq!(out[0].words(), &[6.0, 60.0]);
    }
}
