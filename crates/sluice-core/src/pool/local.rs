//! A worker that runs its stage on the calling thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::properties::Properties;
use crate::signal::SignalType;
use crate::stage::{StageFactory, StatelessStage};
use crate::view::{BufferData, Frames, FramesMut};

use super::coupling::{Coupling, CouplingError};

/// In-process [`Coupling`] owning one stage instance.
///
/// Also used on the serving side of a remote worker, where each coupling
/// command read off the socket is applied to a `LocalCoupling`.
pub struct LocalCoupling {
    stage: Box<dyn StatelessStage>,
    queued: VecDeque<(Vec<BufferData>, usize)>,
    out_strides: Vec<usize>,
    outputs: usize,
}

impl LocalCoupling {
    /// Wraps a stage instance.
    pub fn new(stage: Box<dyn StatelessStage>) -> Self {
        let outputs = stage.io().1;
        Self {
            stage,
            queued: VecDeque::new(),
            out_strides: vec![1; outputs],
            outputs,
        }
    }

    /// Builds a fresh stage from `factory`.
    pub fn from_factory(factory: &StageFactory) -> Self {
        Self::new(factory())
    }

    /// The wrapped stage.
    pub fn stage(&self) -> &dyn StatelessStage {
        self.stage.as_ref()
    }

    /// Runs `count` chunks of `stage` over `inputs`, one output block per
    /// output channel.
    pub fn run(stage: &dyn StatelessStage, inputs: &[BufferData], out_strides: &[usize], count: usize) -> Vec<BufferData> {
        let window = stage.window();
        let frames: Vec<Frames<'_>> = inputs.iter().map(BufferData::frames).collect();
        let mut outputs: Vec<BufferData> = out_strides
            .iter()
            .map(|&stride| BufferData::zeroed(count * window.output, stride))
            .collect();
        {
            let mut out_frames: Vec<FramesMut<'_>> = outputs.iter_mut().map(BufferData::frames_mut).collect();
            stage.process_chunks(&frames, &mut out_frames, count);
        }
        outputs
    }
}

impl Coupling for LocalCoupling {
    fn describe(&self) -> String {
        format!("local:{}", self.stage.type_name())
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<(), CouplingError> {
        self.stage
            .init_from_properties(props)
            .map_err(|e| CouplingError::Refused(e.to_string()))
    }

    fn define_io(&mut self, inputs: usize, outputs: usize) -> Result<(), CouplingError> {
        let (want_in, want_out) = self.stage.io();
        if (inputs, outputs) != (want_in, want_out) {
            return Err(CouplingError::Refused(format!(
                "stage has {want_in} inputs and {want_out} outputs, pool asked for {inputs} and {outputs}"
            )));
        }
        self.outputs = outputs;
        Ok(())
    }

    fn specify_types(&mut self, inputs: &[SignalType], outputs: &[SignalType]) -> Result<bool, CouplingError> {
        let Ok(types) = self.stage.specify_types(inputs) else {
            return Ok(false);
        };
        self.out_strides = types.iter().map(SignalType::stride).collect();
        let n = self.outputs;
        Ok(types.len() >= n && outputs.len() >= n && types[..n] == outputs[..n])
    }

    fn go(&mut self) -> Result<(), CouplingError> {
        self.queued.clear();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CouplingError> {
        self.queued.clear();
        Ok(())
    }

    fn transact(&mut self, inputs: &[BufferData], count: usize) -> Result<(), CouplingError> {
        self.queued.push_back((inputs.to_vec(), count));
        Ok(())
    }

    fn deliver_results(&mut self) -> Result<(Vec<BufferData>, Duration), CouplingError> {
        let (inputs, count) = self
            .queued
            .pop_front()
            .ok_or_else(|| CouplingError::Refused("no transaction outstanding".into()))?;
        let started = Instant::now();
        let outputs = Self::run(self.stage.as_ref(), &inputs, &self.out_strides[..self.outputs], count);
        Ok((outputs, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::stage::Window;

    struct Pairs;

    impl StatelessStage for Pairs {
        fn type_name(&self) -> &str {
            "pairs"
        }

        fn init_from_properties(&mut self, _: &Properties) -> Result<(), StageError> {
            Ok(())
        }

        fn window(&self) -> Window {
            Window::new(2, 2, 1)
        }

        fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
            Ok(inputs.to_vec())
        }

        fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
            outputs[0].words()[0] = inputs[0].words()[0] * inputs[0].words()[1];
        }
    }

    #[test]
    fn transactions_deliver_in_order() {
        let wave = [SignalType::Wave { rate: 4.0 }];
        let mut c = LocalCoupling::new(Box::new(Pairs));
        c.init_from_properties(&Properties::new()).unwrap();
        c.define_io(1, 1).unwrap();
        assert!(c.specify_types(&wave, &wave).unwrap());
        c.go().unwrap();

        c.transact(&[BufferData::from_words(vec![1.0, 2.0, 3.0, 4.0], 1)], 2).unwrap();
        c.transact(&[BufferData::from_words(vec![5.0, 6.0], 1)], 1).unwrap();
        let (first, _) = c.deliver_results().unwrap();
        assert_eq!(first[0].words(), &[2.0, 12.0]);
        let second = c.process_chunks(&[BufferData::from_words(vec![2.0, 2.0], 1)], 1);
        // The older transaction is delivered first.
        assert_eq!(second.unwrap()[0].words(), &[30.0]);
    }

    #[test]
    fn mismatched_io_is_refused() {
        let mut c = LocalCoupling::new(Box::new(Pairs));
        assert!(matches!(c.define_io(2, 1), Err(CouplingError::Refused(_))));
    }

    #[test]
    fn mismatched_types_report_false() {
        let mut c = LocalCoupling::new(Box::new(Pairs));
        c.define_io(1, 1).unwrap();
        let ok = c
            .specify_types(&[SignalType::Wave { rate: 4.0 }], &[SignalType::Value { rate: 4.0 }])
            .unwrap();
        assert!(!ok);
    }
}
