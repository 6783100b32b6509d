//! Gain - scales every word by a fixed factor given in decibels.

use sluice_core::{Frames, FramesMut, Properties, SignalType, StageError, StatelessStage, Window};

/// Convert decibels to linear gain.
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Fixed gain, any signal type.
///
/// ## Parameters
/// - `gain_db`: Gain in dB (-120.0 to +40.0, default 0.0)
#[derive(Debug, Clone, Copy)]
pub struct Gain {
    linear: f32,
}

impl Default for Gain {
    fn default() -> Self {
        Self { linear: 1.0 }
    }
}

impl Gain {
    /// Creates a stage with the given gain in dB.
    pub fn new(gain_db: f32) -> Self {
        Self {
            linear: db_to_linear(gain_db),
        }
    }

    /// Linear factor applied to each word.
    pub fn linear(&self) -> f32 {
        self.linear
    }
}

impl StatelessStage for Gain {
    fn type_name(&self) -> &str {
        "gain"
    }

    fn default_properties(&self) -> Properties {
        Properties::new().with("gain_db", 0.0)
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<(), StageError> {
        let db = props.get_f64("gain_db").unwrap_or(0.0);
        if !(-120.0..=40.0).contains(&db) {
            return Err(StageError::invalid("gain_db", format!("{db} is outside -120..=40")));
        }
        self.linear = db_to_linear(db as f32);
        Ok(())
    }

    fn window(&self) -> Window {
        Window::unit()
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
        match inputs.first() {
            Some(ty) => Ok(vec![*ty]),
            None => Err(StageError::Rejected("gain needs one input".into())),
        }
    }

    fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
        for (out, &x) in outputs[0].words().iter_mut().zip(inputs[0].words()) {
            *out = x * self.linear;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_conversion() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-6);
        assert!((db_to_linear(-6.0206) - 0.5).abs() < 1e-3);
        assert!((db_to_linear(20.0) - 10.0).abs() < 1e-4);
    }

    #[test]
    fn range_is_checked() {
        let mut gain = Gain::default();
        assert!(gain.init_from_properties(&Properties::new().with("gain_db", 6.0)).is_ok());
        assert!((gain.linear() - 1.995).abs() < 1e-2);
        assert!(gain.init_from_properties(&Properties::new().with("gain_db", 90.0)).is_err());
    }

    #[test]
    fn scales_every_word_of_a_spectrum() {
        let gain = Gain::new(20.0);
        let words = [1.0, 2.0, 3.0, 4.0];
        let mut out = [0.0; 4];
        gain.process_chunk(&[Frames::new(&words, 2)], &mut [FramesMut::new(&mut out, 2)]);
        for (o, w) in out.iter().zip(words) {
            assert!((o - w * 10.0).abs() < 1e-4);
        }
    }
}
