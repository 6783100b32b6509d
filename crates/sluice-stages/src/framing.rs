//! Framer - cuts a waveform into overlapping, optionally tapered frames.
//!
//! Each chunk reads `size` input samples and emits one feature vector of
//! `size` words; consecutive chunks advance by `hop` samples.
//!
//! ```text
//! input:  0 1 2 3 4 5 6 7 8 9 ...       (size = 8, hop = 4)
//! frame0: 0 1 2 3 4 5 6 7
//! frame1:         4 5 6 7 8 9 10 11
//! ```
//!
//! # Parameters
//!
//! | Name | Default | Meaning |
//! |------|---------|---------|
//! | `size` | 8 | Samples per frame |
//! | `hop` | `size` | Samples between frame starts |
//! | `shape` | rectangular | Taper applied to each frame |

use sluice_core::{Frames, FramesMut, Properties, SignalType, StageError, StatelessStage, Window};

use crate::taper::Taper;
use crate::{frame_rate, positive, single_channel_rate};

/// Overlapping frame extraction.
#[derive(Debug, Clone)]
pub struct Framer {
    size: usize,
    hop: usize,
    taper: Taper,
    coeffs: Vec<f32>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(8, 8)
    }
}

impl Framer {
    /// Creates a rectangular framer.
    pub fn new(size: usize, hop: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            hop: hop.max(1),
            taper: Taper::Rectangular,
            coeffs: Taper::Rectangular.coefficients(size),
        }
    }

    /// Frame length in samples.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Hop in samples.
    pub fn hop(&self) -> usize {
        self.hop
    }
}

impl StatelessStage for Framer {
    fn type_name(&self) -> &str {
        "window"
    }

    fn default_properties(&self) -> Properties {
        Properties::new()
            .with("size", 8usize)
            .with("shape", Taper::Rectangular.name())
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<(), StageError> {
        let size = positive(props, "size", 8)?;
        let hop = props.get_usize("hop").filter(|&h| h > 0).unwrap_or(size);
        let taper = match props.get_str("shape") {
            Some(name) => Taper::parse(name)?,
            None => Taper::Rectangular,
        };
        self.size = size;
        self.hop = hop;
        self.taper = taper;
        self.coeffs = taper.coefficients(size);
        Ok(())
    }

    fn window(&self) -> Window {
        Window::new(self.size, self.hop, 1)
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
        let rate = single_channel_rate(self.type_name(), inputs)?;
        Ok(vec![SignalType::Features {
            size: self.size,
            rate: frame_rate(rate, self.hop),
        }])
    }

    fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
        let frame = inputs[0].words();
        for ((out, &x), &w) in outputs[0].words().iter_mut().zip(frame).zip(&self.coeffs) {
            *out = x * w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{BufferData, LocalCoupling};

    #[test]
    fn hop_defaults_to_size() {
        let mut framer = Framer::default();
        framer
            .init_from_properties(&Properties::new().with("size", 4usize))
            .unwrap();
        assert_eq!(framer.window(), Window::new(4, 4, 1));
    }

    #[test]
    fn emits_overlapping_frames() {
        let mut framer = Framer::new(4, 2);
        framer.init_from_properties(&Properties::new().with("size", 4usize).with("hop", 2usize)).unwrap();
        let types = framer.specify_types(&[SignalType::Wave { rate: 100.0 }]).unwrap();
        assert_eq!(types, vec![SignalType::Features { size: 4, rate: 50.0 }]);

        let input = BufferData::from_words((0..8).map(|v| v as f32).collect(), 1);
        let out = LocalCoupling::run(&framer, &[input], &[4], 3);
        assert_eq!(
            out[0].words(),
            &[0.0, 1.0, 2.0, 3.0, 2.0, 3.0, 4.0, 5.0, 4.0, 5.0, 6.0, 7.0]
        );
    }

    #[test]
    fn rejects_spectra_and_zero_sizes() {
        let mut framer = Framer::default();
        let spectrum = SignalType::Spectrum {
            bins: 5,
            rate: 10.0,
            step: 4,
        };
        assert!(matches!(framer.specify_types(&[spectrum]), Err(StageError::Rejected(_))));
        assert!(
            framer
                .init_from_properties(&Properties::new().with("size", 0usize))
                .is_err()
        );
    }
}
