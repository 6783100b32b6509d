//! Magnitude - short-time magnitude spectrum of a waveform.
//!
//! Each chunk tapers `size` samples, runs a forward FFT, and emits the
//! `size / 2 + 1` bin magnitudes from DC to Nyquist. The FFT plan is built
//! once at configuration and shared by every concurrent call.
//!
//! # Parameters
//!
//! | Name | Default | Meaning |
//! |------|---------|---------|
//! | `size` | 512 | FFT length in samples |
//! | `hop` | `size / 2` | Samples between frames |
//! | `shape` | hann | Taper applied before the transform |

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use sluice_core::{Frames, FramesMut, Properties, SignalType, StageError, StatelessStage, Window};

use crate::taper::Taper;
use crate::{frame_rate, positive, single_channel_rate};

/// STFT magnitude stage.
pub struct Magnitude {
    size: usize,
    hop: usize,
    coeffs: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Magnitude")
            .field("size", &self.size)
            .field("hop", &self.hop)
            .finish_non_exhaustive()
    }
}

impl Default for Magnitude {
    fn default() -> Self {
        Self::new(512, 256)
    }
}

impl Magnitude {
    /// Creates a Hann-tapered stage.
    pub fn new(size: usize, hop: usize) -> Self {
        let size = size.max(2);
        Self {
            size,
            hop: hop.max(1),
            coeffs: Taper::Hann.coefficients(size),
            fft: FftPlanner::new().plan_fft_forward(size),
        }
    }

    /// Number of output bins per frame.
    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }
}

impl StatelessStage for Magnitude {
    fn type_name(&self) -> &str {
        "magnitude"
    }

    fn default_properties(&self) -> Properties {
        Properties::new()
            .with("size", 512usize)
            .with("shape", Taper::Hann.name())
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<(), StageError> {
        let size = positive(props, "size", 512)?;
        if size < 2 {
            return Err(StageError::invalid("size", "an FFT needs at least 2 samples"));
        }
        let hop = props.get_usize("hop").filter(|&h| h > 0).unwrap_or(size / 2);
        let taper = match props.get_str("shape") {
            Some(name) => Taper::parse(name)?,
            None => Taper::Hann,
        };
        if size != self.size {
            self.fft = FftPlanner::new().plan_fft_forward(size);
        }
        self.size = size;
        self.hop = hop;
        self.coeffs = taper.coefficients(size);
        tracing::debug!(size, hop, taper = taper.name(), "magnitude configured");
        Ok(())
    }

    fn window(&self) -> Window {
        Window::new(self.size, self.hop, 1)
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, StageError> {
        let rate = single_channel_rate(self.type_name(), inputs)?;
        Ok(vec![SignalType::Spectrum {
            bins: self.bins(),
            rate: frame_rate(rate, self.hop),
            step: self.hop,
        }])
    }

    fn process_chunk(&self, inputs: &[Frames<'_>], outputs: &mut [FramesMut<'_>]) {
        let mut buffer: Vec<Complex<f32>> = inputs[0]
            .words()
            .iter()
            .zip(&self.coeffs)
            .map(|(&x, &w)| Complex::new(x * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);
        for (out, c) in outputs[0].words().iter_mut().zip(&buffer) {
            *out = c.norm();
        }
    }
}
