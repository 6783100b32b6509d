//! Signal type descriptors.
//!
//! Every wire in a graph carries samples of a single [`SignalType`], fixed
//! once the graph has negotiated types at start-up. A sample is `stride`
//! consecutive `f32` words: one word for a waveform, `bins` words for a
//! spectrum, `size` words for a feature vector.

use serde::{Deserialize, Serialize};

/// Describes what flows along a connection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalType {
    /// Scalar values with no particular sample rate semantics.
    Value {
        /// Samples per second.
        rate: f32,
    },
    /// Time-domain waveform, one word per sample.
    Wave {
        /// Sample rate in Hz.
        rate: f32,
    },
    /// Frequency-domain frames.
    Spectrum {
        /// Number of bins per frame.
        bins: usize,
        /// Frames per second.
        rate: f32,
        /// Hop of the source waveform between frames, in source samples.
        step: usize,
    },
    /// Fixed-size feature vectors.
    Features {
        /// Words per vector.
        size: usize,
        /// Vectors per second.
        rate: f32,
    },
}

impl SignalType {
    /// Number of `f32` words making up one sample.
    #[inline]
    pub fn stride(&self) -> usize {
        match self {
            SignalType::Value { .. } | SignalType::Wave { .. } => 1,
            SignalType::Spectrum { bins, .. } => (*bins).max(1),
            SignalType::Features { size, .. } => (*size).max(1),
        }
    }

    /// Samples per second.
    #[inline]
    pub fn rate(&self) -> f32 {
        match self {
            SignalType::Value { rate }
            | SignalType::Wave { rate }
            | SignalType::Spectrum { rate, .. }
            | SignalType::Features { rate, .. } => *rate,
        }
    }

    /// Short tag used in logs and on the wire.
    pub const fn tag(&self) -> u32 {
        match self {
            SignalType::Value { .. } => 0,
            SignalType::Wave { .. } => 1,
            SignalType::Spectrum { .. } => 2,
            SignalType::Features { .. } => 3,
        }
    }

    /// Returns true if both types would share a buffer layout and rate.
    ///
    /// Used for fan-in homogeneity checks, where exact float equality on the
    /// rate is what we want: two wires derived from the same source carry
    /// bit-identical rates.
    pub fn same_shape(&self, other: &SignalType) -> bool {
        self.tag() == other.tag() && self.stride() == other.stride() && self.rate() == other.rate()
    }
}

impl core::fmt::Display for SignalType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SignalType::Value { rate } => write!(f, "Value({rate} Hz)"),
            SignalType::Wave { rate } => write!(f, "Wave({rate} Hz)"),
            SignalType::Spectrum { bins, rate, step } => {
                write!(f, "Spectrum({bins} bins, {rate} Hz, step {step})")
            }
            SignalType::Features { size, rate } => write!(f, "Features({size}, {rate} Hz)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_follows_kind() {
        assert_eq!(SignalType::Wave { rate: 48000.0 }.stride(), 1);
        assert_eq!(
            SignalType::Spectrum {
                bins: 513,
                rate: 93.75,
                step: 512
            }
            .stride(),
            513
        );
        assert_eq!(SignalType::Features { size: 8, rate: 1.0 }.stride(), 8);
    }

    #[test]
    fn same_shape_compares_layout_and_rate() {
        let a = SignalType::Wave { rate: 44100.0 };
        let b = SignalType::Wave { rate: 44100.0 };
        let c = SignalType::Wave { rate: 48000.0 };
        let d = SignalType::Value { rate: 44100.0 };
        assert!(a.same_shape(&b));
        assert!(!a.same_shape(&c));
        assert!(!a.same_shape(&d));
    }
}
