//! Analysis windows applied to a frame before it leaves a framing stage.

use std::f32::consts::PI;

use sluice_core::StageError;

/// Taper shapes a framer can apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Taper {
    /// Flat; frames pass through unchanged.
    #[default]
    Rectangular,
    /// Raised cosine, zero at both ends.
    Hann,
    /// Raised cosine on a 0.08 pedestal.
    Hamming,
    /// Three-term cosine with lower sidelobes.
    Blackman,
}

impl Taper {
    /// Parses the `shape` property.
    pub fn parse(name: &str) -> Result<Self, StageError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "rectangular" | "rect" | "none" => Ok(Taper::Rectangular),
            "hann" | "hanning" => Ok(Taper::Hann),
            "hamming" => Ok(Taper::Hamming),
            "blackman" => Ok(Taper::Blackman),
            other => Err(StageError::invalid("shape", format!("unknown window '{other}'"))),
        }
    }

    /// Property spelling of this taper.
    pub const fn name(&self) -> &'static str {
        match self {
            Taper::Rectangular => "rectangular",
            Taper::Hann => "hann",
            Taper::Hamming => "hamming",
            Taper::Blackman => "blackman",
        }
    }

    /// Window coefficients for a frame of `size` samples.
    pub fn coefficients(&self, size: usize) -> Vec<f32> {
        let n = size as f32;
        (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f32 / n;
                match self {
                    Taper::Rectangular => 1.0,
                    Taper::Hann => 0.5 * (1.0 - x.cos()),
                    Taper::Hamming => 0.54 - 0.46 * x.cos(),
                    Taper::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_names() {
        for taper in [Taper::Rectangular, Taper::Hann, Taper::Hamming, Taper::Blackman] {
            assert_eq!(Taper::parse(taper.name()), Ok(taper));
        }
        assert_eq!(Taper::parse(" Hanning "), Ok(Taper::Hann));
        assert!(Taper::parse("kaiser").is_err());
    }

    #[test]
    fn hann_starts_at_zero_and_peaks_mid_frame() {
        let c = Taper::Hann.coefficients(8);
        assert!(c[0].abs() < 1e-6);
        assert!((c[4] - 1.0).abs() < 1e-6);
        assert!(Taper::Rectangular.coefficients(4).iter().all(|&w| w == 1.0));
    }
}
