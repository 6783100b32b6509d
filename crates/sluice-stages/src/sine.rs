//! Sine - a phase-accumulating test tone source.

use std::f64::consts::TAU;

use sluice_core::{Bail, ErrorKind, Flow, Io, PortSpec, Processor, Properties, SignalType};

/// Sine oscillator source.
///
/// ## Parameters
/// - `frequency`: Tone frequency in Hz (default 440)
/// - `amplitude`: Peak amplitude (default 1.0)
/// - `rate`: Sample rate in Hz (default 48000)
/// - `count`: Samples before a plunger and finish, 0 for endless (default 0)
/// - `block`: Samples per write (default 256)
#[derive(Debug, Clone)]
pub struct Sine {
    frequency: f64,
    amplitude: f32,
    rate: f64,
    count: usize,
    block: usize,
    phase: f64,
    emitted: usize,
}

impl Default for Sine {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            amplitude: 1.0,
            rate: 48_000.0,
            count: 0,
            block: 256,
            phase: 0.0,
            emitted: 0,
        }
    }
}

impl Sine {
    /// Creates an endless 440 Hz tone at 48 kHz.
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&mut self, out: &mut [f32]) {
        let inc = TAU * self.frequency / self.rate;
        for slot in out {
            *slot = self.amplitude * self.phase.sin() as f32;
            self.phase = (self.phase + inc) % TAU;
        }
    }
}

impl Processor for Sine {
    fn type_name(&self) -> &str {
        "sine"
    }

    fn default_properties(&self) -> Properties {
        Properties::new()
            .with("frequency", 440.0)
            .with("amplitude", 1.0)
            .with("rate", 48_000.0)
            .with("count", 0usize)
            .with("block", 256usize)
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<PortSpec, ErrorKind> {
        let d = Sine::default();
        self.frequency = props.get_f64("frequency").unwrap_or(d.frequency);
        self.amplitude = props.get_f64("amplitude").map_or(d.amplitude, |v| v as f32);
        self.rate = props.get_f64("rate").unwrap_or(d.rate);
        self.count = props.get_usize("count").unwrap_or(d.count);
        self.block = props.get_usize("block").unwrap_or(d.block).max(1);
        if self.rate <= 0.0 {
            return Err(ErrorKind::Custom(format!("sine rate must be positive, got {}", self.rate)));
        }
        if self.frequency < 0.0 || self.frequency > self.rate / 2.0 {
            return Err(ErrorKind::Custom(format!(
                "frequency {} is outside 0..={} Hz",
                self.frequency,
                self.rate / 2.0
            )));
        }
        Ok(PortSpec::new(0, 1).with_output_space(self.block))
    }

    fn specify_types(&mut self, _inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
        Ok(vec![SignalType::Wave { rate: self.rate as f32 }])
    }

    fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        let n = if self.count == 0 {
            self.block
        } else {
            self.block.min(self.count - self.emitted)
        };
        if n == 0 {
            io.plunge()?;
            return Ok(Flow::Finished);
        }
        let mut view = io.write_scratch(0, n)?;
        self.fill(view.data_mut());
        io.commit(0, view)?;
        self.emitted += n;
        Ok(Flow::Continue)
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.emitted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_rate_tone_cycles_every_four_samples() {
        let mut sine = Sine::new();
        sine.init_from_properties(
            &Properties::new()
                .with("frequency", 1000.0)
                .with("rate", 4000.0),
        )
        .unwrap();
        let mut out = [0.0f32; 8];
        sine.fill(&mut out);
        let expected = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0];
        for (o, e) in out.iter().zip(expected) {
            assert!((o - e).abs() < 1e-5, "{out:?}");
        }
    }

    #[test]
    fn frequency_above_nyquist_is_rejected() {
        let mut sine = Sine::new();
        let props = Properties::new().with("frequency", 30_000.0);
        assert!(sine.init_from_properties(&props).is_err());
    }
}
