//! Ramp - a counting source, mainly for tests and demos.

use sluice_core::{Bail, ErrorKind, Flow, Io, PortSpec, Processor, Properties, SignalType};

/// Emits `start, start + 1, ...` for `count` samples, then a plunger.
///
/// With `segment > 0` a plunger is also inserted after every `segment`
/// samples, so one run produces several segments.
///
/// ## Parameters
/// - `count`: Samples to emit (default 16)
/// - `start`: First value (default 0.0)
/// - `block`: Samples per write (default 64)
/// - `segment`: Samples per segment, 0 for one segment (default 0)
/// - `plunge`: Send the final plunger (default true)
/// - `rate`: Declared sample rate in Hz (default 48000)
#[derive(Debug, Clone)]
pub struct Ramp {
    count: usize,
    start: f32,
    block: usize,
    segment: usize,
    plunge: bool,
    rate: f32,
    emitted: usize,
}

impl Default for Ramp {
    fn default() -> Self {
        Self {
            count: 16,
            start: 0.0,
            block: 64,
            segment: 0,
            plunge: true,
            rate: 48_000.0,
            emitted: 0,
        }
    }
}

impl Ramp {
    /// Creates a ramp with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_write(&self) -> usize {
        let mut n = self.block.min(self.count - self.emitted);
        if self.segment > 0 {
            n = n.min(self.segment - self.emitted % self.segment);
        }
        n
    }
}

impl Processor for Ramp {
    fn type_name(&self) -> &str {
        "ramp"
    }

    fn default_properties(&self) -> Properties {
        let d = Ramp::default();
        Properties::new()
            .with("count", d.count)
            .with("start", d.start)
            .with("block", d.block)
            .with("segment", d.segment)
            .with("plunge", d.plunge)
            .with("rate", d.rate)
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<PortSpec, ErrorKind> {
        let d = Ramp::default();
        self.count = props.get_usize("count").unwrap_or(d.count);
        self.start = props.get_f64("start").map_or(d.start, |v| v as f32);
        self.block = props.get_usize("block").unwrap_or(d.block).max(1);
        self.segment = props.get_usize("segment").unwrap_or(d.segment);
        self.plunge = props.get_bool("plunge").unwrap_or(d.plunge);
        self.rate = props.get_f64("rate").map_or(d.rate, |v| v as f32);
        if self.rate <= 0.0 {
            return Err(ErrorKind::Custom(format!("ramp rate must be positive, got {}", self.rate)));
        }
        Ok(PortSpec::new(0, 1).with_output_space(self.block))
    }

    fn specify_types(&mut self, _inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
        Ok(vec![SignalType::Wave { rate: self.rate }])
    }

    fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        if self.emitted < self.count {
            let n = self.next_write();
            let mut view = io.write_scratch(0, n)?;
            for (k, slot) in view.data_mut().iter_mut().enumerate() {
                *slot = self.start + (self.emitted + k) as f32;
            }
            io.commit(0, view)?;
            self.emitted += n;
            if self.segment > 0 && self.emitted % self.segment == 0 && self.emitted < self.count {
                io.plunge()?;
            }
            return Ok(Flow::Continue);
        }
        if self.plunge {
            io.plunge()?;
        }
        tracing::debug!(samples = self.emitted, "ramp finished");
        Ok(Flow::Finished)
    }

    fn reset(&mut self) {
        self.emitted = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_stop_at_segment_edges() {
        let mut ramp = Ramp::new();
        ramp.init_from_properties(
            &Properties::new()
                .with("count", 10usize)
                .with("block", 4usize)
                .with("segment", 3usize),
        )
        .unwrap();
        let mut sizes = Vec::new();
        while ramp.emitted < ramp.count {
            let n = ramp.next_write();
            sizes.push(n);
            ramp.emitted += n;
        }
        assert_eq!(sizes, vec![3, 3, 3, 1]);
    }

    #[test]
    fn negative_rate_is_rejected() {
        let mut ramp = Ramp::new();
        assert!(ramp.init_from_properties(&Properties::new().with("rate", -1.0)).is_err());
    }
}
