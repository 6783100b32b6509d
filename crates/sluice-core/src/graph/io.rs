//! The processor's view of its node's buffers.

use std::cell::Cell;
use std::sync::Arc;

use crate::error::Bail;
use crate::ring::{ReaderId, RingBuffer};
use crate::trapdoor::Trapdoor;
use crate::view::{BufferData, ScratchView};

/// One input: the buffer and this node's cursor on it.
#[derive(Debug, Clone)]
pub struct InputEnd {
    pub(crate) ring: Arc<RingBuffer>,
    pub(crate) reader: ReaderId,
}

impl InputEnd {
    pub(crate) fn at_plunger(&self) -> bool {
        self.ring.next_plunger(self.reader) == Some(0)
    }
}

/// Buffer access handed to [`Processor`](super::Processor) callbacks.
///
/// Every blocking call honours the node's trapdoor and returns [`Bail`] when
/// the node is being stopped.
pub struct Io<'a> {
    inputs: &'a [InputEnd],
    outputs: &'a [Vec<Arc<RingBuffer>>],
    trapdoor: &'a Trapdoor,
    progressed: Cell<bool>,
}

impl<'a> Io<'a> {
    pub(crate) fn new(
        inputs: &'a [InputEnd],
        outputs: &'a [Vec<Arc<RingBuffer>>],
        trapdoor: &'a Trapdoor,
    ) -> Self {
        Self {
            inputs,
            outputs,
            trapdoor,
            progressed: Cell::new(false),
        }
    }

    pub(crate) fn take_progress(&self) -> bool {
        self.progressed.replace(false)
    }

    fn touch(&self) {
        self.progressed.set(true);
    }

    /// Number of inputs.
    pub fn inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs.
    pub fn outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The node's cancellation token.
    pub fn trapdoor(&self) -> &Trapdoor {
        self.trapdoor
    }

    /// Returns true once the node is being stopped. For loops that wait on
    /// something other than a ring buffer.
    pub fn is_cancelled(&self) -> bool {
        self.trapdoor.is_open()
    }

    /// Blocks until `n` samples are readable on input `i`, or a plunger is
    /// closer. Returns the readable count up to the plunger; zero means the
    /// input sits on a plunger and must not be read until the node relays it.
    pub fn wait(&self, i: usize, n: usize) -> Result<usize, Bail> {
        let end = &self.inputs[i];
        end.ring.wait_ready(end.reader, n, self.trapdoor)
    }

    /// [`wait`](Self::wait) on every input; returns the smallest result.
    pub fn wait_all(&self, n: usize) -> Result<usize, Bail> {
        let mut ready = n;
        for i in 0..self.inputs.len() {
            ready = ready.min(self.wait(i, n)?);
        }
        Ok(ready)
    }

    /// Non-blocking check that [`wait_all`](Self::wait_all) would return
    /// immediately.
    pub fn ready_all(&self, n: usize) -> bool {
        self.inputs.iter().all(|end| {
            end.ring.elements_used(end.reader) >= n
                || end.ring.next_plunger(end.reader).is_some_and(|d| d < n)
        })
    }

    /// Samples currently readable on input `i`, ignoring plungers.
    pub fn available(&self, i: usize) -> usize {
        let end = &self.inputs[i];
        end.ring.elements_used(end.reader)
    }

    /// Distance to the next plunger on input `i`.
    pub fn next_plunger(&self, i: usize) -> Option<usize> {
        let end = &self.inputs[i];
        end.ring.next_plunger(end.reader)
    }

    /// Reads and consumes `n` samples from input `i`.
    pub fn read(&self, i: usize, n: usize) -> BufferData {
        self.touch();
        let end = &self.inputs[i];
        end.ring.read(end.reader, n)
    }

    /// Reads `n` samples from input `i` without consuming them.
    pub fn peek(&self, i: usize, n: usize) -> BufferData {
        let end = &self.inputs[i];
        end.ring.peek(end.reader, n)
    }

    /// Consumes `n` samples from input `i`.
    pub fn skip(&self, i: usize, n: usize) {
        if n > 0 {
            self.touch();
        }
        let end = &self.inputs[i];
        end.ring.skip(end.reader, n);
    }

    /// Capacity of output `o`'s primary buffer.
    pub fn output_capacity(&self, o: usize) -> usize {
        self.outputs[o].first().map_or(0, |r| r.capacity())
    }

    /// Words per sample on output `o`.
    pub fn output_stride(&self, o: usize) -> usize {
        self.outputs[o].first().map_or(1, |r| r.stride())
    }

    /// Exclusive write view of `n` samples on output `o`.
    ///
    /// Complete it with [`commit`](Self::commit) so split copies receive the
    /// data too.
    pub fn write_scratch(&self, o: usize, n: usize) -> Result<ScratchView<'_>, Bail> {
        self.outputs[o][0].write_scratch(n, self.trapdoor)
    }

    /// Publishes a scratch view from output `o`, copying it to every split.
    pub fn commit(&self, o: usize, view: ScratchView<'_>) -> Result<(), Bail> {
        let n = view.samples();
        self.commit_samples(o, view, n)
    }

    /// Publishes the first `n` samples of a scratch view from output `o`.
    pub fn commit_samples(&self, o: usize, view: ScratchView<'_>, n: usize) -> Result<(), Bail> {
        self.touch();
        let splits = &self.outputs[o][1..];
        if splits.is_empty() {
            view.commit_samples(n);
            return Ok(());
        }
        let copy = BufferData::from_words(view.data()[..n * view.stride()].to_vec(), view.stride());
        view.commit_samples(n);
        for ring in splits {
            ring.write_copy(&copy, self.trapdoor)?;
        }
        Ok(())
    }

    /// Copies `data` to output `o`, in pieces no larger than the buffer.
    pub fn push(&self, o: usize, data: &BufferData) -> Result<(), Bail> {
        self.touch();
        for ring in &self.outputs[o] {
            let piece = ring.capacity();
            let total = data.samples();
            if total <= piece {
                ring.write_copy(data, self.trapdoor)?;
                continue;
            }
            let mut at = 0;
            while at < total {
                let len = piece.min(total - at);
                ring.write_copy(&data.slice(at, len), self.trapdoor)?;
                at += len;
            }
        }
        Ok(())
    }

    /// Inserts a plunger on every output.
    pub fn plunge(&self) -> Result<(), Bail> {
        self.touch();
        for ring in self.outputs.iter().flatten() {
            ring.insert_plunger(self.trapdoor)?;
        }
        Ok(())
    }
}
