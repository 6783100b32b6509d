//! A worker reached over TCP.

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use sluice_core::{BufferData, Coupling, CouplingError, Properties, SignalType};

use crate::error::RemoteError;
use crate::wire::{self, Channel, Command, Control};

/// [`Coupling`] to a stage served by a [`SessionServer`](crate::SessionServer).
///
/// Up to [`PIPELINE_DEPTH`](Self::PIPELINE_DEPTH) transactions may be
/// outstanding, so the next batch is on the wire while the previous one is
/// being computed. A peer that stays silent for the stall timeout, or whose
/// connection drops, is reported as [`CouplingError::Lost`].
#[derive(Debug)]
pub struct RemoteCoupling {
    channel: Channel,
    label: String,
    /// Transact acknowledgements not yet read.
    unacked: usize,
}

impl RemoteCoupling {
    /// Transactions kept in flight per remote worker.
    pub const PIPELINE_DEPTH: usize = 2;

    /// Connects to the server at `addr`, inside session `key`, and asks it
    /// for a worker running stage `stage`.
    pub fn connect(
        addr: impl ToSocketAddrs,
        key: u32,
        stage: &str,
        stall_timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let stream = TcpStream::connect(addr)?;
        let label = format!("remote:{}/{stage}", stream.peer_addr()?);
        stream.set_read_timeout(Some(stall_timeout))?;
        let mut channel = Channel::new(stream)?;
        channel.send_code(Control::Worker as u8)?;
        wire::write_word(channel.writer(), key)?;
        wire::write_str(channel.writer(), stage)?;
        channel.flush()?;
        channel.read_status()?;
        tracing::debug!(worker = %label, "remote worker attached");
        Ok(Self {
            channel,
            label,
            unacked: 0,
        })
    }

    /// Sends `cmd` with the payload written by `body`, then reads the reply
    /// status (after any pending transact acknowledgements).
    fn request(
        &mut self,
        cmd: Command,
        body: impl FnOnce(&mut Channel) -> std::io::Result<()>,
    ) -> Result<(), RemoteError> {
        self.channel.send_code(cmd as u8)?;
        body(&mut self.channel)?;
        self.channel.flush()?;
        self.settle()?;
        self.channel.read_status()
    }

    /// Reads the acknowledgements of earlier transacts, in order.
    fn settle(&mut self) -> Result<(), RemoteError> {
        while self.unacked > 0 {
            self.unacked -= 1;
            self.channel.read_status()?;
        }
        Ok(())
    }
}

impl Coupling for RemoteCoupling {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<(), CouplingError> {
        Ok(self.request(Command::InitFromProperties, |c| wire::write_properties(c.writer(), props))?)
    }

    fn define_io(&mut self, inputs: usize, outputs: usize) -> Result<(), CouplingError> {
        Ok(self.request(Command::DefineIo, |c| {
            wire::write_len(c.writer(), inputs)?;
            wire::write_len(c.writer(), outputs)
        })?)
    }

    fn specify_types(&mut self, inputs: &[SignalType], outputs: &[SignalType]) -> Result<bool, CouplingError> {
        self.request(Command::SpecifyTypes, |c| {
            wire::write_types(c.writer(), inputs)?;
            wire::write_types(c.writer(), outputs)
        })?;
        Ok(wire::read_bool(self.channel.reader())?)
    }

    fn go(&mut self) -> Result<(), CouplingError> {
        Ok(self.request(Command::Go, |_| Ok(()))?)
    }

    fn stop(&mut self) -> Result<(), CouplingError> {
        Ok(self.request(Command::Stop, |_| Ok(()))?)
    }

    fn stopping(&mut self) -> Result<(), CouplingError> {
        Ok(self.request(Command::Stopping, |_| Ok(()))?)
    }

    fn stopped(&mut self) -> Result<(), CouplingError> {
        Ok(self.request(Command::Stopped, |_| Ok(()))?)
    }

    fn transact(&mut self, inputs: &[BufferData], count: usize) -> Result<(), CouplingError> {
        self.channel.send_code(Command::Transact as u8).map_err(RemoteError::from)?;
        wire::write_batch(self.channel.writer(), inputs, count).map_err(RemoteError::from)?;
        self.channel.flush().map_err(RemoteError::from)?;
        self.unacked += 1;
        Ok(())
    }

    fn deliver_results(&mut self) -> Result<(Vec<BufferData>, Duration), CouplingError> {
        self.request(Command::DeliverResults, |_| Ok(()))?;
        let (outputs, _) = wire::read_batch(self.channel.reader())?;
        let elapsed = wire::read_elapsed(self.channel.reader())?;
        Ok((outputs, elapsed))
    }

    fn process_chunks(&mut self, inputs: &[BufferData], count: usize) -> Result<Vec<BufferData>, CouplingError> {
        self.request(Command::ProcessChunks, |c| wire::write_batch(c.writer(), inputs, count))?;
        Ok(wire::read_batch(self.channel.reader())?.0)
    }

    fn pipeline_depth(&self) -> usize {
        Self::PIPELINE_DEPTH
    }
}

impl Drop for RemoteCoupling {
    fn drop(&mut self) {
        // The server may already be gone; nothing to report.
        if self.channel.send_code(Command::Close as u8).is_ok() {
            let _ = self.channel.flush();
        }
    }
}
