//! Client side of a session.

use std::net::{TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use sluice_core::Properties;

use crate::error::RemoteError;
use crate::wire::{self, Channel, Control};

/// A connection bound to one session on a [`SessionServer`](crate::SessionServer).
///
/// Every call is one request and one reply. Nodes are addressed by the
/// unique name given at [`create`](Self::create).
///
/// # Example
///
/// ```rust,ignore
/// let mut session = RemoteSession::open("10.0.0.7:16661")?;
/// session.create("ramp", "src")?;
/// session.create("window+sum", "ws")?;
/// session.init("src", &Properties::new().with("count", 64usize))?;
/// session.init("ws", &Properties::new().with("size", 8usize))?;
/// session.connect("src", 0, "ws", 0)?;
/// session.go(true)?;
/// ```
#[derive(Debug)]
pub struct RemoteSession {
    channel: Channel,
    key: u32,
}

impl RemoteSession {
    /// Creates a new session on the server at `addr`.
    pub fn open(addr: impl ToSocketAddrs) -> Result<Self, RemoteError> {
        let mut channel = Channel::new(TcpStream::connect(addr)?)?;
        channel.send_code(Control::Open as u8)?;
        channel.flush()?;
        channel.read_status()?;
        let key = wire::read_word(channel.reader())?;
        Ok(Self { channel, key })
    }

    /// Joins an existing session.
    pub fn attach(addr: impl ToSocketAddrs, key: u32) -> Result<Self, RemoteError> {
        let mut channel = Channel::new(TcpStream::connect(addr)?)?;
        channel.send_code(Control::Attach as u8)?;
        wire::write_word(channel.writer(), key)?;
        channel.flush()?;
        channel.read_status()?;
        Ok(Self { channel, key })
    }

    /// Lists the type ids a server can instantiate, without opening a session.
    pub fn types_at(addr: impl ToSocketAddrs) -> Result<Vec<String>, RemoteError> {
        let mut channel = Channel::new(TcpStream::connect(addr)?)?;
        channel.send_code(Control::Types as u8)?;
        channel.flush()?;
        channel.read_status()?;
        wire::read_strs(channel.reader())
    }

    /// The session key, for attaching workers or other clients.
    pub fn key(&self) -> u32 {
        self.key
    }

    /// Bounds how long any reply may take.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<(), RemoteError> {
        Ok(self.channel.stream().set_read_timeout(timeout)?)
    }

    fn request(
        &mut self,
        ctl: Control,
        body: impl FnOnce(&mut Channel) -> std::io::Result<()>,
    ) -> Result<(), RemoteError> {
        self.channel.send_code(ctl as u8)?;
        body(&mut self.channel)?;
        self.channel.flush()?;
        self.channel.read_status()
    }

    fn link(&mut self, ctl: Control, from: &str, output: usize, to: &str, input: usize) -> Result<(), RemoteError> {
        self.request(ctl, |c| {
            wire::write_str(c.writer(), from)?;
            wire::write_len(c.writer(), output)?;
            wire::write_str(c.writer(), to)?;
            wire::write_len(c.writer(), input)
        })
    }

    /// Type ids the server can instantiate.
    pub fn types(&mut self) -> Result<Vec<String>, RemoteError> {
        self.request(Control::Types, |_| Ok(()))?;
        wire::read_strs(self.channel.reader())
    }

    /// Keeps the session from being reaped.
    pub fn keep_alive(&mut self) -> Result<(), RemoteError> {
        self.request(Control::KeepAlive, |_| Ok(()))
    }

    /// Attaches a second connection to this session and sends a keep-alive
    /// on it every `interval` until the returned handle is dropped.
    pub fn keep_alive_every(&self, interval: Duration) -> Result<KeepAlive, RemoteError> {
        let addr = self.channel.stream().peer_addr()?;
        let mut pinger = Self::attach(addr, self.key)?;
        pinger.set_timeout(Some(interval.max(Duration::from_secs(1))))?;
        let (halt, halted) = crossbeam_channel::bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("sluice-keepalive".into())
            .spawn(move || ping(pinger, &halted, interval))?;
        Ok(KeepAlive {
            halt: Some(halt),
            thread: Some(thread),
        })
    }

    /// Creates node `name` running component `kind` (`"a+b"` fuses stages).
    pub fn create(&mut self, kind: &str, name: &str) -> Result<(), RemoteError> {
        self.request(Control::Create, |c| {
            wire::write_str(c.writer(), kind)?;
            wire::write_str(c.writer(), name)
        })
    }

    /// Configures node `name`.
    pub fn init(&mut self, name: &str, props: &Properties) -> Result<(), RemoteError> {
        self.request(Control::Init, |c| {
            wire::write_str(c.writer(), name)?;
            wire::write_properties(c.writer(), props)
        })
    }

    /// Starts every node; with `wait`, reports start-up failures.
    pub fn go(&mut self, wait: bool) -> Result<(), RemoteError> {
        self.request(Control::Go, |c| wire::write_bool(c.writer(), wait))
    }

    /// Stops every node.
    pub fn stop(&mut self) -> Result<(), RemoteError> {
        self.request(Control::Stop, |_| Ok(()))
    }

    /// Blocks until every node has settled.
    pub fn wait_until_going(&mut self) -> Result<(), RemoteError> {
        self.request(Control::WaitUntilGoing, |_| Ok(()))
    }

    /// Clears buffers and processor state. The session must be stopped.
    pub fn reset(&mut self) -> Result<(), RemoteError> {
        self.request(Control::Reset, |_| Ok(()))
    }

    /// Wires output `output` of `from` to input `input` of `to`.
    pub fn connect(&mut self, from: &str, output: usize, to: &str, input: usize) -> Result<(), RemoteError> {
        self.link(Control::Connect, from, output, to, input)
    }

    /// Wires an independent copy of an output.
    pub fn split(&mut self, from: &str, output: usize, to: &str, input: usize) -> Result<(), RemoteError> {
        self.link(Control::Split, from, output, to, input)
    }

    /// Adds a reader to an output's existing buffer.
    pub fn share(&mut self, from: &str, output: usize, to: &str, input: usize) -> Result<(), RemoteError> {
        self.link(Control::Share, from, output, to, input)
    }

    /// Detaches input `input` of `name`.
    pub fn disconnect(&mut self, name: &str, input: usize) -> Result<(), RemoteError> {
        self.request(Control::Disconnect, |c| {
            wire::write_str(c.writer(), name)?;
            wire::write_len(c.writer(), input)
        })
    }

    /// Stops and deletes node `name`.
    pub fn remove(&mut self, name: &str) -> Result<(), RemoteError> {
        self.request(Control::Remove, |c| wire::write_str(c.writer(), name))
    }

    /// Gives the pool behind `name` `count` in-process workers on the server.
    pub fn add_workers(&mut self, name: &str, count: usize) -> Result<(), RemoteError> {
        self.request(Control::AddWorkers, |c| {
            wire::write_str(c.writer(), name)?;
            wire::write_len(c.writer(), count)
        })
    }

    /// Gives the pool behind `name` `count` workers served by another server,
    /// inside that server's session `key`.
    pub fn add_remote_workers(
        &mut self,
        name: &str,
        host: &str,
        port: u16,
        key: u32,
        count: usize,
    ) -> Result<(), RemoteError> {
        self.request(Control::AddRemoteWorkers, |c| {
            wire::write_str(c.writer(), name)?;
            wire::write_str(c.writer(), host)?;
            wire::write_word(c.writer(), u32::from(port))?;
            wire::write_word(c.writer(), key)?;
            wire::write_len(c.writer(), count)
        })
    }

    /// Ends the connection. The session lives on until reaped.
    pub fn close(mut self) -> Result<(), RemoteError> {
        self.request(Control::Close, |_| Ok(()))
    }
}

/// A background keep-alive started by [`RemoteSession::keep_alive_every`].
/// Dropping it stops the pings and closes their connection.
#[derive(Debug)]
pub struct KeepAlive {
    halt: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl KeepAlive {
    /// Whether pings are still being sent.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        drop(self.halt.take());
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("keep-alive thread panicked");
        }
    }
}

fn ping(mut session: RemoteSession, halted: &Receiver<()>, interval: Duration) {
    let key = session.key;
    loop {
        match halted.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(err) = session.keep_alive() {
                    tracing::warn!(key = %format_args!("{key:#010x}"), %err, "keep-alive failed");
                    return;
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    if let Err(err) = session.close() {
        tracing::debug!(%err, "keep-alive connection did not close cleanly");
    }
}
