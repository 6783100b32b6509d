//! The session server.
//!
//! A session is a private graph of named nodes, addressed by a random key.
//! Clients drive it with [`Control`] requests; a connection that sends
//! [`Control::Worker`] instead becomes a worker link and runs one stage
//! instance for a remote [`WorkerPool`](sluice_core::WorkerPool).
//!
//! Sessions that go quiet are reaped: any request on a connection bound to
//! the session counts as a keep-alive, and a background thread deletes every
//! session idle for longer than the sweep interval, stopping its nodes.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rand::Rng;
use sluice_core::{
    BufferData, Coupling, CouplingError, DEFAULT_BUFFER_WORDS, Group, LinkMode, LocalCoupling, Node, PoolHandle,
    Properties,
};
use sluice_registry::Registry;

use crate::coupling::RemoteCoupling;
use crate::error::RemoteError;
use crate::wire::{self, Channel, Command, Control};

/// Keys below this value are never handed out.
pub const FIRST_KEY: u32 = 256;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 16661;

/// Server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptions {
    /// Address to listen on.
    pub bind: IpAddr,
    /// Port to listen on; 0 picks a free one.
    pub port: u16,
    /// Sessions idle for longer than this are reaped.
    pub sweep_interval: Duration,
    /// Read timeout for workers this server attaches to elsewhere.
    pub stall_timeout: Duration,
    /// Buffer size, in words, for every session's graph.
    pub default_words: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            sweep_interval: Duration::from_secs(30),
            stall_timeout: Duration::from_secs(10),
            default_words: DEFAULT_BUFFER_WORDS,
        }
    }
}

impl ServerOptions {
    /// Options for a server on `127.0.0.1` with an ephemeral port.
    pub fn loopback() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }

    /// The socket address to bind.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[derive(Default)]
struct Graph {
    group: Group,
    pools: HashMap<String, PoolHandle>,
}

struct Session {
    key: u32,
    last_seen: Mutex<Instant>,
    graph: Mutex<Graph>,
}

impl Session {
    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn idle(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

struct Tracked {
    key: Option<u32>,
    stream: TcpStream,
}

struct Shared {
    registry: Arc<Registry>,
    options: ServerOptions,
    sessions: Mutex<HashMap<u32, Arc<Session>>>,
    links: Mutex<HashMap<u64, Tracked>>,
    next_link: AtomicU64,
    closing: AtomicBool,
}

impl Shared {
    fn session(&self, key: u32) -> Option<Arc<Session>> {
        self.sessions.lock().get(&key).cloned()
    }

    fn open_session(&self) -> Arc<Session> {
        let mut rng = rand::thread_rng();
        let mut sessions = self.sessions.lock();
        let key = loop {
            let key = rng.gen_range(FIRST_KEY..=u32::MAX);
            if !sessions.contains_key(&key) {
                break key;
            }
        };
        let mut group = Group::new();
        group.set_default_words(self.options.default_words);
        let session = Arc::new(Session {
            key,
            last_seen: Mutex::new(Instant::now()),
            graph: Mutex::new(Graph {
                group,
                pools: HashMap::new(),
            }),
        });
        sessions.insert(key, Arc::clone(&session));
        tracing::info!(key = %format_args!("{key:#010x}"), "session opened");
        session
    }

    fn bind_link(&self, id: u64, key: u32) {
        if let Some(link) = self.links.lock().get_mut(&id) {
            link.key = Some(key);
        }
    }

    /// Drops every session idle for longer than `max_idle`. Returns how many.
    fn sweep(&self, max_idle: Duration) -> usize {
        let stale: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock();
            let keys: Vec<u32> = sessions
                .iter()
                .filter(|(_, s)| s.idle() > max_idle)
                .map(|(&k, _)| k)
                .collect();
            keys.iter().filter_map(|k| sessions.remove(k)).collect()
        };
        for session in &stale {
            tracing::warn!(key = %format_args!("{:#010x}", session.key), idle = ?session.idle(), "session reaped");
            self.close_session(session);
        }
        stale.len()
    }

    fn close_session(&self, session: &Session) {
        for link in self.links.lock().values() {
            if link.key == Some(session.key) {
                let _ = link.stream.shutdown(Shutdown::Both);
            }
        }
        let mut graph = session.graph.lock();
        graph.group.stop();
        graph.pools.clear();
    }
}

/// A running session server.
///
/// # Example
///
/// ```rust,ignore
/// let server = SessionServer::bind(ServerOptions::default(), Arc::new(Registry::new()))?;
/// println!("listening on {}", server.local_addr());
/// // ...
/// server.shutdown();
/// ```
pub struct SessionServer {
    shared: Arc<Shared>,
    addr: SocketAddr,
    accept: Option<JoinHandle<()>>,
    reaper: Option<JoinHandle<()>>,
    halt: Option<Sender<()>>,
}

impl core::fmt::Debug for SessionServer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionServer")
            .field("addr", &self.addr)
            .field("sessions", &self.shared.sessions.lock().len())
            .finish_non_exhaustive()
    }
}

impl SessionServer {
    /// Binds the listener and starts the accept and reaper threads.
    pub fn bind(options: ServerOptions, registry: Arc<Registry>) -> Result<Self, RemoteError> {
        let listener = TcpListener::bind(options.addr())?;
        let addr = listener.local_addr()?;
        let sweep_interval = options.sweep_interval;
        let shared = Arc::new(Shared {
            registry,
            options,
            sessions: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
            next_link: AtomicU64::new(0),
            closing: AtomicBool::new(false),
        });

        let accept = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("sluice-accept".into())
                .spawn(move || accept_loop(&listener, &shared))?
        };
        let (halt, halted) = crossbeam_channel::bounded::<()>(1);
        let reaper = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("sluice-reaper".into())
                .spawn(move || reap(&shared, &halted, sweep_interval))?
        };
        tracing::info!(%addr, ?sweep_interval, "session server listening");
        Ok(Self {
            shared,
            addr,
            accept: Some(accept),
            reaper: Some(reaper),
            halt: Some(halt),
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Keys of the live sessions.
    pub fn sessions(&self) -> Vec<u32> {
        self.shared.sessions.lock().keys().copied().collect()
    }

    /// Reaps sessions idle for longer than `max_idle` right away.
    pub fn sweep(&self, max_idle: Duration) -> usize {
        self.shared.sweep(max_idle)
    }

    /// Stops accepting, closes every connection, and stops every session's
    /// nodes. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.halt.take());
        // Wake the accept loop so it sees the flag.
        let _ = TcpStream::connect(wake_addr(self.addr));
        for link in self.shared.links.lock().values() {
            let _ = link.stream.shutdown(Shutdown::Both);
        }
        let sessions: Vec<Arc<Session>> = self.shared.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in &sessions {
            self.shared.close_session(session);
        }
        for handle in [self.accept.take(), self.reaper.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::error!("server thread panicked");
            }
        }
        tracing::info!(addr = %self.addr, "session server stopped");
    }
}

impl Drop for SessionServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wake_addr(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()),
        IpAddr::V6(ip) if ip.is_unspecified() => SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port()),
        _ => addr,
    }
}

fn accept_loop(listener: &TcpListener, shared: &Arc<Shared>) {
    for stream in listener.incoming() {
        if shared.closing.load(Ordering::Acquire) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                tracing::warn!(%err, "accept failed");
                continue;
            }
        };
        let id = shared.next_link.fetch_add(1, Ordering::Relaxed);
        match stream.try_clone() {
            Ok(handle) => {
                shared.links.lock().insert(id, Tracked { key: None, stream: handle });
            }
            Err(err) => {
                tracing::warn!(%err, "could not track connection");
                continue;
            }
        }
        let shared_link = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name(format!("sluice-link:{id}"))
            .spawn(move || serve_link(&shared_link, id, stream));
        if let Err(err) = spawned {
            tracing::warn!(%err, "could not spawn connection thread");
            shared.links.lock().remove(&id);
        }
    }
}

fn reap(shared: &Shared, halted: &Receiver<()>, interval: Duration) {
    loop {
        match halted.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                shared.sweep(interval);
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn serve_link(shared: &Arc<Shared>, id: u64, stream: TcpStream) {
    let peer = stream.peer_addr().map_or_else(|_| "?".to_string(), |a| a.to_string());
    tracing::debug!(%peer, "connection accepted");
    let result = Channel::new(stream).map_err(RemoteError::from).and_then(|channel| {
        ControlLink {
            shared,
            id,
            channel,
            session: None,
        }
        .run()
    });
    shared.links.lock().remove(&id);
    match result {
        Ok(()) => tracing::debug!(%peer, "connection closed"),
        Err(RemoteError::Io(err)) if is_hangup(&err) => tracing::debug!(%peer, %err, "connection dropped"),
        Err(err) => tracing::warn!(%peer, %err, "connection failed"),
    }
}

fn is_hangup(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
    )
}

/// A control request with its payload read off the wire.
enum Request {
    Open,
    Attach(u32),
    Types,
    KeepAlive,
    Create { kind: String, name: String },
    Init { name: String, props: Properties },
    Go { wait: bool },
    Stop,
    WaitUntilGoing,
    Reset,
    Link { mode: LinkMode, from: String, output: usize, to: String, input: usize },
    Disconnect { name: String, input: usize },
    Remove { name: String },
    AddWorkers { name: String, count: usize },
    AddRemoteWorkers { name: String, host: String, port: u16, key: u32, count: usize },
}

enum Reply {
    Done,
    Key(u32),
    Names(Vec<String>),
}

/// One client connection in control mode.
struct ControlLink<'a> {
    shared: &'a Arc<Shared>,
    id: u64,
    channel: Channel,
    session: Option<Arc<Session>>,
}

impl ControlLink<'_> {
    fn run(mut self) -> Result<(), RemoteError> {
        while let Some(code) = self.channel.read_code()? {
            let ctl = Control::from_code(code).ok_or_else(|| RemoteError::protocol(format!("unknown control code {code}")))?;
            match ctl {
                Control::Close => {
                    wire::write_ok(self.channel.writer())?;
                    self.channel.flush()?;
                    return Ok(());
                }
                Control::Worker => {
                    let key = wire::read_word(self.channel.reader())?;
                    let stage = wire::read_str(self.channel.reader())?;
                    return self.serve_worker(key, &stage);
                }
                _ => {
                    let request = self.read_request(ctl)?;
                    match self.execute(request) {
                        Ok(reply) => {
                            wire::write_ok(self.channel.writer())?;
                            match reply {
                                Reply::Done => {}
                                Reply::Key(key) => wire::write_word(self.channel.writer(), key)?,
                                Reply::Names(names) => wire::write_strs(self.channel.writer(), &names)?,
                            }
                        }
                        Err(reason) => wire::write_refusal(self.channel.writer(), &reason)?,
                    }
                    self.channel.flush()?;
                }
            }
        }
        Ok(())
    }

    fn read_request(&mut self, ctl: Control) -> Result<Request, RemoteError> {
        let r = self.channel.reader();
        Ok(match ctl {
            Control::Open => Request::Open,
            Control::Attach => Request::Attach(wire::read_word(r)?),
            Control::Types => Request::Types,
            Control::KeepAlive => Request::KeepAlive,
            Control::Create => Request::Create {
                kind: wire::read_str(r)?,
                name: wire::read_str(r)?,
            },
            Control::Init => Request::Init {
                name: wire::read_str(r)?,
                props: wire::read_properties(r)?,
            },
            Control::Go => Request::Go {
                wait: wire::read_bool(r)?,
            },
            Control::Stop => Request::Stop,
            Control::WaitUntilGoing => Request::WaitUntilGoing,
            Control::Reset => Request::Reset,
            Control::Connect | Control::Split | Control::Share => Request::Link {
                mode: match ctl {
                    Control::Split => LinkMode::Split,
                    Control::Share => LinkMode::Shared,
                    _ => LinkMode::Direct,
                },
                from: wire::read_str(r)?,
                output: wire::read_len(r)?,
                to: wire::read_str(r)?,
                input: wire::read_len(r)?,
            },
            Control::Disconnect => Request::Disconnect {
                name: wire::read_str(r)?,
                input: wire::read_len(r)?,
            },
            Control::Remove => Request::Remove {
                name: wire::read_str(r)?,
            },
            Control::AddWorkers => Request::AddWorkers {
                name: wire::read_str(r)?,
                count: wire::read_len(r)?,
            },
            Control::AddRemoteWorkers => Request::AddRemoteWorkers {
                name: wire::read_str(r)?,
                host: wire::read_str(r)?,
                port: u16::try_from(wire::read_word(r)?).map_err(|e| RemoteError::protocol(e.to_string()))?,
                key: wire::read_word(r)?,
                count: wire::read_len(r)?,
            },
            Control::Close | Control::Worker => {
                return Err(RemoteError::protocol(format!("{ctl:?} carries no request")));
            }
        })
    }

    fn bound(&self) -> Result<Arc<Session>, String> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| "no session; open or attach first".to_string())?;
        // The reaper may have removed it since.
        let live = self
            .shared
            .session(session.key)
            .ok_or_else(|| RemoteError::UnknownSession(session.key).to_string())?;
        live.touch();
        Ok(live)
    }

    fn execute(&mut self, request: Request) -> Result<Reply, String> {
        match request {
            Request::Open => {
                if self.session.is_some() {
                    return Err("connection already has a session".into());
                }
                let session = self.shared.open_session();
                let key = session.key;
                self.shared.bind_link(self.id, key);
                self.session = Some(session);
                Ok(Reply::Key(key))
            }
            Request::Attach(key) => {
                let session = self
                    .shared
                    .session(key)
                    .ok_or_else(|| RemoteError::UnknownSession(key).to_string())?;
                session.touch();
                self.shared.bind_link(self.id, key);
                self.session = Some(session);
                Ok(Reply::Done)
            }
            Request::Types => Ok(Reply::Names(
                self.shared.registry.ids().into_iter().map(String::from).collect(),
            )),
            Request::KeepAlive => self.bound().map(|_| Reply::Done),
            other => {
                let session = self.bound()?;
                let mut graph = session.graph.lock();
                self.edit(&mut graph, other).map(|()| Reply::Done)
            }
        }
    }

    fn edit(&self, graph: &mut Graph, request: Request) -> Result<(), String> {
        match request {
            Request::Create { kind, name } => {
                if graph.group.get(&name).is_some() {
                    return Err(format!("duplicate node name '{name}'"));
                }
                let registry = &self.shared.registry;
                let (created, pool) = match registry.create_pool(&kind) {
                    Some(pool) => {
                        let handle = pool.handle();
                        (Node::new(name.clone(), Box::new(pool)), Some(handle))
                    }
                    None => (
                        registry
                            .create_node(&kind, &name)
                            .ok_or_else(|| format!("unknown type '{kind}'"))?,
                        None,
                    ),
                };
                graph.group.add(created).map_err(|e| e.to_string())?;
                if let Some(handle) = pool {
                    graph.pools.insert(name.clone(), handle);
                }
                tracing::debug!(%kind, %name, "remote node created");
                Ok(())
            }
            Request::Init { name, props } => lookup(&graph.group, &name)?.configure(&props).map_err(|e| e.to_string()),
            Request::Go { wait } => graph.group.go(wait).map_err(|e| e.to_string()),
            Request::Stop => {
                graph.group.stop();
                Ok(())
            }
            Request::WaitUntilGoing => graph.group.wait_until_going().map_err(|e| e.to_string()),
            Request::Reset => graph.group.reset().map_err(|e| e.to_string()),
            Request::Link {
                mode,
                from,
                output,
                to,
                input,
            } => {
                let (from, to) = (lookup(&graph.group, &from)?, lookup(&graph.group, &to)?);
                let (out, inp) = (from.output(output), to.input(input));
                match mode {
                    LinkMode::Direct => out.connect(&inp),
                    LinkMode::Split => out.split(&inp),
                    LinkMode::Shared => out.share(&inp),
                }
                .map_err(|e| e.to_string())
            }
            Request::Disconnect { name, input } => lookup(&graph.group, &name)?.input(input).disconnect().map_err(|e| e.to_string()),
            Request::Remove { name } => {
                graph.pools.remove(&name);
                graph
                    .group
                    .remove(&name)
                    .map(drop)
                    .ok_or_else(|| format!("no node named '{name}'"))
            }
            Request::AddWorkers { name, count } => {
                let pool = graph
                    .pools
                    .get(&name)
                    .ok_or_else(|| format!("node '{name}' is not a worker pool"))?;
                pool.add_local(count).map_err(|e| e.to_string())
            }
            Request::AddRemoteWorkers {
                name,
                host,
                port,
                key,
                count,
            } => {
                let stage = lookup(&graph.group, &name)?.type_name().to_string();
                let pool = graph
                    .pools
                    .get(&name)
                    .ok_or_else(|| format!("node '{name}' is not a worker pool"))?;
                for _ in 0..count {
                    let worker = RemoteCoupling::connect((host.as_str(), port), key, &stage, self.shared.options.stall_timeout)
                        .map_err(|e| e.to_string())?;
                    pool.add_worker(Box::new(worker)).map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            Request::Open | Request::Attach(_) | Request::Types | Request::KeepAlive => Ok(()),
        }
    }

    /// Serves coupling commands for one stage instance until `Close` or
    /// hang-up.
    fn serve_worker(mut self, key: u32, stage: &str) -> Result<(), RemoteError> {
        let Some(session) = self.shared.session(key) else {
            wire::write_refusal(self.channel.writer(), &RemoteError::UnknownSession(key).to_string())?;
            return Ok(self.channel.flush()?);
        };
        let Some(factory) = self.shared.registry.stage_factory(stage) else {
            wire::write_refusal(self.channel.writer(), &format!("unknown stage '{stage}'"))?;
            return Ok(self.channel.flush()?);
        };
        self.shared.bind_link(self.id, key);
        session.touch();
        wire::write_ok(self.channel.writer())?;
        self.channel.flush()?;
        tracing::debug!(%stage, key = %format_args!("{key:#010x}"), "worker link attached");

        let mut worker = Worker {
            coupling: LocalCoupling::from_factory(&factory),
            finished: VecDeque::new(),
        };
        while let Some(code) = self.channel.read_code()? {
            let cmd = Command::from_code(code).ok_or_else(|| RemoteError::protocol(format!("unknown command code {code}")))?;
            session.touch();
            if cmd == Command::Close {
                wire::write_ok(self.channel.writer())?;
                self.channel.flush()?;
                break;
            }
            worker.apply(cmd, &mut self.channel)?;
            self.channel.flush()?;
        }
        Ok(())
    }
}

/// Serving side of a [`RemoteCoupling`].
struct Worker {
    coupling: LocalCoupling,
    /// Results computed at transact time, oldest first.
    finished: VecDeque<(Vec<BufferData>, usize, Duration)>,
}

impl Worker {
    fn apply(&mut self, cmd: Command, channel: &mut Channel) -> Result<(), RemoteError> {
        match cmd {
            Command::InitFromProperties => {
                let props = wire::read_properties(channel.reader())?;
                reply(channel, self.coupling.init_from_properties(&props))
            }
            Command::DefineIo => {
                let inputs = wire::read_len(channel.reader())?;
                let outputs = wire::read_len(channel.reader())?;
                reply(channel, self.coupling.define_io(inputs, outputs))
            }
            Command::SpecifyTypes => {
                let inputs = wire::read_types(channel.reader())?;
                let outputs = wire::read_types(channel.reader())?;
                match self.coupling.specify_types(&inputs, &outputs) {
                    Ok(agreed) => {
                        wire::write_ok(channel.writer())?;
                        Ok(wire::write_bool(channel.writer(), agreed)?)
                    }
                    Err(err) => Ok(wire::write_refusal(channel.writer(), &err.to_string())?),
                }
            }
            Command::Go => {
                self.finished.clear();
                reply(channel, self.coupling.go())
            }
            Command::Stop => {
                self.finished.clear();
                reply(channel, self.coupling.stop())
            }
            Command::Stopping => reply(channel, self.coupling.stopping()),
            Command::Stopped => reply(channel, self.coupling.stopped()),
            Command::Transact => {
                let (inputs, count) = wire::read_batch(channel.reader())?;
                let done = self
                    .coupling
                    .transact(&inputs, count)
                    .and_then(|()| self.coupling.deliver_results());
                match done {
                    Ok((outputs, elapsed)) => {
                        self.finished.push_back((outputs, count, elapsed));
                        Ok(wire::write_ok(channel.writer())?)
                    }
                    Err(err) => Ok(wire::write_refusal(channel.writer(), &err.to_string())?),
                }
            }
            Command::DeliverResults => match self.finished.pop_front() {
                Some((outputs, count, elapsed)) => {
                    wire::write_ok(channel.writer())?;
                    wire::write_batch(channel.writer(), &outputs, count)?;
                    Ok(wire::write_elapsed(channel.writer(), elapsed)?)
                }
                None => Ok(wire::write_refusal(channel.writer(), "no transaction outstanding")?),
            },
            Command::ProcessChunks => {
                let (inputs, count) = wire::read_batch(channel.reader())?;
                match self.coupling.process_chunks(&inputs, count) {
                    Ok(outputs) => {
                        wire::write_ok(channel.writer())?;
                        Ok(wire::write_batch(channel.writer(), &outputs, count)?)
                    }
                    Err(err) => Ok(wire::write_refusal(channel.writer(), &err.to_string())?),
                }
            }
            Command::Close => Ok(wire::write_ok(channel.writer())?),
        }
    }
}

fn lookup(group: &Group, name: &str) -> Result<Node, String> {
    group.get(name).cloned().ok_or_else(|| format!("no node named '{name}'"))
}

fn reply(channel: &mut Channel, result: Result<(), CouplingError>) -> Result<(), RemoteError> {
    match result {
        Ok(()) => wire::write_ok(channel.writer())?,
        Err(err) => wire::write_refusal(channel.writer(), &err.to_string())?,
    }
    Ok(())
}
