//! Order-preserving fan-out of a stateless stage across workers.
//!
//! A [`WorkerPool`] is a [`Processor`] that cuts its input into batches of
//! whole chunks under the stage's `(in, step, out)` rule, hands each batch
//! to whichever worker is idle, and delivers results downstream strictly in
//! dispatch order, however the workers' finishing order turns out.
//!
//! # Modes
//!
//! - **In-thread**: no workers were added. The node thread runs the stage
//!   itself and writes results straight into scratch views.
//! - **Dispatch**: one thread per [`Coupling`] pulls batches from a shared
//!   queue. Results are reordered by sequence number before delivery.
//!
//! # Batching
//!
//! Batches hold `1 + round(weighting * (max_batch - 1))` chunks: weighting 0
//! favours latency (one chunk per call), 1 favours throughput.
//!
//! # Plungers
//!
//! At a plunger the pool processes every whole chunk before it, drops the
//! partial remainder, and waits for all outstanding results before the node
//! relays the plunger, so no result crosses a segment boundary.
//!
//! # Lost workers
//!
//! A coupling that fails hard is retired and its outstanding batches are
//! requeued for the surviving workers. So is one that holds the oldest
//! undelivered batch for longer than [`PoolOptions::stall_timeout`]; its
//! thread is detached rather than joined. If no worker survives, the node
//! fails with [`ErrorKind::Custom`] instead of hanging.

mod coupling;
mod local;

pub use coupling::{Coupling, CouplingError};
pub use local::LocalCoupling;

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::error::{Bail, ErrorKind, GraphError};
use crate::graph::{Arity, Flow, Io, PortSpec, Processor};
use crate::properties::Properties;
use crate::signal::SignalType;
use crate::stage::{StageFactory, StatelessStage, Window};
use crate::view::{BufferData, Frames, FramesMut, ScratchView};

/// How often a blocked result wait rechecks the trapdoor.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Scheduling knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolOptions {
    /// Largest batch, in chunks.
    pub max_batch: usize,
    /// Batches in flight at once; 0 means twice the total pipeline depth.
    pub max_in_flight: usize,
    /// 0 favours latency, 1 favours throughput.
    pub weighting: f32,
    /// How long the oldest undelivered batch may wait on its worker before
    /// that worker is declared lost.
    pub stall_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_batch: 8,
            max_in_flight: 0,
            weighting: 0.5,
            stall_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolOptions {
    /// Chunks per dispatched batch.
    pub fn batch_size(&self) -> usize {
        let max = self.max_batch.max(1);
        1 + (self.weighting.clamp(0.0, 1.0) * (max - 1) as f32).round() as usize
    }
}

/// Per-worker counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    /// The coupling's label.
    pub name: String,
    /// Batches completed.
    pub batches: u64,
    /// Chunks completed.
    pub chunks: u64,
    /// Time the worker reported spending on them.
    pub busy: Duration,
    /// Retired after a hard failure.
    pub lost: bool,
}

impl WorkerStats {
    /// Mean time per chunk.
    pub fn mean_chunk_time(&self) -> Option<Duration> {
        (self.chunks > 0).then(|| self.busy / self.chunks as u32)
    }
}

/// Counters for the current (or last) run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// One entry per worker started.
    pub workers: Vec<WorkerStats>,
    /// Chunks processed on the node thread itself.
    pub in_thread_chunks: u64,
}

struct PoolState {
    idle: Vec<Box<dyn Coupling>>,
    fixed: bool,
    stats: PoolStats,
}

struct PoolShared {
    factory: StageFactory,
    state: Mutex<PoolState>,
}

/// Handle for adding workers and reading statistics while the pool itself
/// is owned by its node.
#[derive(Clone)]
pub struct PoolHandle(Arc<PoolShared>);

impl core::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let st = self.0.state.lock();
        f.debug_struct("PoolHandle")
            .field("idle", &st.idle.len())
            .field("fixed", &st.fixed)
            .finish()
    }
}

impl PoolHandle {
    /// Adds a worker. Fails once the pool has started.
    pub fn add_worker(&self, coupling: Box<dyn Coupling>) -> Result<(), GraphError> {
        let mut st = self.0.state.lock();
        if st.fixed {
            return Err(GraphError::MultiplicityFixed);
        }
        tracing::debug!(worker = %coupling.describe(), "worker added");
        st.idle.push(coupling);
        Ok(())
    }

    /// Adds `count` in-process workers, each with its own stage instance.
    pub fn add_local(&self, count: usize) -> Result<(), GraphError> {
        for _ in 0..count {
            self.add_worker(Box::new(LocalCoupling::from_factory(&self.0.factory)))?;
        }
        Ok(())
    }

    /// Workers currently held by the pool (not counting those running).
    pub fn idle_workers(&self) -> usize {
        self.0.state.lock().idle.len()
    }

    /// Returns true once the worker set can no longer change.
    pub fn is_fixed(&self) -> bool {
        self.0.state.lock().fixed
    }

    /// Snapshot of the run's counters.
    pub fn stats(&self) -> PoolStats {
        self.0.state.lock().stats.clone()
    }
}

#[derive(Clone)]
struct Job {
    seq: u64,
    inputs: Arc<Vec<BufferData>>,
    count: usize,
}

/// A dispatched batch whose result has not arrived.
struct InFlight {
    job: Job,
    worker: Option<usize>,
    since: Instant,
}

enum Report {
    Taken {
        seq: u64,
        worker: usize,
    },
    Done {
        seq: u64,
        worker: usize,
        count: usize,
        outputs: Vec<BufferData>,
        elapsed: Duration,
    },
    Lost {
        worker: usize,
        reason: String,
    },
}

/// State of a dispatching run.
struct Dispatch {
    jobs: Sender<Job>,
    reports: Receiver<Report>,
    threads: Vec<JoinHandle<Option<Box<dyn Coupling>>>>,
    retired: Vec<bool>,
    live: usize,
    max_in_flight: usize,
    next_seq: u64,
    next_deliver: u64,
    pending: BTreeMap<u64, InFlight>,
    ready: BTreeMap<u64, Vec<BufferData>>,
}

impl Dispatch {
    fn in_flight(&self) -> u64 {
        self.next_seq - self.next_deliver
    }

    fn send(&mut self, job: Job) -> bool {
        self.pending.insert(
            job.seq,
            InFlight {
                job: job.clone(),
                worker: None,
                since: Instant::now(),
            },
        );
        self.jobs.send(job).is_ok()
    }

    /// Puts every batch held by `worker` back on the queue.
    fn requeue(&mut self, worker: usize) -> bool {
        let now = Instant::now();
        let mut jobs = Vec::new();
        for entry in self.pending.values_mut() {
            if entry.worker == Some(worker) {
                entry.worker = None;
                entry.since = now;
                jobs.push(entry.job.clone());
            }
        }
        jobs.into_iter().all(|job| self.jobs.send(job).is_ok())
    }

    /// The worker holding the head of the delivery order past `timeout`.
    fn stalled(&self, timeout: Duration) -> Option<usize> {
        let head = self.pending.get(&self.next_deliver)?;
        let worker = head.worker?;
        (head.since.elapsed() >= timeout).then_some(worker)
    }
}

/// A node processor running one stateless stage on many workers.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    stage: Box<dyn StatelessStage>,
    options: PoolOptions,
    properties: Properties,
    window: Window,
    batch: usize,
    in_types: Vec<SignalType>,
    out_types: Vec<SignalType>,
    dispatch: Option<Dispatch>,
}

impl WorkerPool {
    /// Creates a pool for stages built by `factory`.
    pub fn new(factory: StageFactory, options: PoolOptions) -> Self {
        let stage = factory();
        let window = stage.window();
        Self {
            shared: Arc::new(PoolShared {
                factory,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    fixed: false,
                    stats: PoolStats::default(),
                }),
            }),
            stage,
            options,
            properties: Properties::new(),
            window,
            batch: options.batch_size(),
            in_types: Vec::new(),
            out_types: Vec::new(),
            dispatch: None,
        }
    }

    /// Handle for adding workers and reading statistics.
    pub fn handle(&self) -> PoolHandle {
        PoolHandle(Arc::clone(&self.shared))
    }

    fn prepare(&self, coupling: &mut dyn Coupling) -> Result<(), CouplingError> {
        let (inputs, outputs) = self.stage.io();
        coupling.init_from_properties(&self.properties)?;
        coupling.define_io(inputs, outputs)?;
        if !coupling.specify_types(&self.in_types, &self.out_types)? {
            return Err(CouplingError::Refused("worker disagrees on types".into()));
        }
        coupling.go()
    }

    fn spawn_workers(&self, couplings: Vec<Box<dyn Coupling>>) -> Option<Dispatch> {
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<Job>();
        let (reports_tx, reports_rx) = crossbeam_channel::unbounded::<Report>();
        let mut threads = Vec::with_capacity(couplings.len());
        let mut names = Vec::with_capacity(couplings.len());
        let mut depth = 0;
        for coupling in couplings {
            let worker = threads.len();
            let name = coupling.describe();
            let pipeline = coupling.pipeline_depth().max(1);
            let jobs = jobs_rx.clone();
            let reports = reports_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("sluice-worker:{worker}"))
                .spawn(move || run_worker(worker, coupling, &jobs, &reports));
            match spawned {
                Ok(handle) => {
                    threads.push(handle);
                    names.push(name);
                    depth += pipeline;
                }
                Err(err) => tracing::warn!(worker = %name, %err, "could not spawn worker thread"),
            }
        }
        if threads.is_empty() {
            return None;
        }

        let mut st = self.shared.state.lock();
        st.stats = PoolStats {
            workers: names
                .into_iter()
                .map(|name| WorkerStats {
                    name,
                    ..WorkerStats::default()
                })
                .collect(),
            in_thread_chunks: 0,
        };
        drop(st);

        let max_in_flight = if self.options.max_in_flight == 0 {
            2 * depth
        } else {
            self.options.max_in_flight
        };
        Some(Dispatch {
            jobs: jobs_tx,
            reports: reports_rx,
            live: threads.len(),
            retired: vec![false; threads.len()],
            threads,
            max_in_flight,
            next_seq: 0,
            next_deliver: 0,
            pending: BTreeMap::new(),
            ready: BTreeMap::new(),
        })
    }

    /// Decides how much of the input to take this round.
    ///
    /// Returns `(chunks, consume, at_boundary)`; `at_boundary` is true when
    /// a plunger ends the readable run, in which case the whole run is
    /// consumed and the partial tail dropped.
    fn plan(&self, avail: usize) -> (usize, usize, bool) {
        let want = self.window.needed(self.batch);
        if avail >= want {
            (self.batch, self.batch * self.window.step, false)
        } else {
            (self.window.chunks_in(avail), avail, true)
        }
    }

    fn gather(&self, io: &Io<'_>, chunks: usize) -> Vec<BufferData> {
        let span = self.window.span(chunks);
        (0..io.inputs()).map(|i| io.peek(i, span)).collect()
    }

    fn consume(io: &Io<'_>, n: usize) {
        for i in 0..io.inputs() {
            io.skip(i, n);
        }
    }

    fn process_in_thread(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        let avail = io.wait_all(self.window.needed(self.batch))?;
        if avail == 0 {
            return Ok(Flow::Continue);
        }
        let (chunks, consume, _) = self.plan(avail);
        if chunks > 0 {
            let inputs = self.gather(io, chunks);
            let len = chunks * self.window.output;
            let mut views: Vec<ScratchView<'_>> = Vec::with_capacity(io.outputs());
            for o in 0..io.outputs() {
                views.push(io.write_scratch(o, len)?);
            }
            {
                let frames: Vec<Frames<'_>> = inputs.iter().map(BufferData::frames).collect();
                let mut out: Vec<FramesMut<'_>> = views.iter_mut().map(ScratchView::frames_mut).collect();
                self.stage.process_chunks(&frames, &mut out, chunks);
            }
            for (o, view) in views.into_iter().enumerate() {
                io.commit(o, view)?;
            }
            self.shared.state.lock().stats.in_thread_chunks += chunks as u64;
        }
        Self::consume(io, consume);
        Ok(Flow::Continue)
    }

    fn process_dispatch(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        if let Flow::Failed(kind) = self.collect_ready(io)? {
            return Ok(Flow::Failed(kind));
        }
        let want = self.window.needed(self.batch);
        let Some(run) = self.dispatch.as_ref() else {
            return Ok(Flow::Continue);
        };
        let in_flight = run.in_flight();
        if in_flight >= run.max_in_flight as u64 || (in_flight > 0 && !io.ready_all(want)) {
            return self.collect_one(io);
        }

        let avail = io.wait_all(want)?;
        if avail == 0 {
            return self.drain(io);
        }
        let (chunks, consume, at_boundary) = self.plan(avail);
        if chunks > 0 {
            let inputs = self.gather(io, chunks);
            if let Some(run) = self.dispatch.as_mut() {
                let job = Job {
                    seq: run.next_seq,
                    inputs: Arc::new(inputs),
                    count: chunks,
                };
                run.next_seq += 1;
                if !run.send(job) {
                    return Ok(Flow::Failed(ErrorKind::Custom("job queue closed".into())));
                }
            }
        }
        Self::consume(io, consume);
        let at_plunger = (0..io.inputs()).any(|i| io.next_plunger(i) == Some(0));
        if at_boundary || at_plunger {
            return self.drain(io);
        }
        Ok(Flow::Continue)
    }

    /// Handles every report already waiting.
    fn collect_ready(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        loop {
            let Some(run) = self.dispatch.as_ref() else {
                return Ok(Flow::Continue);
            };
            match run.reports.try_recv() {
                Ok(report) => {
                    if let Flow::Failed(kind) = self.handle_report(report, io)? {
                        return Ok(Flow::Failed(kind));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(Flow::Continue),
                Err(TryRecvError::Disconnected) => return Ok(all_lost()),
            }
        }
    }

    /// Blocks for one report.
    fn collect_one(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        loop {
            let Some(run) = self.dispatch.as_ref() else {
                return Ok(Flow::Continue);
            };
            match run.reports.recv_timeout(POLL_INTERVAL) {
                Ok(report) => return self.handle_report(report, io),
                Err(RecvTimeoutError::Timeout) => {
                    if io.is_cancelled() {
                        return Err(Bail);
                    }
                    let timeout = self.options.stall_timeout;
                    if let Some(worker) = run.stalled(timeout) {
                        let reason = format!("no result within {timeout:?}");
                        return Ok(self.retire(worker, &reason));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(all_lost()),
            }
        }
    }

    /// Blocks until every dispatched batch has been delivered.
    fn drain(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        while self.dispatch.as_ref().is_some_and(|run| run.in_flight() > 0) {
            if let Flow::Failed(kind) = self.collect_one(io)? {
                return Ok(Flow::Failed(kind));
            }
        }
        Ok(Flow::Continue)
    }

    fn handle_report(&mut self, report: Report, io: &Io<'_>) -> Result<Flow, Bail> {
        let Some(run) = self.dispatch.as_mut() else {
            return Ok(Flow::Continue);
        };
        match report {
            Report::Taken { seq, worker } => {
                let Some(entry) = run.pending.get_mut(&seq) else {
                    return Ok(Flow::Continue);
                };
                // A retired thread that wakes up may still pull from the queue.
                if run.retired[worker] {
                    let job = entry.job.clone();
                    if run.jobs.send(job).is_err() {
                        return Ok(all_lost());
                    }
                } else {
                    entry.worker = Some(worker);
                    entry.since = Instant::now();
                }
                Ok(Flow::Continue)
            }
            Report::Done {
                seq,
                worker,
                count,
                outputs,
                elapsed,
            } => {
                // A requeued batch may finish twice; the first result wins.
                if run.pending.remove(&seq).is_none() {
                    return Ok(Flow::Continue);
                }
                {
                    let mut st = self.shared.state.lock();
                    if let Some(ws) = st.stats.workers.get_mut(worker) {
                        ws.batches += 1;
                        ws.chunks += count as u64;
                        ws.busy += elapsed;
                    }
                }
                run.ready.insert(seq, outputs);
                while let Some(outputs) = run.ready.remove(&run.next_deliver) {
                    for (o, data) in outputs.iter().enumerate().take(io.outputs()) {
                        io.push(o, data)?;
                    }
                    run.next_deliver += 1;
                    // The stall clock starts when a batch reaches the head.
                    if let Some(head) = run.pending.get_mut(&run.next_deliver) {
                        head.since = Instant::now();
                    }
                }
                Ok(Flow::Continue)
            }
            Report::Lost { worker, reason } => {
                if run.retired[worker] {
                    return Ok(Flow::Continue);
                }
                Ok(self.retire(worker, &reason))
            }
        }
    }

    /// Takes `worker` out of service and requeues its batches.
    fn retire(&mut self, worker: usize, reason: &str) -> Flow {
        let Some(run) = self.dispatch.as_mut() else {
            return Flow::Continue;
        };
        run.retired[worker] = true;
        run.live = run.live.saturating_sub(1);
        let name = {
            let mut st = self.shared.state.lock();
            st.stats.workers.get_mut(worker).map(|ws| {
                ws.lost = true;
                ws.name.clone()
            })
        };
        let held = run.pending.values().filter(|e| e.worker == Some(worker)).count();
        tracing::warn!(
            worker = name.as_deref().unwrap_or("?"),
            %reason,
            requeued = held,
            remaining = run.live,
            "worker lost"
        );
        if run.live == 0 {
            return Flow::Failed(ErrorKind::Custom(format!(
                "every worker was lost; last failure: {reason}"
            )));
        }
        if run.requeue(worker) {
            Flow::Continue
        } else {
            all_lost()
        }
    }
}

fn all_lost() -> Flow {
    Flow::Failed(ErrorKind::Custom("every worker was lost".into()))
}

/// Worker thread body: keeps up to `pipeline_depth` transactions in flight
/// and reports each result. Returns the coupling unless it failed.
fn run_worker(
    worker: usize,
    mut coupling: Box<dyn Coupling>,
    jobs: &Receiver<Job>,
    reports: &Sender<Report>,
) -> Option<Box<dyn Coupling>> {
    let depth = coupling.pipeline_depth().max(1);
    let mut outstanding: VecDeque<Job> = VecDeque::with_capacity(depth);
    loop {
        while outstanding.len() < depth {
            let job = if outstanding.is_empty() {
                match jobs.recv() {
                    Ok(job) => job,
                    Err(_) => return Some(coupling),
                }
            } else {
                match jobs.try_recv() {
                    Ok(job) => job,
                    Err(_) => break,
                }
            };
            if reports.send(Report::Taken { seq: job.seq, worker }).is_err() {
                return Some(coupling);
            }
            if let Err(err) = coupling.transact(&job.inputs, job.count) {
                let _ = reports.send(Report::Lost {
                    worker,
                    reason: err.to_string(),
                });
                return None;
            }
            outstanding.push_back(job);
        }

        let Some(job) = outstanding.pop_front() else {
            continue;
        };
        match coupling.deliver_results() {
            Ok((outputs, elapsed)) => {
                let report = Report::Done {
                    seq: job.seq,
                    worker,
                    count: job.count,
                    outputs,
                    elapsed,
                };
                if reports.send(report).is_err() {
                    return Some(coupling);
                }
            }
            Err(err) => {
                let _ = reports.send(Report::Lost {
                    worker,
                    reason: err.to_string(),
                });
                return None;
            }
        }
    }
}

impl Processor for WorkerPool {
    fn type_name(&self) -> &str {
        self.stage.type_name()
    }

    fn default_properties(&self) -> Properties {
        self.stage.default_properties()
    }

    fn init_from_properties(&mut self, props: &Properties) -> Result<PortSpec, ErrorKind> {
        let merged = props.over(&self.stage.default_properties());
        self.stage.init_from_properties(&merged)?;
        self.properties = merged;
        self.window = self.stage.window();
        self.batch = self.options.batch_size();
        let (inputs, outputs) = self.stage.io();
        Ok(PortSpec {
            inputs: Arity::Fixed(inputs),
            outputs: Arity::Fixed(outputs),
            min_input_space: self.window.needed(self.batch),
            min_output_space: self.batch * self.window.output,
            homogeneous_inputs: false,
        })
    }

    fn specify_types(&mut self, inputs: &[SignalType]) -> Result<Vec<SignalType>, ErrorKind> {
        let outputs = self.stage.specify_types(inputs)?;
        self.in_types = inputs.to_vec();
        self.out_types.clone_from(&outputs);
        Ok(outputs)
    }

    fn started(&mut self) -> Result<(), ErrorKind> {
        let couplings = {
            let mut st = self.shared.state.lock();
            st.fixed = true;
            st.stats = PoolStats::default();
            std::mem::take(&mut st.idle)
        };
        if couplings.is_empty() {
            tracing::debug!(stage = %self.stage.type_name(), "running in-thread");
            return Ok(());
        }

        let mut ready = Vec::with_capacity(couplings.len());
        for mut coupling in couplings {
            match self.prepare(coupling.as_mut()) {
                Ok(()) => ready.push(coupling),
                Err(err) => {
                    tracing::warn!(worker = %coupling.describe(), %err, "worker failed to start; retiring it");
                }
            }
        }
        self.dispatch = self.spawn_workers(ready);
        match &self.dispatch {
            Some(run) => {
                tracing::debug!(
                    stage = %self.stage.type_name(),
                    workers = run.live,
                    batch = self.batch,
                    max_in_flight = run.max_in_flight,
                    "dispatching"
                );
                Ok(())
            }
            None => Err(ErrorKind::Custom("no worker could be started".into())),
        }
    }

    fn process(&mut self, io: &Io<'_>) -> Result<Flow, Bail> {
        if self.dispatch.is_some() {
            self.process_dispatch(io)
        } else {
            self.process_in_thread(io)
        }
    }

    fn stopping(&mut self) {
        let Some(run) = self.dispatch.take() else {
            return;
        };
        drop(run.jobs);
        let mut returned = Vec::with_capacity(run.threads.len());
        for (worker, handle) in run.threads.into_iter().enumerate() {
            if run.retired[worker] && !handle.is_finished() {
                tracing::warn!(worker, "detaching a stalled worker thread");
                continue;
            }
            match handle.join() {
                Ok(Some(coupling)) => returned.push(coupling),
                Ok(None) => {}
                Err(_) => tracing::error!("worker thread panicked"),
            }
        }
        for coupling in &mut returned {
            if let Err(err) = coupling.stopping().and_then(|()| coupling.stop()) {
                tracing::warn!(worker = %coupling.describe(), %err, "worker did not stop cleanly");
            }
        }
        let mut st = self.shared.state.lock();
        for ws in &st.stats.workers {
            tracing::debug!(
                worker = %ws.name,
                batches = ws.batches,
                chunks = ws.chunks,
                mean = ?ws.mean_chunk_time(),
                lost = ws.lost,
                "worker statistics"
            );
        }
        st.idle.extend(returned);
    }

    fn stopped(&mut self) {
        let mut st = self.shared.state.lock();
        for coupling in &mut st.idle {
            if let Err(err) = coupling.stopped() {
                tracing::warn!(worker = %coupling.describe(), %err, "stopped notification failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_follows_weighting() {
        let mut opts = PoolOptions {
            max_batch: 9,
            ..PoolOptions::default()
        };
        opts.weighting = 0.0;
        assert_eq!(opts.batch_size(), 1);
        opts.weighting = 0.5;
        assert_eq!(opts.batch_size(), 5);
        opts.weighting = 1.0;
        assert_eq!(opts.batch_size(), 9);
        opts.weighting = 7.0;
        assert_eq!(opts.batch_size(), 9);
        opts.max_batch = 0;
        assert_eq!(opts.batch_size(), 1);
    }

    #[test]
    fn mean_chunk_time() {
        let ws = WorkerStats {
            chunks: 4,
            busy: Duration::from_millis(40),
            ..WorkerStats::default()
        };
        assert_eq!(ws.mean_chunk_time(), Some(Duration::from_millis(10)));
        assert_eq!(WorkerStats::default().mean_chunk_time(), None);
    }
}
