//! Servers, sessions, and remote workers over loopback.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sluice_core::{Group, Node, Properties, WorkerPool};
use sluice_registry::Registry;
use sluice_remote::{RemoteCoupling, RemoteError, RemoteSession, ServerOptions, SessionServer};
use sluice_stages::{Collector, Ramp};

const PATIENCE: Duration = Duration::from_secs(10);

fn server(options: ServerOptions) -> SessionServer {
    SessionServer::bind(options, Arc::new(Registry::new())).unwrap()
}

fn refused(result: Result<(), RemoteError>, needle: &str) {
    match result {
        Err(RemoteError::Refused(msg)) => assert!(msg.contains(needle), "'{msg}' does not mention '{needle}'"),
        other => panic!("expected a refusal mentioning '{needle}', got {other:?}"),
    }
}

/// ramp → `pool` (window size 8, hop 4, then sum) → collector, run until
/// `segments` plungers arrive. Returns the sums, split per segment.
fn run_window_sum(pool: WorkerPool, ramp: &Properties, segments: usize) -> Vec<Vec<f32>> {
    let node = Node::new("window+sum", Box::new(pool));
    node.configure(&Properties::new().with("size", 8usize).with("hop", 4usize))
        .unwrap();
    let source = Node::new("ramp", Box::new(Ramp::new()));
    source.configure(ramp).unwrap();
    let collector = Collector::new();
    let seen = collector.handle();
    let sink = Node::new("collect", Box::new(collector));
    sink.configure(&Properties::new()).unwrap();
    source.output(0).connect(&node.input(0)).unwrap();
    node.output(0).connect(&sink.input(0)).unwrap();

    let mut group = Group::new();
    group.set_default_words(4096);
    group.add(source).unwrap();
    group.add(node).unwrap();
    group.add(sink).unwrap();
    group.go(true).unwrap();
    assert!(seen.wait_for_plungers(segments, PATIENCE));
    group.stop();
    seen.segments(0)
}

#[test]
fn remote_workers_compute_a_fused_stage() {
    let server = server(ServerOptions::loopback());
    let addr = server.local_addr();
    let session = RemoteSession::open(addr).unwrap();

    let pool = Registry::new().create_pool("window+sum").unwrap();
    let handle = pool.handle();
    for _ in 0..2 {
        let worker = RemoteCoupling::connect(addr, session.key(), "window+sum", PATIENCE).unwrap();
        handle.add_worker(Box::new(worker)).unwrap();
    }

    let sums = run_window_sum(
        pool,
        &Properties::new().with("count", 32usize).with("segment", 16usize),
        2,
    );
    assert_eq!(sums, vec![vec![28.0, 60.0, 92.0], vec![156.0, 188.0, 220.0]]);

    let stats = handle.stats();
    assert_eq!(stats.workers.len(), 2);
    assert!(stats.workers.iter().all(|w| w.name.starts_with("remote:") && !w.lost));
    assert_eq!(stats.workers.iter().map(|w| w.chunks).sum::<u64>(), 6);
}

#[test]
fn unreachable_worker_is_retired_and_the_rest_carry_on() {
    let mut doomed = server(ServerOptions::loopback());
    let key = RemoteSession::open(doomed.local_addr()).unwrap().key();
    let worker = RemoteCoupling::connect(doomed.local_addr(), key, "window+sum", Duration::from_secs(1)).unwrap();
    doomed.shutdown();

    let pool = Registry::new().create_pool("window+sum").unwrap();
    let handle = pool.handle();
    handle.add_worker(Box::new(worker)).unwrap();
    handle.add_local(1).unwrap();

    let sums = run_window_sum(pool, &Properties::new().with("count", 16usize), 1);
    assert_eq!(sums, vec![vec![28.0, 60.0, 92.0]]);
    let stats = handle.stats();
    assert_eq!(stats.workers.len(), 1);
    assert!(stats.workers[0].name.starts_with("local:"));
}

#[test]
fn session_commands_build_and_run_a_graph() {
    let server = server(ServerOptions::loopback());
    let addr = server.local_addr();
    let mut session = RemoteSession::open(addr).unwrap();
    assert!(session.key() >= sluice_remote::FIRST_KEY);

    let types = session.types().unwrap();
    assert!(types.iter().any(|t| t == "magnitude"));
    assert_eq!(RemoteSession::types_at(addr).unwrap(), types);

    session.create("ramp", "src").unwrap();
    session.create("window+sum", "ws").unwrap();
    session.create("discard", "out").unwrap();
    refused(session.create("ramp", "src"), "duplicate");
    refused(session.create("bogus", "b"), "unknown type");

    session.init("src", &Properties::new().with("count", 256usize)).unwrap();
    session
        .init("ws", &Properties::new().with("size", 8usize).with("hop", 4usize))
        .unwrap();
    session.init("out", &Properties::new()).unwrap();
    refused(session.init("ws", &Properties::new().with("size", 0usize)), "size");
    session
        .init("ws", &Properties::new().with("size", 8usize).with("hop", 4usize))
        .unwrap();

    session.add_workers("ws", 1).unwrap();
    refused(session.add_workers("src", 1), "not a worker pool");
    // A second session on the same server serves one more worker.
    let lender = RemoteSession::open(addr).unwrap();
    session
        .add_remote_workers("ws", "127.0.0.1", addr.port(), lender.key(), 1)
        .unwrap();

    session.connect("src", 0, "ws", 0).unwrap();
    session.connect("ws", 0, "out", 0).unwrap();
    refused(session.connect("src", 0, "nowhere", 0), "no node");

    session.go(true).unwrap();
    session.wait_until_going().unwrap();
    session.stop().unwrap();
    session.stop().unwrap();
    session.reset().unwrap();

    session.disconnect("out", 0).unwrap();
    session.remove("out").unwrap();
    refused(session.remove("out"), "no node");
    refused(session.add_workers("ws", 1), "fixed");

    // A second client sees the same session.
    let mut peer = RemoteSession::attach(addr, session.key()).unwrap();
    peer.create("discard", "out").unwrap();
    refused(session.create("discard", "out"), "duplicate");
    peer.close().unwrap();
}

#[test]
fn failed_start_is_reported_to_the_client() {
    let server = server(ServerOptions::loopback());
    let mut session = RemoteSession::open(server.local_addr()).unwrap();
    session.create("collector", "sink").unwrap();
    session.init("sink", &Properties::new()).unwrap();
    refused(session.go(true), "not connected");
}

#[test]
fn unknown_session_keys_are_refused() {
    let server = server(ServerOptions::loopback());
    let addr = server.local_addr();
    assert!(matches!(
        RemoteSession::attach(addr, 7),
        Err(RemoteError::Refused(msg)) if msg.contains("unknown session")
    ));
    assert!(matches!(
        RemoteCoupling::connect(addr, 7, "sum", PATIENCE),
        Err(RemoteError::Refused(_))
    ));
    let key = RemoteSession::open(addr).unwrap().key();
    assert!(matches!(
        RemoteCoupling::connect(addr, key, "ramp", PATIENCE),
        Err(RemoteError::Refused(msg)) if msg.contains("unknown stage")
    ));
}

#[test]
fn reaper_deletes_quiet_sessions_and_spares_live_ones() {
    let server = server(ServerOptions {
        sweep_interval: Duration::from_millis(100),
        ..ServerOptions::loopback()
    });
    let addr = server.local_addr();
    let mut quiet = RemoteSession::open(addr).unwrap();
    quiet.set_timeout(Some(PATIENCE)).unwrap();
    quiet.create("ramp", "src").unwrap();
    let mut live = RemoteSession::open(addr).unwrap();

    let until = Instant::now() + Duration::from_millis(600);
    while Instant::now() < until {
        live.keep_alive().unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    assert_eq!(server.sessions(), vec![live.key()]);
    assert!(quiet.keep_alive().is_err());
    assert!(RemoteSession::attach(addr, quiet.key()).is_err());
}

#[test]
fn background_keep_alive_spares_a_session_until_dropped() {
    let server = server(ServerOptions {
        sweep_interval: Duration::from_millis(100),
        ..ServerOptions::loopback()
    });
    let addr = server.local_addr();
    let session = RemoteSession::open(addr).unwrap();
    let pinger = session.keep_alive_every(Duration::from_millis(20)).unwrap();

    thread::sleep(Duration::from_millis(600));
    assert!(pinger.is_running());
    assert_eq!(server.sessions(), vec![session.key()]);

    drop(pinger);
    let until = Instant::now() + PATIENCE;
    while !server.sessions().is_empty() {
        assert!(Instant::now() < until, "session was never reaped");
        thread::sleep(Duration::from_millis(20));
    }
}
