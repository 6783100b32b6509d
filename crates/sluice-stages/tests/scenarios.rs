//! End-to-end graphs built from the shipped stages and processors.

use std::sync::Arc;
use std::time::Duration;

use sluice_core::{
    Combination, ErrorKind, Group, Node, PoolOptions, Processor, Properties, SignalType, StageFactory,
    StatelessStage, WorkerPool,
};
use sluice_stages::{Collector, CollectorHandle, Framer, Magnitude, Ramp, Sine, Sum};

const PATIENCE: Duration = Duration::from_secs(10);

fn node(name: &str, processor: Box<dyn Processor>, props: &Properties) -> Node {
    let node = Node::new(name, processor);
    node.configure(props).unwrap();
    node
}

fn pool(factory: StageFactory, workers: usize) -> WorkerPool {
    let pool = WorkerPool::new(factory, PoolOptions::default());
    pool.handle().add_local(workers).unwrap();
    pool
}

fn collector(props: &Properties) -> (Node, CollectorHandle) {
    let c = Collector::new();
    let handle = c.handle();
    (node("collect", Box::new(c), props), handle)
}

fn run(nodes: Vec<Node>) -> Group {
    let mut group = Group::new();
    group.set_default_words(4096);
    for n in nodes {
        group.add(n).unwrap();
    }
    group.go(true).unwrap();
    group
}

#[test]
fn window_then_sum_emits_three_sums() {
    let ramp = node("ramp", Box::new(Ramp::new()), &Properties::new().with("count", 16usize));
    let window = node(
        "window",
        Box::new(pool(Arc::new(|| Box::new(Framer::default()) as Box<dyn StatelessStage>), 0)),
        &Properties::new().with("size", 8usize).with("hop", 4usize),
    );
    let sum = node(
        "sum",
        Box::new(pool(Arc::new(|| Box::new(Sum::new()) as Box<dyn StatelessStage>), 0)),
        &Properties::new(),
    );
    let (sink, seen) = collector(&Properties::new());
    ramp.output(0).connect(&window.input(0)).unwrap();
    window.output(0).connect(&sum.input(0)).unwrap();
    sum.output(0).connect(&sink.input(0)).unwrap();

    let group = run(vec![ramp, window, sum, sink]);
    assert!(seen.wait_for_plungers(1, PATIENCE));
    group.stop();

    assert_eq!(seen.words(0), vec![28.0, 60.0, 92.0]);
    assert_eq!(seen.types(), vec![SignalType::Value { rate: 12_000.0 }]);
    assert_eq!(seen.plungers(), 1);
}

#[test]
fn fused_stage_on_workers_keeps_segments_apart() {
    let fused: StageFactory = Arc::new(|| {
        Box::new(Combination::new(Box::new(Framer::default()), Box::new(Sum::new()))) as Box<dyn StatelessStage>
    });
    let ramp = node(
        "ramp",
        Box::new(Ramp::new()),
        &Properties::new()
            .with("count", 32usize)
            .with("segment", 16usize)
            .with("block", 5usize),
    );
    let window_sum = node(
        "window+sum",
        Box::new(pool(fused, 2)),
        &Properties::new().with("size", 8usize).with("hop", 4usize),
    );
    let (sink, seen) = collector(&Properties::new());
    ramp.output(0).connect(&window_sum.input(0)).unwrap();
    window_sum.output(0).connect(&sink.input(0)).unwrap();

    let group = run(vec![ramp, window_sum, sink]);
    assert!(seen.wait_for_plungers(2, PATIENCE));
    group.stop();

    assert_eq!(
        seen.segments(0),
        vec![vec![28.0, 60.0, 92.0], vec![156.0, 188.0, 220.0]]
    );
}

#[test]
fn magnitude_on_workers_finds_the_tone() {
    let sine = node(
        "sine",
        Box::new(Sine::new()),
        &Properties::new()
            .with("frequency", 1000.0)
            .with("rate", 8000.0)
            .with("count", 1024usize),
    );
    let spectra = node(
        "magnitude",
        Box::new(pool(Arc::new(|| Box::new(Magnitude::default()) as Box<dyn StatelessStage>), 3)),
        &Properties::new().with("size", 64usize).with("hop", 32usize),
    );
    let (sink, seen) = collector(&Properties::new());
    sine.output(0).connect(&spectra.input(0)).unwrap();
    spectra.output(0).connect(&sink.input(0)).unwrap();

    let group = run(vec![sine, spectra, sink]);
    assert!(seen.wait_for_plungers(1, PATIENCE));
    group.stop();

    let words = seen.words(0);
    assert_eq!(words.len(), 31 * 33);
    for frame in words.chunks(33) {
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(8));
    }
}

#[test]
fn deferred_collector_takes_its_count_from_a_peer() {
    let (sink, seen) = collector(&Properties::new().with("inputs", 0usize));
    assert_eq!(sink.input_count(), None);
    let a = node("a", Box::new(Ramp::new()), &Properties::new().with("count", 4usize));
    a.connect_all(&sink).unwrap();
    assert_eq!(sink.input_count(), Some(1));

    let group = run(vec![a, sink]);
    assert!(seen.wait_for_plungers(1, PATIENCE));
    group.stop();
    assert_eq!(seen.words(0), vec![0.0, 1.0, 2.0, 3.0]);
}

#[test]
fn fan_in_relays_one_plunger_per_aligned_segment() {
    let (sink, seen) = collector(&Properties::new().with("inputs", 0usize));
    sink.resolve_multiplicity(2).unwrap();
    let a = node("a", Box::new(Ramp::new()), &Properties::new().with("count", 6usize));
    let b = node(
        "b",
        Box::new(Ramp::new()),
        &Properties::new().with("count", 3usize).with("start", 100.0),
    );
    a.output(0).connect(&sink.input(0)).unwrap();
    b.output(0).connect(&sink.input(1)).unwrap();

    let group = run(vec![a, b, sink]);
    assert!(seen.wait_for_plungers(1, PATIENCE));
    group.stop();

    assert_eq!(seen.words(0), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(seen.words(1), vec![100.0, 101.0, 102.0]);
    assert_eq!(seen.plungers(), 1);
}

#[test]
fn mismatched_fan_in_fails_to_start() {
    let (sink, _seen) = collector(&Properties::new().with("inputs", 2usize));
    let a = node("a", Box::new(Ramp::new()), &Properties::new());
    let b = node("b", Box::new(Ramp::new()), &Properties::new().with("rate", 22_050.0));
    a.output(0).connect(&sink.input(0)).unwrap();
    b.output(0).connect(&sink.input(1)).unwrap();

    let mut group = Group::new();
    group.add(a).unwrap();
    group.add(b).unwrap();
    group.add(sink).unwrap();
    let err = group.go(true).unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].node, "collect");
    assert_eq!(err.failures[0].kind, ErrorKind::InputsNotHomogeneous(1));
}
