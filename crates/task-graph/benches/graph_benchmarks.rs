//! Benchmarks for dependency graph operations
//!
//! Run with: cargo bench -p trellis-graph

#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use trellis_graph::DependencyGraph;

/// Generate a wide graph with one blocker in front of many tasks
fn generate_wide_graph(task_count: usize) -> DependencyGraph<()> {
    let mut graph = DependencyGraph::new();
    graph.add_node("root", ());

    for i in 0..task_count {
        let id = format!("task_{i}");
        graph.add_node(&id, ());
        graph.add_edge("root", &id, ()).unwrap();
    }

    graph
}

/// Generate a deep graph with a linear blocking chain
fn generate_deep_graph(depth: usize) -> DependencyGraph<()> {
    let mut graph = DependencyGraph::new();
    graph.add_node("task_0", ());

    for i in 1..depth {
        let id = format!("task_{i}");
        graph.add_node(&id, ());
        graph
            .add_edge(&format!("task_{}", i - 1), &id, ())
            .unwrap();
    }

    graph
}

/// Generate a diamond graph (fan-out then fan-in)
fn generate_diamond_graph(width: usize, depth: usize) -> DependencyGraph<()> {
    let mut graph = DependencyGraph::new();
    graph.add_node("root", ());

    let mut prev_level: Vec<String> = vec!["root".to_string()];

    for level in 0..depth {
        let mut current_level = Vec::new();

        for w in 0..width {
            let id = format!("level_{level}_task_{w}");
            graph.add_node(&id, ());
            for prev in &prev_level {
                graph.add_edge(prev, &id, ()).unwrap();
            }
            current_level.push(id);
        }

        prev_level = current_level;
    }

    graph.add_node("final", ());
    for prev in &prev_level {
        graph.add_edge(prev, "final", ()).unwrap();
    }

    graph
}

fn benchmark_would_create_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("would_create_cycle");

    for depth in [10, 50, 100, 500] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let graph = generate_deep_graph(depth);
            let last = format!("task_{}", depth - 1);
            b.iter(|| black_box(graph.would_create_cycle(&last, "task_0")));
        });
    }

    group.finish();
}

fn benchmark_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("levels");

    for (width, depth) in [(5, 5), (10, 5), (5, 10), (10, 10)] {
        let label = format!("w{width}_d{depth}");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(width, depth),
            |b, &(width, depth)| {
                let graph = generate_diamond_graph(width, depth);
                b.iter(|| black_box(graph.levels()));
            },
        );
    }

    group.finish();
}

fn benchmark_detect_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect_cycles");

    for count in [100, 500, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let graph = generate_wide_graph(count);
            b.iter(|| black_box(graph.detect_cycles()));
        });
    }

    group.finish();
}

fn benchmark_impact_walks(c: &mut Criterion) {
    let mut group = c.benchmark_group("impact_walks");

    for (width, depth) in [(5, 5), (10, 10)] {
        let label = format!("w{width}_d{depth}");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(width, depth),
            |b, &(width, depth)| {
                let graph = generate_diamond_graph(width, depth);
                b.iter(|| {
                    black_box(graph.reachable_within("root", 50));
                    black_box(graph.longest_chain_from("root", 50));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_would_create_cycle,
    benchmark_levels,
    benchmark_detect_cycles,
    benchmark_impact_walks,
);

criterion_main!(benches);
