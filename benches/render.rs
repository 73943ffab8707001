//! Rendering Benchmarks
//!
//! Run with: cargo bench --bench render

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::{json, Value};
use taskforge::descriptor::{classify, Descriptor, Schema};
use taskforge::generator::render;

fn descriptor_with_inputs(count: usize) -> Descriptor {
    let inputs: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "id": format!("param_{}", i),
                "name": format!("Parameter {}", i),
                "type": if i % 2 == 0 { "File" } else { "Number" },
                "optional": i % 3 == 0,
                "value-key": format!("[P{}]", i),
                "description": "Benchmark parameter <with> markup & entities"
            })
        })
        .collect();

    Descriptor::from_value(json!({
        "name": "bench_tool",
        "tool-version": "1.0.0",
        "description": "Synthetic descriptor",
        "command-line": "bench_tool [P0] [P1]",
        "docker-image": "example/bench:1.0.0",
        "inputs": inputs,
        "output-files": [
            { "id": "out", "name": "Output", "path-template": "[P0].out" }
        ]
    }))
    .unwrap()
}

fn benchmark_render(c: &mut Criterion) {
    let schema = Schema::builtin().unwrap();

    let mut group = c.benchmark_group("render");
    for count in [1usize, 10, 100].iter() {
        let descriptor = descriptor_with_inputs(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(format!("{}_inputs", count), &descriptor, |b, d| {
            b.iter(|| render(black_box(&schema), black_box(d)).unwrap());
        });
    }
    group.finish();
}

fn benchmark_validate(c: &mut Criterion) {
    let schema = Schema::builtin().unwrap();
    let descriptor = descriptor_with_inputs(50);

    c.bench_function("validate_50_inputs", |b| {
        b.iter(|| schema.validate(black_box(&descriptor)));
    });
}

fn benchmark_classify(c: &mut Criterion) {
    c.bench_function("classify", |b| {
        b.iter(|| classify(black_box("my-tool_name 2d (beta) v3")));
    });
}

criterion_group!(benches, benchmark_render, benchmark_validate, benchmark_classify);
criterion_main!(benches);
