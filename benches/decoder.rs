//! Benchmarks for method body decoding and analysis.
//!
//! Covers the hot paths of a disassembler run:
//! - Decoding a short constructor body
//! - Decoding a long synthetic body with branches and calls
//! - Decoding many bodies in parallel
//! - Building the control flow graph
//! - Stack simulation
//! - Rendering a listing

extern crate abcscope;

use abcscope::{
    analysis::ControlFlowGraph,
    assembly::{decode, decode_all, registry, simulate_stack, StackConfig},
    disassembler::{Disassembler, DisasmOptions, NoConstantPool},
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

/// getlocal_0, pushscope, getlocal_0, constructsuper (0), returnvoid
const CONSTRUCTOR: [u8; 6] = [0xD0, 0x30, 0xD0, 0x49, 0x00, 0x47];

/// A guarded call, 22 bytes:
/// label, getlocal_1, pushbyte 10, iflt +12, findpropstrict #3, getlocal_1,
/// callpropvoid #3 (1), inclocal_i 1, jump +0, nop, nop
const LOOP_BLOCK: [u8; 22] = [
    0x09, 0xD1, 0x24, 0x0A, 0x15, 0x0C, 0x00, 0x00, 0x5D, 0x03, 0xD1, 0x4F, 0x03, 0x01, 0xC2,
    0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x02,
];

/// Builds a long method body by repeating the loop block and terminating it.
fn long_body(blocks: usize) -> Vec<u8> {
    let mut code = Vec::with_capacity(blocks * LOOP_BLOCK.len() + 1);
    for _ in 0..blocks {
        code.extend_from_slice(&LOOP_BLOCK);
    }
    code.push(0x47);
    code
}

fn bench_decode_constructor(c: &mut Criterion) {
    let registry = registry();

    c.bench_function("decode_constructor", |b| {
        b.iter(|| {
            let result = decode(black_box(&CONSTRUCTOR), registry);
            black_box(result)
        });
    });
}

fn bench_decode_long_body(c: &mut Criterion) {
    let registry = registry();
    let code = long_body(1_000);

    c.bench_function("decode_long_body", |b| {
        b.iter(|| {
            let result = decode(black_box(&code), registry);
            black_box(result)
        });
    });
}

fn bench_decode_all(c: &mut Criterion) {
    let registry = registry();
    let bodies: Vec<Vec<u8>> = (1..=512).map(|n| long_body(n % 32 + 1)).collect();

    c.bench_function("decode_all_512_bodies", |b| {
        b.iter(|| {
            let results = decode_all(black_box(&bodies), registry);
            black_box(results)
        });
    });
}

fn bench_cfg_build(c: &mut Criterion) {
    let code = long_body(1_000);
    let instructions = decode(&code, registry()).into_result().unwrap();

    c.bench_function("cfg_build_long_body", |b| {
        b.iter(|| {
            let cfg = ControlFlowGraph::build(black_box(&instructions));
            black_box(cfg)
        });
    });
}

fn bench_stack_simulation(c: &mut Criterion) {
    let code = long_body(1_000);
    let instructions = decode(&code, registry()).into_result().unwrap();
    let cfg = ControlFlowGraph::build(&instructions);

    c.bench_function("stack_simulation_long_body", |b| {
        b.iter(|| {
            let report =
                simulate_stack(black_box(&instructions), &cfg, StackConfig::default()).unwrap();
            black_box(report)
        });
    });
}

fn bench_listing(c: &mut Criterion) {
    let code = long_body(100);
    let instructions = decode(&code, registry()).into_result().unwrap();
    let disassembler = Disassembler::new(&NoConstantPool, DisasmOptions::default());

    c.bench_function("listing_long_body", |b| {
        b.iter(|| {
            let listing = disassembler.listing(black_box(&instructions), &code);
            black_box(listing)
        });
    });
}

criterion_group!(
    benches,
    bench_decode_constructor,
    bench_decode_long_body,
    bench_decode_all,
    bench_cfg_build,
    bench_stack_simulation,
    bench_listing,
);
criterion_main!(benches);
