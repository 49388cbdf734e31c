#![no_main]

use abcscope::{
    analysis::ControlFlowGraph,
    assembly::{decode, registry, simulate_stack, StackConfig},
    disassembler::{Disassembler, DisasmOptions, NoConstantPool},
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let result = decode(data, registry());
    let cfg = ControlFlowGraph::build(&result.instructions);
    let _ = simulate_stack(&result.instructions, &cfg, StackConfig::default());
    let _ = cfg.to_dot(None);
    let _ = Disassembler::new(&NoConstantPool, DisasmOptions::default())
        .listing(&result.instructions, data);
});
