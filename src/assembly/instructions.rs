//! The AVM2 instruction set.
//!
//! Every opcode is declared as data and registered in a single pass by [`register_all`].
//! Opcodes without operands share a few uniform shapes and are listed in tables; opcodes with
//! operands are spelled out individually.
//!
//! Stack effects follow the AVM2 overview. Runtime multiname components (namespace or name
//! taken from the stack) depend on the constant pool and are not counted.

use crate::{
    assembly::{
        opcodes::*,
        spec::{FlowType, OpcodeCategory, OpcodeSpec, CASE_OFFSETS, DEFAULT_OFFSET, JUMP_OFFSET},
        Instruction, OpcodeRegistry,
    },
    disassembler::{render_value, ConstantPool},
    reader::{ConstantKind, FieldKind},
    Result,
};

use OpcodeCategory::{
    Arithmetic, BitOperation, Comparison, ControlTransfer, Debug, Exception, FunctionInvocation,
    LocalVariable, Memory, Misc, ObjectManipulation, PushConstant, ScopeManagement,
    StackManagement, TypeCheck, TypeConversion,
};

const MULTINAME: FieldKind = FieldKind::ConstRef(ConstantKind::Multiname);
const STRING: FieldKind = FieldKind::ConstRef(ConstantKind::String);
const METHOD: FieldKind = FieldKind::ConstRef(ConstantKind::Method);

/// Operand-free opcodes: (opcode, mnemonic, category, pops, pushes).
#[rustfmt::skip]
const PLAIN: &[(u8, &str, OpcodeCategory, u32, u32)] = &[
    (BKPT, "bkpt", Debug, 0, 0),
    (TIMESTAMP, "timestamp", Debug, 0, 0),
    (NOP, "nop", Misc, 0, 0),
    (DXNSLATE, "dxnslate", Misc, 1, 0),
    (LABEL, "label", ControlTransfer, 0, 0),
    (PUSHWITH, "pushwith", ScopeManagement, 1, 0),
    (POPSCOPE, "popscope", ScopeManagement, 0, 0),
    (NEXTNAME, "nextname", ScopeManagement, 2, 1),
    (HASNEXT, "hasnext", ScopeManagement, 2, 1),
    (NEXTVALUE, "nextvalue", ScopeManagement, 2, 1),
    (PUSHSCOPE, "pushscope", ScopeManagement, 1, 0),
    (GETGLOBALSCOPE, "getglobalscope", ScopeManagement, 0, 1),
    (PUSHNULL, "pushnull", PushConstant, 0, 1),
    (PUSHUNDEFINED, "pushundefined", PushConstant, 0, 1),
    (PUSHTRUE, "pushtrue", PushConstant, 0, 1),
    (PUSHFALSE, "pushfalse", PushConstant, 0, 1),
    (PUSHNAN, "pushnan", PushConstant, 0, 1),
    (POP, "pop", StackManagement, 1, 0),
    (DUP, "dup", StackManagement, 1, 2),
    (SWAP, "swap", StackManagement, 2, 2),
    (LI8, "li8", Memory, 1, 1),
    (LI16, "li16", Memory, 1, 1),
    (LI32, "li32", Memory, 1, 1),
    (LF32, "lf32", Memory, 1, 1),
    (LF64, "lf64", Memory, 1, 1),
    (SI8, "si8", Memory, 2, 0),
    (SI16, "si16", Memory, 2, 0),
    (SI32, "si32", Memory, 2, 0),
    (SF32, "sf32", Memory, 2, 0),
    (SF64, "sf64", Memory, 2, 0),
    (SXI1, "sxi1", TypeConversion, 1, 1),
    (SXI8, "sxi8", TypeConversion, 1, 1),
    (SXI16, "sxi16", TypeConversion, 1, 1),
    (NEWACTIVATION, "newactivation", ObjectManipulation, 0, 1),
    (CONVERT_S, "convert_s", TypeConversion, 1, 1),
    (ESC_XELEM, "esc_xelem", TypeConversion, 1, 1),
    (ESC_XATTR, "esc_xattr", TypeConversion, 1, 1),
    (CONVERT_I, "convert_i", TypeConversion, 1, 1),
    (CONVERT_U, "convert_u", TypeConversion, 1, 1),
    (CONVERT_D, "convert_d", TypeConversion, 1, 1),
    (CONVERT_B, "convert_b", TypeConversion, 1, 1),
    (CONVERT_O, "convert_o", TypeConversion, 1, 1),
    (CHECKFILTER, "checkfilter", TypeCheck, 1, 1),
    (COERCE_B, "coerce_b", TypeConversion, 1, 1),
    (COERCE_A, "coerce_a", TypeConversion, 1, 1),
    (COERCE_I, "coerce_i", TypeConversion, 1, 1),
    (COERCE_D, "coerce_d", TypeConversion, 1, 1),
    (COERCE_S, "coerce_s", TypeConversion, 1, 1),
    (ASTYPELATE, "astypelate", TypeCheck, 2, 1),
    (COERCE_U, "coerce_u", TypeConversion, 1, 1),
    (COERCE_O, "coerce_o", TypeConversion, 1, 1),
    (NEGATE, "negate", Arithmetic, 1, 1),
    (INCREMENT, "increment", Arithmetic, 1, 1),
    (DECREMENT, "decrement", Arithmetic, 1, 1),
    (TYPEOF, "typeof", TypeCheck, 1, 1),
    (NOT, "not", BitOperation, 1, 1),
    (BITNOT, "bitnot", BitOperation, 1, 1),
    (ADD, "add", Arithmetic, 2, 1),
    (SUBTRACT, "subtract", Arithmetic, 2, 1),
    (MULTIPLY, "multiply", Arithmetic, 2, 1),
    (DIVIDE, "divide", Arithmetic, 2, 1),
    (MODULO, "modulo", Arithmetic, 2, 1),
    (LSHIFT, "lshift", BitOperation, 2, 1),
    (RSHIFT, "rshift", BitOperation, 2, 1),
    (URSHIFT, "urshift", BitOperation, 2, 1),
    (BITAND, "bitand", BitOperation, 2, 1),
    (BITOR, "bitor", BitOperation, 2, 1),
    (BITXOR, "bitxor", BitOperation, 2, 1),
    (EQUALS, "equals", Comparison, 2, 1),
    (STRICTEQUALS, "strictequals", Comparison, 2, 1),
    (LESSTHAN, "lessthan", Comparison, 2, 1),
    (LESSEQUALS, "lessequals", Comparison, 2, 1),
    (GREATERTHAN, "greaterthan", Comparison, 2, 1),
    (GREATEREQUALS, "greaterequals", Comparison, 2, 1),
    (INSTANCEOF, "instanceof", TypeCheck, 2, 1),
    (ISTYPELATE, "istypelate", TypeCheck, 2, 1),
    (IN, "in", TypeCheck, 2, 1),
    (INCREMENT_I, "increment_i", Arithmetic, 1, 1),
    (DECREMENT_I, "decrement_i", Arithmetic, 1, 1),
    (NEGATE_I, "negate_i", Arithmetic, 1, 1),
    (ADD_I, "add_i", Arithmetic, 2, 1),
    (SUBTRACT_I, "subtract_i", Arithmetic, 2, 1),
    (MULTIPLY_I, "multiply_i", Arithmetic, 2, 1),
    (GETLOCAL_0, "getlocal_0", LocalVariable, 0, 1),
    (GETLOCAL_1, "getlocal_1", LocalVariable, 0, 1),
    (GETLOCAL_2, "getlocal_2", LocalVariable, 0, 1),
    (GETLOCAL_3, "getlocal_3", LocalVariable, 0, 1),
    (SETLOCAL_0, "setlocal_0", LocalVariable, 1, 0),
    (SETLOCAL_1, "setlocal_1", LocalVariable, 1, 0),
    (SETLOCAL_2, "setlocal_2", LocalVariable, 1, 0),
    (SETLOCAL_3, "setlocal_3", LocalVariable, 1, 0),
];

/// Conditional branches: (opcode, mnemonic, pops).
#[rustfmt::skip]
const CONDITIONAL: &[(u8, &str, u32)] = &[
    (IFNLT, "ifnlt", 2),
    (IFNLE, "ifnle", 2),
    (IFNGT, "ifngt", 2),
    (IFNGE, "ifnge", 2),
    (IFTRUE, "iftrue", 1),
    (IFFALSE, "iffalse", 1),
    (IFEQ, "ifeq", 2),
    (IFNE, "ifne", 2),
    (IFLT, "iflt", 2),
    (IFLE, "ifle", 2),
    (IFGT, "ifgt", 2),
    (IFGE, "ifge", 2),
    (IFSTRICTEQ, "ifstricteq", 2),
    (IFSTRICTNE, "ifstrictne", 2),
];

/// Opcodes with a single multiname operand: (opcode, mnemonic, category, operand, pops, pushes).
#[rustfmt::skip]
const NAMED: &[(u8, &str, OpcodeCategory, &str, u32, u32)] = &[
    (GETSUPER, "getsuper", ObjectManipulation, "property", 1, 1),
    (SETSUPER, "setsuper", ObjectManipulation, "property", 2, 0),
    (GETDESCENDANTS, "getdescendants", ObjectManipulation, "property", 1, 1),
    (FINDPROPSTRICT, "findpropstrict", ObjectManipulation, "property", 0, 1),
    (FINDPROPERTY, "findproperty", ObjectManipulation, "property", 0, 1),
    (FINDDEF, "finddef", ObjectManipulation, "property", 0, 1),
    (GETLEX, "getlex", ObjectManipulation, "property", 0, 1),
    (SETPROPERTY, "setproperty", ObjectManipulation, "property", 2, 0),
    (GETPROPERTY, "getproperty", ObjectManipulation, "property", 1, 1),
    (INITPROPERTY, "initproperty", ObjectManipulation, "property", 2, 0),
    (DELETEPROPERTY, "deleteproperty", ObjectManipulation, "property", 1, 1),
    (COERCE, "coerce", TypeConversion, "type", 1, 1),
    (ASTYPE, "astype", TypeCheck, "type", 1, 1),
    (ISTYPE, "istype", TypeCheck, "type", 1, 1),
];

/// Opcodes with a single `u30` register, slot or scope operand:
/// (opcode, mnemonic, category, operand, pops, pushes).
#[rustfmt::skip]
const INDEXED: &[(u8, &str, OpcodeCategory, &str, u32, u32)] = &[
    (KILL, "kill", LocalVariable, "register", 0, 0),
    (GETLOCAL, "getlocal", LocalVariable, "register", 0, 1),
    (SETLOCAL, "setlocal", LocalVariable, "register", 1, 0),
    (INCLOCAL, "inclocal", LocalVariable, "register", 0, 0),
    (DECLOCAL, "declocal", LocalVariable, "register", 0, 0),
    (INCLOCAL_I, "inclocal_i", LocalVariable, "register", 0, 0),
    (DECLOCAL_I, "declocal_i", LocalVariable, "register", 0, 0),
    (GETSLOT, "getslot", ObjectManipulation, "slot_index", 1, 1),
    (SETSLOT, "setslot", ObjectManipulation, "slot_index", 2, 0),
    (GETGLOBALSLOT, "getglobalslot", ObjectManipulation, "slot_index", 0, 1),
    (SETGLOBALSLOT, "setglobalslot", ObjectManipulation, "slot_index", 1, 0),
    (GETOUTERSCOPE, "getouterscope", ScopeManagement, "index", 0, 1),
];

/// Invocations of a named or indexed target with an argument count:
/// (opcode, mnemonic, target operand, target kind, pushes).
///
/// All of them consume the receiver plus one value per argument.
#[rustfmt::skip]
const INVOKE: &[(u8, &str, &str, FieldKind, u32)] = &[
    (CALLMETHOD, "callmethod", "method_index", FieldKind::U30, 1),
    (CALLSTATIC, "callstatic", "method", METHOD, 1),
    (CALLSUPER, "callsuper", "property", MULTINAME, 1),
    (CALLPROPERTY, "callproperty", "property", MULTINAME, 1),
    (CONSTRUCTPROP, "constructprop", "property", MULTINAME, 1),
    (CALLPROPLEX, "callproplex", "property", MULTINAME, 1),
    (CALLSUPERVOID, "callsupervoid", "property", MULTINAME, 0),
    (CALLPROPVOID, "callpropvoid", "property", MULTINAME, 0),
];

/// Renders an invocation as its target followed by the argument count in parentheses,
/// e.g. `multiname#3 (2)`.
fn invocation_parameters(instruction: &Instruction<'_>, pool: &dyn ConstantPool) -> String {
    let target = instruction
        .fields
        .iter()
        .filter(|(name, _)| *name != "arg_count")
        .map(|(_, value)| render_value(value, pool))
        .collect::<Vec<_>>()
        .join(", ");

    match instruction.field("arg_count").and_then(|value| value.as_u32()) {
        Some(count) if target.is_empty() => format!("({count})"),
        Some(count) => format!("{target} ({count})"),
        None => target,
    }
}

/// Renders `debug` as `name register=<n>` with the kind and extra operand appended.
fn debug_parameters(instruction: &Instruction<'_>, pool: &dyn ConstantPool) -> String {
    let value = |name: &str| {
        instruction
            .field(name)
            .map(|value| render_value(value, pool))
            .unwrap_or_default()
    };

    format!(
        "{} register={} type={} extra={}",
        value("name"),
        value("register"),
        value("debug_type"),
        value("extra")
    )
}

/// Registers the complete AVM2 instruction set.
///
/// # Errors
/// Returns the first error reported by [`OpcodeRegistry::register`].
pub(crate) fn register_all(registry: &mut OpcodeRegistry) -> Result<()> {
    for &(opcode, mnemonic, category, pops, pushes) in PLAIN {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, category)
                .consume(pops)
                .produce(pushes),
        )?;
    }

    for &(opcode, mnemonic, pops) in CONDITIONAL {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, ControlTransfer)
                .conditional()
                .consume(pops),
        )?;
    }

    for &(opcode, mnemonic, category, operand, pops, pushes) in NAMED {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, category)
                .field(operand, MULTINAME)
                .consume(pops)
                .produce(pushes),
        )?;
    }

    for &(opcode, mnemonic, category, operand, pops, pushes) in INDEXED {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, category)
                .field(operand, FieldKind::U30)
                .consume(pops)
                .produce(pushes),
        )?;
    }

    for &(opcode, mnemonic, target, kind, pushes) in INVOKE {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, FunctionInvocation)
                .field(target, kind)
                .field("arg_count", FieldKind::U30)
                .consume_derived("arg_count", 1, 1)
                .produce(pushes)
                .flow(FlowType::Call)
                .formatter(invocation_parameters),
        )?;
    }

    register_control_transfer(registry)?;
    register_invocation(registry)?;
    register_constants(registry)?;
    register_objects(registry)?;
    register_debug(registry)?;

    Ok(())
}

fn register_control_transfer(registry: &mut OpcodeRegistry) -> Result<()> {
    registry.register(
        OpcodeSpec::new(JUMP, "jump", ControlTransfer)
            .field(JUMP_OFFSET, FieldKind::S24)
            .flow(FlowType::UnconditionalBranch),
    )?;

    registry.register(
        OpcodeSpec::new(LOOKUPSWITCH, "lookupswitch", ControlTransfer)
            .field(DEFAULT_OFFSET, FieldKind::S24)
            .field(CASE_OFFSETS, FieldKind::CaseOffsets)
            .consume(1)
            .flow(FlowType::Switch),
    )?;

    registry.register(
        OpcodeSpec::new(RETURNVOID, "returnvoid", FunctionInvocation).flow(FlowType::Return),
    )?;
    registry.register(
        OpcodeSpec::new(RETURNVALUE, "returnvalue", FunctionInvocation)
            .consume(1)
            .flow(FlowType::Return),
    )?;
    registry.register(
        OpcodeSpec::new(THROW, "throw", Exception)
            .consume(1)
            .flow(FlowType::Throw),
    )?;

    Ok(())
}

fn register_invocation(registry: &mut OpcodeRegistry) -> Result<()> {
    registry.register(
        OpcodeSpec::new(NEWFUNCTION, "newfunction", FunctionInvocation)
            .field("method", METHOD)
            .produce(1),
    )?;

    // function, receiver, arguments
    registry.register(
        OpcodeSpec::new(CALL, "call", FunctionInvocation)
            .field("arg_count", FieldKind::U30)
            .consume_derived("arg_count", 2, 1)
            .produce(1)
            .flow(FlowType::Call)
            .formatter(invocation_parameters),
    )?;

    for (opcode, mnemonic, pushes) in [
        (CONSTRUCT, "construct", 1),
        (CONSTRUCTSUPER, "constructsuper", 0),
        (APPLYTYPE, "applytype", 1),
    ] {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, FunctionInvocation)
                .field("arg_count", FieldKind::U30)
                .consume_derived("arg_count", 1, 1)
                .produce(pushes)
                .flow(FlowType::Call)
                .formatter(invocation_parameters),
        )?;
    }

    Ok(())
}

fn register_constants(registry: &mut OpcodeRegistry) -> Result<()> {
    for (opcode, mnemonic, kind) in [
        (PUSHBYTE, "pushbyte", FieldKind::Byte),
        (PUSHSHORT, "pushshort", FieldKind::U30),
        (PUSHSTRING, "pushstring", STRING),
        (PUSHINT, "pushint", FieldKind::ConstRef(ConstantKind::Int)),
        (PUSHUINT, "pushuint", FieldKind::ConstRef(ConstantKind::UInt)),
        (PUSHDOUBLE, "pushdouble", FieldKind::ConstRef(ConstantKind::Double)),
        (
            PUSHNAMESPACE,
            "pushnamespace",
            FieldKind::ConstRef(ConstantKind::Namespace),
        ),
    ] {
        registry.register(
            OpcodeSpec::new(opcode, mnemonic, PushConstant)
                .field("value", kind)
                .produce(1),
        )?;
    }

    Ok(())
}

fn register_objects(registry: &mut OpcodeRegistry) -> Result<()> {
    registry.register(OpcodeSpec::new(DXNS, "dxns", Misc).field("uri", STRING))?;

    registry.register(
        OpcodeSpec::new(HASNEXT2, "hasnext2", ScopeManagement)
            .field("object_register", FieldKind::U30)
            .field("index_register", FieldKind::U30)
            .produce(1),
    )?;

    registry.register(
        OpcodeSpec::new(GETSCOPEOBJECT, "getscopeobject", ScopeManagement)
            .field("index", FieldKind::UByte)
            .produce(1),
    )?;

    // name/value pairs
    registry.register(
        OpcodeSpec::new(NEWOBJECT, "newobject", ObjectManipulation)
            .field("arg_count", FieldKind::U30)
            .consume_derived("arg_count", 0, 2)
            .produce(1),
    )?;
    registry.register(
        OpcodeSpec::new(NEWARRAY, "newarray", ObjectManipulation)
            .field("arg_count", FieldKind::U30)
            .consume_derived("arg_count", 0, 1)
            .produce(1),
    )?;

    registry.register(
        OpcodeSpec::new(NEWCLASS, "newclass", ObjectManipulation)
            .field("class", FieldKind::ConstRef(ConstantKind::Class))
            .consume(1)
            .produce(1),
    )?;
    registry.register(
        OpcodeSpec::new(NEWCATCH, "newcatch", Exception)
            .field("exception", FieldKind::ConstRef(ConstantKind::Exception))
            .produce(1),
    )?;

    Ok(())
}

fn register_debug(registry: &mut OpcodeRegistry) -> Result<()> {
    registry.register(
        OpcodeSpec::new(DEBUG, "debug", Debug)
            .field("debug_type", FieldKind::UByte)
            .field("name", STRING)
            .field("register", FieldKind::UByte)
            .field("extra", FieldKind::U30)
            .formatter(debug_parameters),
    )?;
    registry.register(
        OpcodeSpec::new(DEBUGLINE, "debugline", Debug).field("line", FieldKind::U30),
    )?;
    registry.register(OpcodeSpec::new(DEBUGFILE, "debugfile", Debug).field("file", STRING))?;
    registry.register(OpcodeSpec::new(BKPTLINE, "bkptline", Debug).field("line", FieldKind::U30))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{
        assembly::{decode, opcodes, registry, StackConsume},
        reader::FieldValue,
    };

    use super::*;

    #[test]
    fn table_size() {
        let registry = registry();
        let expected = PLAIN.len()
            + CONDITIONAL.len()
            + NAMED.len()
            + INDEXED.len()
            + INVOKE.len()
            // jump, lookupswitch, returnvoid, returnvalue, throw
            + 5
            // newfunction, call, construct, constructsuper, applytype
            + 5
            // push constants with operands
            + 7
            // dxns, hasnext2, getscopeobject, newobject, newarray, newclass, newcatch
            + 7
            // debug, debugline, debugfile, bkptline
            + 4;
        assert_eq!(registry.len(), expected);
    }

    #[test]
    fn call_style_costs() {
        let registry = registry();
        let derived = |opcode| match registry.get(opcode).unwrap().consume {
            StackConsume::Derived { base, per_item, .. } => (base, per_item),
            StackConsume::Fixed(_) => panic!("fixed consume for 0x{opcode:02X}"),
        };

        assert_eq!(derived(opcodes::CALL), (2, 1));
        assert_eq!(derived(opcodes::CALLSUPERVOID), derived(opcodes::CALLPROPVOID));
        assert_eq!(derived(opcodes::CALLSUPERVOID), derived(opcodes::CALLSUPER));
        assert_eq!(derived(opcodes::CONSTRUCTSUPER), (1, 1));
        assert_eq!(derived(opcodes::NEWOBJECT), (0, 2));
        assert_eq!(derived(opcodes::NEWARRAY), (0, 1));
    }

    #[test]
    fn branches_are_control_transfer() {
        for spec in registry().iter().filter(|spec| spec.flow.is_branch()) {
            assert_eq!(spec.category, ControlTransfer, "{}", spec.mnemonic);
        }
        assert!(registry().get(opcodes::IFLE).unwrap().is_conditional());
        assert!(!registry().get(opcodes::JUMP).unwrap().is_conditional());
    }

    #[test]
    fn outer_scope_and_timestamp() {
        // getouterscope 0, timestamp, returnvoid
        let instructions = decode(&[0x67, 0x00, 0xF3, 0x47], registry())
            .into_result()
            .unwrap();

        assert_eq!(instructions.len(), 3);
        assert_eq!(instructions[0].mnemonic(), "getouterscope");
        assert_eq!(instructions[0].field("index"), Some(&FieldValue::U30(0)));
        assert_eq!(instructions[0].category(), ScopeManagement);
        assert_eq!(instructions[0].spec.consume, StackConsume::Fixed(0));
        assert_eq!(instructions[0].spec.produce, 1);
        assert_eq!(instructions[1].mnemonic(), "timestamp");
        assert_eq!(instructions[1].size, 1);
    }

    #[test]
    fn callsupervoid_layout() {
        let spec = registry().get(opcodes::CALLSUPERVOID).unwrap();
        let names: Vec<&str> = spec.fields.iter().map(|field| field.name).collect();
        assert_eq!(names, ["property", "arg_count"]);
        assert_eq!(spec.produce, 0);
        assert!(spec.formatter.is_some());
    }
}
