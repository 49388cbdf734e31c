//! AVM2 opcode byte constants.
//!
//! This module provides the raw byte values for every opcode registered by
//! [`crate::assembly::OpcodeRegistry::avm2`]. Constants are named after their mnemonic
//! (e.g. [`CALLSUPERVOID`] = `0x4E`). AVM2 has no prefix bytes; every opcode is a single byte.
#![allow(missing_docs)]

// Debug and misc
pub const BKPT: u8 = 0x01;
pub const NOP: u8 = 0x02;
pub const THROW: u8 = 0x03;

// Super access and default XML namespace
pub const GETSUPER: u8 = 0x04;
pub const SETSUPER: u8 = 0x05;
pub const DXNS: u8 = 0x06;
pub const DXNSLATE: u8 = 0x07;
pub const KILL: u8 = 0x08;
pub const LABEL: u8 = 0x09;

// Conditional and unconditional branches
pub const IFNLT: u8 = 0x0C;
pub const IFNLE: u8 = 0x0D;
pub const IFNGT: u8 = 0x0E;
pub const IFNGE: u8 = 0x0F;
pub const JUMP: u8 = 0x10;
pub const IFTRUE: u8 = 0x11;
pub const IFFALSE: u8 = 0x12;
pub const IFEQ: u8 = 0x13;
pub const IFNE: u8 = 0x14;
pub const IFLT: u8 = 0x15;
pub const IFLE: u8 = 0x16;
pub const IFGT: u8 = 0x17;
pub const IFGE: u8 = 0x18;
pub const IFSTRICTEQ: u8 = 0x19;
pub const IFSTRICTNE: u8 = 0x1A;
pub const LOOKUPSWITCH: u8 = 0x1B;

// Scope and iteration
pub const PUSHWITH: u8 = 0x1C;
pub const POPSCOPE: u8 = 0x1D;
pub const NEXTNAME: u8 = 0x1E;
pub const HASNEXT: u8 = 0x1F;
pub const NEXTVALUE: u8 = 0x23;
pub const PUSHSCOPE: u8 = 0x30;
pub const HASNEXT2: u8 = 0x32;

// Constants
pub const PUSHNULL: u8 = 0x20;
pub const PUSHUNDEFINED: u8 = 0x21;
pub const PUSHBYTE: u8 = 0x24;
pub const PUSHSHORT: u8 = 0x25;
pub const PUSHTRUE: u8 = 0x26;
pub const PUSHFALSE: u8 = 0x27;
pub const PUSHNAN: u8 = 0x28;
pub const PUSHSTRING: u8 = 0x2C;
pub const PUSHINT: u8 = 0x2D;
pub const PUSHUINT: u8 = 0x2E;
pub const PUSHDOUBLE: u8 = 0x2F;
pub const PUSHNAMESPACE: u8 = 0x31;

// Stack manipulation
pub const POP: u8 = 0x29;
pub const DUP: u8 = 0x2A;
pub const SWAP: u8 = 0x2B;

// Domain memory
pub const LI8: u8 = 0x35;
pub const LI16: u8 = 0x36;
pub const LI32: u8 = 0x37;
pub const LF32: u8 = 0x38;
pub const LF64: u8 = 0x39;
pub const SI8: u8 = 0x3A;
pub const SI16: u8 = 0x3B;
pub const SI32: u8 = 0x3C;
pub const SF32: u8 = 0x3D;
pub const SF64: u8 = 0x3E;

// Invocation
pub const NEWFUNCTION: u8 = 0x40;
pub const CALL: u8 = 0x41;
pub const CONSTRUCT: u8 = 0x42;
pub const CALLMETHOD: u8 = 0x43;
pub const CALLSTATIC: u8 = 0x44;
pub const CALLSUPER: u8 = 0x45;
pub const CALLPROPERTY: u8 = 0x46;
pub const RETURNVOID: u8 = 0x47;
pub const RETURNVALUE: u8 = 0x48;
pub const CONSTRUCTSUPER: u8 = 0x49;
pub const CONSTRUCTPROP: u8 = 0x4A;
pub const CALLPROPLEX: u8 = 0x4C;
pub const CALLSUPERVOID: u8 = 0x4E;
pub const CALLPROPVOID: u8 = 0x4F;

// Sign extension
pub const SXI1: u8 = 0x50;
pub const SXI8: u8 = 0x51;
pub const SXI16: u8 = 0x52;

// Object creation
pub const APPLYTYPE: u8 = 0x53;
pub const NEWOBJECT: u8 = 0x55;
pub const NEWARRAY: u8 = 0x56;
pub const NEWACTIVATION: u8 = 0x57;
pub const NEWCLASS: u8 = 0x58;
pub const GETDESCENDANTS: u8 = 0x59;
pub const NEWCATCH: u8 = 0x5A;

// Property lookup and access
pub const FINDPROPSTRICT: u8 = 0x5D;
pub const FINDPROPERTY: u8 = 0x5E;
pub const FINDDEF: u8 = 0x5F;
pub const GETLEX: u8 = 0x60;
pub const SETPROPERTY: u8 = 0x61;
pub const GETLOCAL: u8 = 0x62;
pub const SETLOCAL: u8 = 0x63;
pub const GETGLOBALSCOPE: u8 = 0x64;
pub const GETSCOPEOBJECT: u8 = 0x65;
pub const GETPROPERTY: u8 = 0x66;
pub const GETOUTERSCOPE: u8 = 0x67;
pub const INITPROPERTY: u8 = 0x68;
pub const DELETEPROPERTY: u8 = 0x6A;
pub const GETSLOT: u8 = 0x6C;
pub const SETSLOT: u8 = 0x6D;
pub const GETGLOBALSLOT: u8 = 0x6E;
pub const SETGLOBALSLOT: u8 = 0x6F;

// Conversion
pub const CONVERT_S: u8 = 0x70;
pub const ESC_XELEM: u8 = 0x71;
pub const ESC_XATTR: u8 = 0x72;
pub const CONVERT_I: u8 = 0x73;
pub const CONVERT_U: u8 = 0x74;
pub const CONVERT_D: u8 = 0x75;
pub const CONVERT_B: u8 = 0x76;
pub const CONVERT_O: u8 = 0x77;
pub const CHECKFILTER: u8 = 0x78;

// Coercion
pub const COERCE: u8 = 0x80;
pub const COERCE_B: u8 = 0x81;
pub const COERCE_A: u8 = 0x82;
pub const COERCE_I: u8 = 0x83;
pub const COERCE_D: u8 = 0x84;
pub const COERCE_S: u8 = 0x85;
pub const ASTYPE: u8 = 0x86;
pub const ASTYPELATE: u8 = 0x87;
pub const COERCE_U: u8 = 0x88;
pub const COERCE_O: u8 = 0x89;

// Unary arithmetic and local increments
pub const NEGATE: u8 = 0x90;
pub const INCREMENT: u8 = 0x91;
pub const INCLOCAL: u8 = 0x92;
pub const DECREMENT: u8 = 0x93;
pub const DECLOCAL: u8 = 0x94;
pub const TYPEOF: u8 = 0x95;
pub const NOT: u8 = 0x96;
pub const BITNOT: u8 = 0x97;

// Binary arithmetic and bit operations
pub const ADD: u8 = 0xA0;
pub const SUBTRACT: u8 = 0xA1;
pub const MULTIPLY: u8 = 0xA2;
pub const DIVIDE: u8 = 0xA3;
pub const MODULO: u8 = 0xA4;
pub const LSHIFT: u8 = 0xA5;
pub const RSHIFT: u8 = 0xA6;
pub const URSHIFT: u8 = 0xA7;
pub const BITAND: u8 = 0xA8;
pub const BITOR: u8 = 0xA9;
pub const BITXOR: u8 = 0xAA;

// Comparison and type tests
pub const EQUALS: u8 = 0xAB;
pub const STRICTEQUALS: u8 = 0xAC;
pub const LESSTHAN: u8 = 0xAD;
pub const LESSEQUALS: u8 = 0xAE;
pub const GREATERTHAN: u8 = 0xAF;
pub const GREATEREQUALS: u8 = 0xB0;
pub const INSTANCEOF: u8 = 0xB1;
pub const ISTYPE: u8 = 0xB2;
pub const ISTYPELATE: u8 = 0xB3;
pub const IN: u8 = 0xB4;

// Integer arithmetic
pub const INCREMENT_I: u8 = 0xC0;
pub const DECREMENT_I: u8 = 0xC1;
pub const INCLOCAL_I: u8 = 0xC2;
pub const DECLOCAL_I: u8 = 0xC3;
pub const NEGATE_I: u8 = 0xC4;
pub const ADD_I: u8 = 0xC5;
pub const SUBTRACT_I: u8 = 0xC6;
pub const MULTIPLY_I: u8 = 0xC7;

// Local shorthand
pub const GETLOCAL_0: u8 = 0xD0;
pub const GETLOCAL_1: u8 = 0xD1;
pub const GETLOCAL_2: u8 = 0xD2;
pub const GETLOCAL_3: u8 = 0xD3;
pub const SETLOCAL_0: u8 = 0xD4;
pub const SETLOCAL_1: u8 = 0xD5;
pub const SETLOCAL_2: u8 = 0xD6;
pub const SETLOCAL_3: u8 = 0xD7;

// Debug information
pub const DEBUG: u8 = 0xEF;
pub const DEBUGLINE: u8 = 0xF0;
pub const DEBUGFILE: u8 = 0xF1;
pub const BKPTLINE: u8 = 0xF2;
pub const TIMESTAMP: u8 = 0xF3;
