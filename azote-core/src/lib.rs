//! Azote Core - Execution engine (pure logic, no IO)
//!
//! Contains the value model and operator semantics, the lexical environment,
//! compiled code blocks with their builder, and the virtual machine.
//! Only operates on in-memory data structures; the only output is `tracing` events.
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod builder;
pub mod bytecode;
pub mod code_block;
pub mod env;
pub mod error;
pub mod operators;
pub mod value;
pub mod vm;

// Re-export common types
pub use builder::{CodeBlockBuilder, ConstantTable, Label, StringTable};
pub use bytecode::{Instruction, OpCode, Operand};
pub use code_block::CodeBlock;
pub use env::{Env, Environment};
pub use error::{CompileError, EnvError, Fault, RuntimeError, RuntimeResult};
pub use operators::{BinaryOp, CompareOp};
pub use value::{check_min_args, Exception, Function, NativeFunction, Value, ValueKind};
pub use vm::{CallTrace, InterpretResult, Vm};

// Re-export config types from azote-config
pub use azote_config::{CompilerConfig, LimitConfig, Phase, VmConfig};
