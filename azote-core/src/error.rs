//! 错误类型
//!
//! 三层错误模型：
//! - `Fault`：引擎不变量被破坏（栈溢出、表索引越界等），终止整个执行
//! - `Exception`（见 `value` 模块）：脚本可见的异常，可被捕获或为 panic
//! - `EnvError`：环境绑定失败，在 VM 中转换为可捕获异常

use crate::value::Exception;
use crate::vm::BlockKind;
use thiserror::Error;

/// 致命内部错误
///
/// 表示编译产物损坏或引擎不变量被破坏，脚本代码无法恢复。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },

    #[error("stack exhausted")]
    StackExhausted,

    #[error("block stack overflow (capacity {capacity})")]
    BlockStackOverflow { capacity: usize },

    #[error("block stack exhausted")]
    BlockStackExhausted,

    #[error("block stack exhausted while looking for a {0} block")]
    NoMatchingBlock(BlockKind),

    #[error("constant index {index} out of bounds ({len} constants)")]
    ConstantOutOfBounds { index: usize, len: usize },

    #[error("name index {index} out of bounds ({len} names)")]
    NameOutOfBounds { index: usize, len: usize },

    #[error("local index {index} out of bounds ({len} locals)")]
    LocalOutOfBounds { index: usize, len: usize },

    #[error("invalid opcode 0x{opcode:02x} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },

    #[error("truncated instruction at offset {offset}")]
    TruncatedInstruction { offset: usize },

    #[error("jump target {target} outside of code (length {len})")]
    JumpOutOfBounds { target: usize, len: usize },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("scope underflow: no enclosing environment to restore")]
    ScopeUnderflow,

    #[error("no active frame")]
    NoActiveFrame,

    #[error("code block declares stack size {declared}, limit is {limit}")]
    StackLimitExceeded { declared: usize, limit: usize },

    #[error("code block declares block depth {declared}, limit is {limit}")]
    BlockLimitExceeded { declared: usize, limit: usize },
}

/// 环境绑定错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("symbol {0} already defined")]
    AlreadyDefined(String),

    #[error("symbol {0} not defined")]
    NotDefined(String),

    #[error("constant {0} can't be changed")]
    ConstantViolation(String),
}

/// 运算、原生函数调用以及指令执行的统一错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// 抛出的异常（可捕获异常或 panic）
    #[error("{0}")]
    Raised(Exception),

    /// 致命错误
    #[error("fatal: {0}")]
    Fault(#[from] Fault),
}

impl RuntimeError {
    /// 构造一个可捕获异常
    pub fn exception(message: impl Into<String>) -> Self {
        RuntimeError::Raised(Exception::new(message))
    }

    /// 构造一个不可捕获的 panic
    pub fn panic(message: impl Into<String>) -> Self {
        RuntimeError::Raised(Exception::panic(message))
    }
}

impl From<Exception> for RuntimeError {
    fn from(exception: Exception) -> Self {
        RuntimeError::Raised(exception)
    }
}

impl From<EnvError> for RuntimeError {
    fn from(err: EnvError) -> Self {
        RuntimeError::exception(err.to_string())
    }
}

/// 代码块构建错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{table} table is full (limit {limit} entries)")]
    TableOverflow { table: &'static str, limit: usize },

    #[error("label {0} was never bound")]
    UnboundLabel(usize),

    #[error("operand {operand} does not fit in {width} bytes for {opcode}")]
    OperandOutOfRange {
        opcode: &'static str,
        operand: usize,
        width: usize,
    },

    #[error("jump target {0} does not fit in a 16-bit operand")]
    JumpOutOfRange(usize),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
