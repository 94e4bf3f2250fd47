//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use azote_config::ConfigError;
use azote_core::{CallTrace, CompileError, EnvError, Exception, Fault, InterpretResult, Value};
use serde::Serialize;
use thiserror::Error;

/// Azote 错误类型
#[derive(Error, Debug)]
pub enum AzoteError {
    /// 没有处理块接住的异常或 panic
    #[error("{exception}")]
    Exception {
        exception: Exception,
        backtrace: CallTrace,
    },

    /// 致命错误
    #[error("Fatal error: {fault}")]
    Fault { fault: Fault, backtrace: CallTrace },

    /// 代码块构建错误
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 全局环境初始化错误（原生函数重名等）
    #[error("Environment error: {0}")]
    Environment(#[from] EnvError),
}

impl AzoteError {
    /// 将解释结果拆分为返回值或错误
    pub fn from_result(result: InterpretResult) -> Result<Value, AzoteError> {
        match result {
            InterpretResult::Ok(value) => Ok(value),
            InterpretResult::Exception {
                exception,
                backtrace,
            } => Err(AzoteError::Exception {
                exception,
                backtrace,
            }),
            InterpretResult::Fault { fault, backtrace } => {
                Err(AzoteError::Fault { fault, backtrace })
            }
        }
    }

    /// 获取错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            AzoteError::Exception { .. } | AzoteError::Fault { .. } => "runtime",
            AzoteError::Compile(_) => "compiler",
            AzoteError::Config(_) => "config",
            AzoteError::Environment(_) => "setup",
        }
    }

    /// 运行期错误的调用栈回溯
    pub fn backtrace(&self) -> Option<&CallTrace> {
        match self {
            AzoteError::Exception { backtrace, .. } | AzoteError::Fault { backtrace, .. } => {
                Some(backtrace)
            }
            _ => None,
        }
    }

    /// 错误类型（可用于程序化处理）
    pub fn kind(&self) -> &'static str {
        match self {
            AzoteError::Exception { exception, .. } if exception.is_panic() => "Panic",
            AzoteError::Exception { .. } => "Exception",
            AzoteError::Fault { fault, .. } => fault_kind(fault),
            AzoteError::Compile(err) => match err {
                CompileError::TableOverflow { .. } => "TableOverflow",
                CompileError::UnboundLabel(_) => "UnboundLabel",
                CompileError::OperandOutOfRange { .. } => "OperandOutOfRange",
                CompileError::JumpOutOfRange(_) => "JumpOutOfRange",
            },
            AzoteError::Config(err) => match err {
                ConfigError::Parse(_) => "ConfigParse",
                ConfigError::InvalidLimit { .. } => "InvalidLimit",
            },
            AzoteError::Environment(err) => match err {
                EnvError::AlreadyDefined(_) => "AlreadyDefined",
                EnvError::NotDefined(_) => "NotDefined",
                EnvError::ConstantViolation(_) => "ConstantViolation",
            },
        }
    }

    /// 转换为结构化错误报告
    ///
    /// 适用于工具集成等需要结构化数据的场景，可直接序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        let message = match self {
            AzoteError::Exception { exception, .. } => exception.message.clone(),
            AzoteError::Fault { fault, .. } => fault.to_string(),
            AzoteError::Compile(err) => err.to_string(),
            AzoteError::Config(err) => err.to_string(),
            AzoteError::Environment(err) => err.to_string(),
        };
        let backtrace = self
            .backtrace()
            .map(|bt| {
                bt.entries
                    .iter()
                    .map(|entry| FrameReport {
                        name: entry.name.clone(),
                        filename: entry.filename.clone(),
                        offset: entry.offset,
                    })
                    .collect()
            })
            .unwrap_or_default();
        ErrorReport {
            phase: self.phase(),
            error_kind: self.kind().to_string(),
            message,
            backtrace,
        }
    }
}

fn fault_kind(fault: &Fault) -> &'static str {
    match fault {
        Fault::StackOverflow { .. } => "StackOverflow",
        Fault::StackExhausted => "StackExhausted",
        Fault::BlockStackOverflow { .. } => "BlockStackOverflow",
        Fault::BlockStackExhausted => "BlockStackExhausted",
        Fault::NoMatchingBlock(_) => "NoMatchingBlock",
        Fault::ConstantOutOfBounds { .. } => "ConstantOutOfBounds",
        Fault::NameOutOfBounds { .. } => "NameOutOfBounds",
        Fault::LocalOutOfBounds { .. } => "LocalOutOfBounds",
        Fault::InvalidOpcode { .. } => "InvalidOpcode",
        Fault::TruncatedInstruction { .. } => "TruncatedInstruction",
        Fault::JumpOutOfBounds { .. } => "JumpOutOfBounds",
        Fault::DivisionByZero => "DivisionByZero",
        Fault::ScopeUnderflow => "ScopeUnderflow",
        Fault::NoActiveFrame => "NoActiveFrame",
        Fault::StackLimitExceeded { .. } => "StackLimitExceeded",
        Fault::BlockLimitExceeded { .. } => "BlockLimitExceeded",
    }
}

/// 结构化错误报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: compiler, runtime, config, setup
    pub phase: &'static str,
    /// 错误类型
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
    /// 调用栈，最内层在前
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backtrace: Vec<FrameReport>,
}

/// 回溯中的一帧
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub name: String,
    pub filename: String,
    pub offset: usize,
}

impl std::fmt::Display for ErrorReport {
    /// 默认的终端友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.error_kind, self.message)?;
        for frame in &self.backtrace {
            write!(
                f,
                "\n  at {} ({}:{:04})",
                frame.name, frame.filename, frame.offset
            )?;
        }
        Ok(())
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}
