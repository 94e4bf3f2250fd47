//! Azote Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Azote crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    /// A limit was set to a value the engine cannot run with
    #[error("invalid limit `{name}`: {reason}")]
    InvalidLimit { name: &'static str, reason: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzoteConfig {
    /// Logging levels per phase
    pub log: LogConfig,
    /// Virtual machine options
    pub vm: VmConfig,
    /// Code block builder options
    pub compiler: CompilerConfig,
}

impl AzoteConfig {
    /// Parse a configuration document; missing fields fall back to defaults
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: AzoteConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to pretty JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject limits the VM cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vm.limits.validate()
    }
}

/// Configuration for the code block builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Whether the source file tag is recorded on built code blocks
    pub emit_debug_info: bool,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Largest operand stack a code block may declare
    pub max_stack_size: usize,
    /// Maximum depth of the frame stack
    pub max_recursion_depth: usize,
}

impl LimitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_stack_size == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "max_stack_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_recursion_depth == 0 {
            return Err(ConfigError::InvalidLimit {
                name: "max_recursion_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the virtual machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Execution limits
    pub limits: LimitConfig,
}

/// Log level vocabulary (mirrors `tracing::Level` without depending on it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Global default level
    pub global: LogLevel,
    /// Builder level (None means use global)
    pub compiler: Option<LogLevel>,
    /// VM level (None means use global)
    pub vm: Option<LogLevel>,
}

impl LogConfig {
    /// Get the effective level for a phase
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let specific = match phase {
            Phase::Compiler => self.compiler,
            Phase::Vm => self.vm,
        };
        specific.unwrap_or(self.global)
    }
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Compiler,
    Vm,
}

impl Phase {
    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("azote::{}", self.as_str())
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            emit_debug_info: true,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_recursion_depth: 256,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: LogLevel::Info,
            compiler: None,
            vm: None,
        }
    }
}
