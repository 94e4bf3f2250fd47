//! API 层配置
//!
//! 包含执行配置 RunConfig 和全局单例（供嵌入方快捷使用）

use azote_config::{AzoteConfig, CompilerConfig, LimitConfig};
use once_cell::sync::OnceCell;

/// Execution configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    /// Whether to log the disassembly before execution
    pub dump_bytecode: bool,
    /// Whether to log the script environment after execution
    pub dump_environment: bool,
    /// Builder configuration
    pub compiler: CompilerConfig,
    /// Execution limits
    pub limits: LimitConfig,
}

impl From<&AzoteConfig> for RunConfig {
    fn from(config: &AzoteConfig) -> Self {
        Self {
            dump_bytecode: false,
            dump_environment: false,
            compiler: config.compiler.clone(),
            limits: config.vm.limits.clone(),
        }
    }
}

// Global config singleton
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration
///
/// Returns the rejected config if one was already installed.
pub fn init(config: RunConfig) -> Result<(), RunConfig> {
    GLOBAL_CONFIG.set(config)
}

/// Get global config reference, installing the defaults on first use
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get_or_init(RunConfig::default)
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}
