//! Azote API - Execution orchestration layer
//!
//! Provides unified execution interface, including:
//! - The `Interpreter` facade (VM plus prelude natives plus output capture)
//! - Configuration abstraction (RunConfig)
//! - Unified error handling (AzoteError)
//! - Logging initialization
//!
//! For embedder convenience, this crate provides a global singleton config.
//! For library use, prefer the explicit `execute(code, &config)` API.

use azote_core::{Env, Environment, RuntimeResult, Vm};
use std::rc::Rc;
use tracing::{debug, info};

pub mod builtins;
pub mod config;
pub mod error;
pub mod logger;
pub mod types;

pub use builtins::{register_prelude, OutputBuffer};
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};
pub use error::{AzoteError, ErrorReport, FrameReport};
pub use logger::{init_test_logger, init_with_format, LogFormat};
pub use types::ExecuteOutput;

// Re-export config types from azote_config
pub use azote_config::{
    AzoteConfig, CompilerConfig, ConfigError, LimitConfig, LogConfig, LogLevel, Phase, VmConfig,
};

// Re-export core types
pub use azote_config;
pub use azote_core;
pub use azote_core::{CodeBlock, CodeBlockBuilder, Exception, InterpretResult, OpCode, Value};

/// 带预置函数的解释器
///
/// 全局环境在多次执行之间保留，每次执行在其下的新作用域中进行。
pub struct Interpreter {
    vm: Vm,
    config: RunConfig,
    stdout: OutputBuffer,
}

impl Interpreter {
    pub fn new(config: RunConfig) -> Result<Self, AzoteError> {
        let mut vm = Vm::with_limits(config.limits.clone());
        let stdout = OutputBuffer::default();
        register_prelude(&mut vm, &stdout)?;
        Ok(Self { vm, config, stdout })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn globals(&self) -> &Env {
        self.vm.globals()
    }

    /// 注册额外的原生函数
    pub fn register_native(
        &mut self,
        name: &str,
        func: impl Fn(&Env, &[Value]) -> RuntimeResult<Value> + 'static,
    ) -> Result<(), AzoteError> {
        Ok(self.vm.register_native(name, func)?)
    }

    /// 定义可变全局变量
    pub fn define_global(&mut self, name: &str, value: Value) -> Result<(), AzoteError> {
        Ok(self.vm.define_global(name, value)?)
    }

    /// 在全局环境的新作用域中执行代码块
    pub fn execute(&mut self, code: Rc<CodeBlock>) -> Result<ExecuteOutput, AzoteError> {
        let env = Environment::enclose(self.vm.globals());
        self.execute_in(code, env)
    }

    /// 在给定环境中执行代码块
    pub fn execute_in(
        &mut self,
        code: Rc<CodeBlock>,
        env: Env,
    ) -> Result<ExecuteOutput, AzoteError> {
        info!(target: logger::TARGET, name = %code.name, "Starting execution");

        if self.config.dump_bytecode {
            code.log_disassembly();
        }

        let result = self.vm.run_in(code, Rc::clone(&env));

        if self.config.dump_environment {
            debug!(target: logger::TARGET, "environment:\n{}", env.dump(0));
        }

        let stdout = std::mem::take(&mut *self.stdout.borrow_mut());
        let value = AzoteError::from_result(result)?;
        info!(target: logger::TARGET, "Execution completed");
        Ok(ExecuteOutput { value, stdout })
    }
}

/// Execute with explicit configuration
///
/// This is the recommended API for library users.
pub fn execute(code: Rc<CodeBlock>, config: &RunConfig) -> Result<ExecuteOutput, AzoteError> {
    Interpreter::new(config.clone())?.execute(code)
}

/// Build a code block with the builder options from a run configuration
pub fn builder(name: &str, config: &RunConfig) -> CodeBlockBuilder {
    CodeBlockBuilder::new(name).with_config(&config.compiler)
}

/// Load a run configuration from a JSON document
pub fn load_config(source: &str) -> Result<RunConfig, AzoteError> {
    let config = AzoteConfig::from_json_str(source)?;
    Ok(RunConfig::from(&config))
}

// ==================== Global config API ====================

/// Execute using the global config (defaults when not initialized)
pub fn quick_execute(code: Rc<CodeBlock>) -> Result<ExecuteOutput, AzoteError> {
    execute(code, get_config())
}
