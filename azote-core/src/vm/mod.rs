//! 虚拟机
//!
//! 以显式帧栈执行代码块，不借助宿主的原生递归：
//! 每次调用压入一个 `Frame`，返回时弹出并把返回值压入调用方的操作数栈。

use crate::code_block::CodeBlock;
use crate::env::{Env, Environment};
use crate::error::{EnvError, Fault, RuntimeResult};
use crate::value::{Exception, Value};
use azote_config::{LimitConfig, VmConfig};
use std::rc::Rc;

// 子模块
mod call;
mod execution;
mod frame;
mod index;
mod stack;

pub use frame::{Block, BlockKind, Frame};
pub use index::{load_attribute, load_index, store_attribute, store_index};
pub use stack::{CallTrace, CallTraceEntry, FrameStack};

/// VM 日志目标
pub(crate) const TARGET: &str = "azote::vm";

/// 解释执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum InterpretResult {
    /// 入口代码块正常返回
    Ok(Value),
    /// 没有处理块接住的异常或 panic
    Exception {
        exception: Exception,
        backtrace: CallTrace,
    },
    /// 致命错误
    Fault { fault: Fault, backtrace: CallTrace },
}

impl InterpretResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, InterpretResult::Ok(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            InterpretResult::Ok(value) => Some(value),
            _ => None,
        }
    }
}

/// 虚拟机
pub struct Vm {
    /// 全局环境，原生函数以只读绑定注册在这里
    globals: Env,
    limits: LimitConfig,
    pub(crate) frames: FrameStack,
}

impl Vm {
    /// 创建新的虚拟机（使用默认配置）
    pub fn new() -> Self {
        Self::with_limits(LimitConfig::default())
    }

    /// 创建新的虚拟机（带配置）
    pub fn with_config(config: &VmConfig) -> Self {
        Self::with_limits(config.limits.clone())
    }

    pub fn with_limits(limits: LimitConfig) -> Self {
        Self {
            globals: Environment::new(),
            limits,
            frames: FrameStack::new(),
        }
    }

    pub fn globals(&self) -> &Env {
        &self.globals
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    pub fn frames(&self) -> &FrameStack {
        &self.frames
    }

    /// 注册原生函数为只读全局绑定
    pub fn register_native(
        &mut self,
        name: &str,
        func: impl Fn(&Env, &[Value]) -> RuntimeResult<Value> + 'static,
    ) -> Result<(), EnvError> {
        self.globals.create_const(name, Value::native(name, func))
    }

    /// 定义可变全局变量
    pub fn define_global(&mut self, name: &str, value: Value) -> Result<(), EnvError> {
        self.globals.create(name, value)
    }

    /// 在全局环境的一个新子作用域中执行代码块
    pub fn run(&mut self, code: Rc<CodeBlock>) -> InterpretResult {
        let env = Environment::enclose(&self.globals);
        self.run_in(code, env)
    }

    /// 在给定环境中执行代码块，执行结束后环境仍可供检查
    pub fn run_in(&mut self, code: Rc<CodeBlock>, env: Env) -> InterpretResult {
        self.frames.clear();
        let result = match call::push_frame(self, code, env) {
            Ok(()) => execution::run(self),
            Err(err) => execution::recover(self, err),
        };
        self.frames.clear();
        result
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
