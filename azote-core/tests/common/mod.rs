//! 测试辅助工具
//!
//! 提供端到端测试的辅助函数：用构建器组装代码块并在 VM 中执行

#![allow(dead_code)]

use azote_core::{
    CodeBlock, CodeBlockBuilder, CompileError, Exception, Fault, InterpretResult, LimitConfig,
    Value, Vm,
};
use std::rc::Rc;

/// 用闭包填充构建器并生成代码块
///
/// # Example
/// ```ignore
/// let code = build("main", |b| {
///     b.load_const(Value::Integer(1))?;
///     b.emit(OpCode::Return)
/// });
/// ```
pub fn build(
    name: &str,
    body: impl FnOnce(&mut CodeBlockBuilder) -> Result<(), CompileError>,
) -> Rc<CodeBlock> {
    let mut builder = CodeBlockBuilder::new(name).filename("test.az");
    body(&mut builder).expect("emission failed");
    Rc::new(builder.build().expect("build failed"))
}

/// 在默认配置的 VM 中执行
pub fn run(code: Rc<CodeBlock>) -> InterpretResult {
    Vm::new().run(code)
}

/// 在指定限制下执行
pub fn run_with_limits(code: Rc<CodeBlock>, limits: LimitConfig) -> InterpretResult {
    Vm::with_limits(limits).run(code)
}

/// 获取正常返回的整数
pub fn get_int(result: &InterpretResult) -> Option<i64> {
    result.value().and_then(Value::as_int)
}

/// 获取逃逸到顶层的异常
pub fn escaped(result: &InterpretResult) -> Option<&Exception> {
    match result {
        InterpretResult::Exception { exception, .. } => Some(exception),
        _ => None,
    }
}

/// 获取致命错误
pub fn fault(result: &InterpretResult) -> Option<&Fault> {
    match result {
        InterpretResult::Fault { fault, .. } => Some(fault),
        _ => None,
    }
}

/// 获取作为返回值的（已捕获）异常
pub fn returned_exception(result: &InterpretResult) -> Option<Exception> {
    result
        .value()
        .and_then(Value::as_exception)
        .cloned()
}

/// 构建函数值所需的三个常量：名称、参数数组、函数体
pub fn load_function(
    b: &mut CodeBlockBuilder,
    name: &str,
    params: &[&str],
    body: Rc<CodeBlock>,
) -> Result<(), CompileError> {
    b.load_const(name)?;
    b.load_const(Value::array(
        params.iter().map(|p| Value::string(p)).collect(),
    ))?;
    b.load_const(Value::CodeBlock(body))?;
    b.emit(azote_core::OpCode::MakeFunction)
}
