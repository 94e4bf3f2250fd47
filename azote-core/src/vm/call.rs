//! 函数调用相关 (帧的压入与弹出、参数绑定)

use super::execution::Flow;
use super::frame::Frame;
use super::{Vm, TARGET};
use crate::code_block::CodeBlock;
use crate::env::{Env, Environment};
use crate::error::{Fault, RuntimeError, RuntimeResult};
use crate::value::Value;
use std::rc::Rc;
use tracing::trace;

/// 额外实参收集到的变量名
pub const ARGUMENTS: &str = "arguments";

/// 压入新帧
///
/// 帧栈深度超过上限时抛出 panic；代码块声明的栈深度或块深度超过上限时为致命错误。
/// 块深度与操作数栈共用 `max_stack_size` 上限。
pub(super) fn push_frame(vm: &mut Vm, code: Rc<CodeBlock>, env: Env) -> RuntimeResult<()> {
    let limits = vm.limits();
    if vm.frames.depth() >= limits.max_recursion_depth {
        return Err(RuntimeError::panic(format!(
            "maximum recursion depth exceeded ({})",
            limits.max_recursion_depth
        )));
    }
    if code.max_stack_size > limits.max_stack_size {
        return Err(Fault::StackLimitExceeded {
            declared: code.max_stack_size,
            limit: limits.max_stack_size,
        }
        .into());
    }
    if code.max_block_size > limits.max_stack_size {
        return Err(Fault::BlockLimitExceeded {
            declared: code.max_block_size,
            limit: limits.max_stack_size,
        }
        .into());
    }
    trace!(target: TARGET, name = %code.name, depth = vm.frames.depth() + 1, "push frame");
    vm.frames.push(Frame::new(code, env));
    Ok(())
}

/// 弹出当前帧，把返回值交给调用方
pub(super) fn return_value(vm: &mut Vm, value: Value) -> RuntimeResult<Flow> {
    let finished = vm.frames.pop().ok_or(Fault::NoActiveFrame)?;
    trace!(target: TARGET, name = %finished.code().name, depth = vm.frames.depth(), "pop frame");
    if vm.frames.is_empty() {
        return Ok(Flow::Finished(value));
    }
    vm.frames.current_mut()?.push(value)?;
    Ok(Flow::Continue)
}

/// CALL：栈顶为被调用者，其下为 `argc` 个按顺序压入的实参
pub(super) fn call(vm: &mut Vm, argc: usize) -> RuntimeResult<Flow> {
    let frame = vm.frames.current_mut()?;
    let callee = frame.pop()?;
    let args = frame.pop_n(argc)?;

    match callee {
        Value::Native(native) => {
            let env = Rc::clone(&frame.env);
            let result = native.call(&env, &args)?;
            vm.frames.current_mut()?.push(result)?;
        }
        Value::Function(function) => {
            let env = Environment::enclose(&function.env);
            bind_arguments(&env, &function.params, args);
            push_frame(vm, Rc::clone(&function.code), env)?;
        }
        Value::CodeBlock(code) => {
            let env = Environment::enclose(&frame.env);
            env.set_force(ARGUMENTS, Value::array(args), false);
            push_frame(vm, code, env)?;
        }
        other => {
            return Err(RuntimeError::exception(format!(
                "{} is not callable",
                other.kind()
            )))
        }
    }
    Ok(Flow::Continue)
}

/// 参数绑定走强制写入路径：缺失的实参为 null，多余的实参收集到 `arguments`
fn bind_arguments(env: &Env, params: &[String], args: Vec<Value>) {
    let mut args = args.into_iter();
    for param in params {
        env.set_force(param, args.next().unwrap_or(Value::Null), false);
    }
    env.set_force(ARGUMENTS, Value::array(args.collect()), false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_arguments() {
        let env = Environment::new();
        let params = vec!["a".to_string(), "b".to_string()];
        bind_arguments(&env, &params, vec![Value::Integer(1)]);
        assert_eq!(env.get("a").unwrap(), Value::Integer(1));
        assert_eq!(env.get("b").unwrap(), Value::Null);
        assert_eq!(env.get(ARGUMENTS).unwrap().inspect(), "[]");

        let env = Environment::new();
        bind_arguments(
            &env,
            &params,
            vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
        );
        assert_eq!(env.get("b").unwrap(), Value::Integer(2));
        assert_eq!(env.get(ARGUMENTS).unwrap().inspect(), "[3]");
    }
}
