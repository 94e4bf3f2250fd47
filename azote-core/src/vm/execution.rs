//! run() 主执行循环与异常展开

use super::frame::{Block, BlockKind};
use super::{call, index, InterpretResult, Vm, TARGET};
use crate::bytecode::{decode_at, Instruction, OpCode, Operand};
use crate::code_block::CodeBlock;
use crate::env::{Env, Environment};
use crate::error::{Fault, RuntimeError, RuntimeResult};
use crate::operators::{self, CompareOp};
use crate::value::{Exception, Function, Value};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, error, trace};

/// 单步执行后的控制流
pub(super) enum Flow {
    Continue,
    /// 入口帧已返回
    Finished(Value),
}

/// 执行字节码的主循环
pub(super) fn run(vm: &mut Vm) -> InterpretResult {
    loop {
        match step(vm) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Finished(value)) => return InterpretResult::Ok(value),
            Err(err) => {
                if let Some(result) = handle_error(vm, err) {
                    return result;
                }
            }
        }
    }
}

/// 从错误状态开始：先尝试展开，若被接住则继续执行
pub(super) fn recover(vm: &mut Vm, err: RuntimeError) -> InterpretResult {
    match handle_error(vm, err) {
        Some(result) => result,
        None => run(vm),
    }
}

/// 处理错误；返回 None 表示异常已被接住，执行继续
fn handle_error(vm: &mut Vm, err: RuntimeError) -> Option<InterpretResult> {
    match err {
        RuntimeError::Raised(exception) => unwind(vm, exception),
        RuntimeError::Fault(fault) => {
            let backtrace = vm.frames.backtrace();
            error!(target: TARGET, %fault, depth = vm.frames.depth(), "execution aborted");
            Some(InterpretResult::Fault { fault, backtrace })
        }
    }
}

/// 异常展开
///
/// panic 直接终止。可捕获异常逐帧查找处理块：找到时恢复该块记录的栈高度和环境，
/// 压入已标记捕获的异常并跳转到处理入口；当前帧没有处理块时弹出该帧继续向外查找。
fn unwind(vm: &mut Vm, exception: Exception) -> Option<InterpretResult> {
    let backtrace = vm.frames.backtrace();
    if exception.is_panic() {
        debug!(target: TARGET, message = %exception.message, "panic raised");
        return Some(InterpretResult::Exception {
            exception,
            backtrace,
        });
    }
    debug!(target: TARGET, message = %exception.message, "exception raised");

    while let Ok(frame) = vm.frames.current_mut() {
        if let Some((catch, sp, scope)) = frame.take_handler() {
            frame.truncate(sp);
            frame.env = scope;
            frame.pc = catch;
            debug!(target: TARGET, message = %exception.message, catch, "exception caught");
            if let Err(fault) = frame.push(Value::exception(exception.mark_caught())) {
                return handle_error(vm, fault.into());
            }
            return None;
        }
        if let Some(popped) = vm.frames.pop() {
            trace!(target: TARGET, name = %popped.code().name, "unwind frame");
        }
    }

    debug!(target: TARGET, message = %exception.message, "exception escaped");
    Some(InterpretResult::Exception {
        exception,
        backtrace,
    })
}

/// 取指、解码、执行一条指令
fn step(vm: &mut Vm) -> RuntimeResult<Flow> {
    let frame = vm.frames.current_mut()?;
    let code = Rc::clone(frame.code());

    // 越过末尾即隐式返回 null
    if frame.pc >= code.code.len() {
        return call::return_value(vm, Value::Null);
    }

    let instruction = decode_at(&code.code, frame.pc)?;
    frame.last_offset = frame.pc;
    frame.pc = instruction.next_offset();

    #[cfg(feature = "trace_execution")]
    trace!(
        target: TARGET,
        offset = instruction.offset,
        op = instruction.opcode.name(),
        arg = instruction.arg(),
        sp = frame.sp(),
        "execute"
    );

    execute(vm, &code, instruction)
}

fn jump_target(code: &CodeBlock, target: usize) -> Result<usize, Fault> {
    if target > code.code.len() {
        return Err(Fault::JumpOutOfBounds {
            target,
            len: code.code.len(),
        });
    }
    Ok(target)
}

fn execute(vm: &mut Vm, code: &CodeBlock, instruction: Instruction) -> RuntimeResult<Flow> {
    use OpCode::*;

    let arg = instruction.arg();

    // 需要操作帧栈的指令
    match instruction.opcode {
        Call => return call::call(vm, arg),
        Return => {
            let value = vm.frames.current_mut()?.pop()?;
            return call::return_value(vm, value);
        }
        _ => {}
    }

    let frame = vm.frames.current_mut()?;

    match instruction.opcode {
        // ===== 栈操作 =====
        Noop => {}
        PopTop => {
            frame.pop()?;
        }
        DupTop => {
            let top = frame.peek()?.clone();
            frame.push(top)?;
        }

        // ===== 常量与局部变量 =====
        LoadConst => {
            let value = code.constant(arg)?.clone();
            frame.push(value)?;
        }
        LoadFast => {
            let value = frame.env.get(code.local_name(arg)?)?;
            frame.push(value)?;
        }
        StoreFast => {
            let value = frame.pop()?;
            frame.env.set(code.local_name(arg)?, value)?;
        }
        StoreConst => {
            let value = frame.pop()?;
            frame.env.create_const(code.local_name(arg)?, value)?;
        }
        Define => {
            let value = frame.pop()?;
            frame.env.create(code.local_name(arg)?, value)?;
        }
        DeleteFast => {
            frame.env.unset_local(code.local_name(arg)?);
        }

        // ===== 全局变量与属性 =====
        LoadGlobal => {
            let value = frame.env.get(code.name_at(arg)?)?;
            frame.push(value)?;
        }
        StoreGlobal => {
            let value = frame.pop()?;
            frame.env.set(code.name_at(arg)?, value)?;
        }
        DeleteGlobal => {
            frame.env.unset(code.name_at(arg)?);
        }
        LoadAttribute => {
            let target = frame.pop()?;
            let value = index::load_attribute(&target, code.name_at(arg)?)?;
            frame.push(value)?;
        }
        StoreAttribute => {
            let target = frame.pop()?;
            let value = frame.pop()?;
            index::store_attribute(&target, code.name_at(arg)?, value)?;
        }
        LoadIndex => {
            let key = frame.pop()?;
            let target = frame.pop()?;
            let value = index::load_index(&target, &key)?;
            frame.push(value)?;
        }
        StoreIndex => {
            let key = frame.pop()?;
            let target = frame.pop()?;
            let value = frame.pop()?;
            index::store_index(&target, &key, value)?;
        }

        // ===== 运算 =====
        BinaryAdd | BinarySub | BinaryMul | BinaryDivide | BinaryMod | BinaryShiftL
        | BinaryShiftR | BinaryAnd | BinaryOr | BinaryXor | BinaryAndNot | BinaryLogicAnd
        | BinaryLogicOr => {
            let right = frame.pop()?;
            let left = frame.pop()?;
            let op = instruction.opcode.binary_op().ok_or(Fault::InvalidOpcode {
                opcode: instruction.opcode as u8,
                offset: instruction.offset,
            })?;
            frame.push(operators::binary(op, &left, &right)?)?;
        }
        UnaryNeg => {
            let value = frame.pop()?;
            frame.push(operators::negate(&value)?)?;
        }
        UnaryNot => {
            let value = frame.pop()?;
            frame.push(operators::not(&value))?;
        }
        Compare => {
            let op = CompareOp::from_byte(arg as u8).ok_or(Fault::InvalidOpcode {
                opcode: instruction.opcode as u8,
                offset: instruction.offset,
            })?;
            let right = frame.pop()?;
            let left = frame.pop()?;
            frame.push(operators::compare(op, &left, &right)?)?;
        }

        // ===== 构造 =====
        MakeArray => {
            let items = frame.pop_n(arg)?;
            frame.push(Value::array(items))?;
        }
        MakeMap => {
            let items = frame.pop_n(arg * 2)?;
            let mut entries = BTreeMap::new();
            let mut pairs = items.into_iter();
            while let (Some(key), Some(value)) = (pairs.next(), pairs.next()) {
                match key {
                    Value::String(key) => {
                        entries.insert(key.to_string(), value);
                    }
                    other => {
                        return Err(RuntimeError::exception(format!(
                            "map keys must be STRING, got {}",
                            other.kind()
                        )))
                    }
                }
            }
            frame.push(Value::map(entries))?;
        }
        MakeFunction => {
            let body = frame.pop()?;
            let params = frame.pop()?;
            let name = frame.pop()?;
            let function = make_function(name, params, body, Rc::clone(&frame.env))?;
            frame.push(Value::Function(Rc::new(function)))?;
        }

        // ===== 跳转 =====
        JumpAbsolute => frame.pc = jump_target(code, arg)?,
        JumpForward => frame.pc = jump_target(code, frame.pc + arg)?,
        PopJumpIfTrue | PopJumpIfFalse => {
            let condition = frame.pop()?;
            if !condition.is_bool_like() {
                return Err(RuntimeError::exception(format!(
                    "condition must be boolean-like, got {}",
                    condition.kind()
                )));
            }
            if condition.is_truthy() == (instruction.opcode == PopJumpIfTrue) {
                frame.pc = jump_target(code, arg)?;
            }
        }
        JumpIfTrueOrPop | JumpIfFalseOrPop => {
            let truthy = frame.peek()?.is_truthy();
            if truthy == (instruction.opcode == JumpIfTrueOrPop) {
                frame.pc = jump_target(code, arg)?;
            } else {
                frame.pop()?;
            }
        }

        // ===== 块栈 =====
        StartLoop => {
            let Operand::Pair(iter, end) = instruction.operand else {
                return Err(Fault::TruncatedInstruction {
                    offset: instruction.offset,
                }
                .into());
            };
            let block = Block::Loop {
                start: frame.pc,
                iter: jump_target(code, iter as usize)?,
                end: jump_target(code, end as usize)?,
                sp: frame.sp(),
                scope: Rc::clone(&frame.env),
            };
            frame.push_block(block)?;
        }
        StartTry => {
            let block = Block::Handler {
                catch: jump_target(code, arg)?,
                sp: frame.sp(),
                scope: Rc::clone(&frame.env),
            };
            frame.push_block(block)?;
        }
        EndBlock => {
            let (Block::Loop { scope, .. } | Block::Handler { scope, .. }) = frame.pop_block()?;
            frame.env = scope;
        }
        Break => {
            frame.pop_block_until(BlockKind::Loop)?;
            if let Block::Loop { end, sp, scope, .. } = frame.pop_block()? {
                frame.truncate(sp);
                frame.env = scope;
                frame.pc = end;
            }
        }
        Continue => {
            let Block::Loop {
                iter, sp, scope, ..
            } = frame.pop_block_until(BlockKind::Loop)?.clone()
            else {
                return Err(Fault::NoMatchingBlock(BlockKind::Loop).into());
            };
            frame.truncate(sp);
            frame.env = scope;
            frame.pc = iter;
        }
        Throw => {
            let value = frame.pop()?;
            return Err(RuntimeError::Raised(to_exception(value)));
        }
        OpenScope => frame.env = Environment::enclose(&frame.env),
        CloseScope => frame.env = frame.env.parent().ok_or(Fault::ScopeUnderflow)?,

        Call | Return => {}
    }

    Ok(Flow::Continue)
}

/// THROW 的操作数转换为异常
fn to_exception(value: Value) -> Exception {
    match value {
        Value::Exception(exception) => Exception {
            caught: false,
            ..(*exception).clone()
        },
        Value::String(message) => Exception::new(message.to_string()),
        other => Exception::new(other.inspect()),
    }
}

fn make_function(
    name: Value,
    params: Value,
    body: Value,
    env: Env,
) -> RuntimeResult<Function> {
    let code = match body {
        Value::CodeBlock(code) => code,
        other => {
            return Err(RuntimeError::exception(format!(
                "function body must be RESOURCE, got {}",
                other.kind()
            )))
        }
    };
    let items = match params {
        Value::Array(items) => items,
        other => {
            return Err(RuntimeError::exception(format!(
                "function parameters must be ARRAY, got {}",
                other.kind()
            )))
        }
    };
    let params = items
        .borrow()
        .iter()
        .map(|p| {
            p.as_str().map(str::to_string).ok_or_else(|| {
                RuntimeError::exception(format!("parameter names must be STRING, got {}", p.kind()))
            })
        })
        .collect::<RuntimeResult<Vec<_>>>()?;
    let name = match name {
        Value::String(name) => name.to_string(),
        Value::Null => "<anonymous>".to_string(),
        other => other.inspect(),
    };
    Ok(Function {
        name,
        params,
        code,
        env,
    })
}
