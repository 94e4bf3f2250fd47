//! 预置原生函数
//!
//! 以只读全局绑定注册到 VM：`len`、`print`、`typeOf`、`toString`、
//! `exception`、`panic`、`error`、`isError`、`isException`、`modulesSupported`。

use azote_core::{
    check_min_args, EnvError, Exception, RuntimeError, RuntimeResult, Value, Vm,
};
use std::cell::RefCell;
use std::rc::Rc;

/// `print` 写入的输出缓冲
pub type OutputBuffer = Rc<RefCell<String>>;

/// 注册全部预置函数
pub fn register_prelude(vm: &mut Vm, stdout: &OutputBuffer) -> Result<(), EnvError> {
    let out = Rc::clone(stdout);
    vm.register_native("print", move |_, args| {
        let line: Vec<String> = args.iter().map(Value::inspect).collect();
        let mut out = out.borrow_mut();
        out.push_str(&line.join(" "));
        out.push('\n');
        Ok(Value::Null)
    })?;
    vm.register_native("len", len)?;
    vm.register_native("typeOf", |_, args| {
        check_min_args("typeOf", 1, args)?;
        Ok(Value::string(args[0].kind().as_str()))
    })?;
    vm.register_native("toString", |_, args| {
        check_min_args("toString", 1, args)?;
        Ok(Value::string(args[0].inspect()))
    })?;
    vm.register_native("exception", |_, args| {
        Ok(Value::exception(Exception::new(message_of("exception", args)?)))
    })?;
    vm.register_native("panic", |_, args| {
        Err(RuntimeError::panic(message_of("panic", args)?))
    })?;
    vm.register_native("error", |_, args| {
        Ok(Value::error(message_of("error", args)?))
    })?;
    vm.register_native("isError", |_, args| {
        check_min_args("isError", 1, args)?;
        Ok(Value::Boolean(matches!(args[0], Value::Error(_))))
    })?;
    vm.register_native("isException", |_, args| {
        check_min_args("isException", 1, args)?;
        Ok(Value::Boolean(
            args[0].as_exception().is_some_and(|e| e.catchable),
        ))
    })?;
    // 共享对象模块由外部子系统提供
    vm.register_native("modulesSupported", |_, _| Ok(Value::Boolean(false)))?;
    Ok(())
}

fn len(_: &azote_core::Env, args: &[Value]) -> RuntimeResult<Value> {
    check_min_args("len", 1, args)?;
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.borrow().len(),
        Value::Map(entries) => entries.borrow().len(),
        Value::Null => 0,
        other => {
            return Err(RuntimeError::exception(format!(
                "len expects STRING, ARRAY or MAP, got {}",
                other.kind()
            )))
        }
    };
    Ok(Value::Integer(n as i64))
}

/// 第一个参数作为消息文本
fn message_of(name: &str, args: &[Value]) -> RuntimeResult<String> {
    check_min_args(name, 1, args)?;
    Ok(match &args[0] {
        Value::String(s) => s.to_string(),
        other => other.inspect(),
    })
}
