//! 值类型
//!
//! 脚本可见的全部值都由 `Value` 表示。标量直接内联，复合值（数组、映射）
//! 使用 `Rc<RefCell<..>>` 共享可变存储，可调用值和代码块通过 `Rc` 共享。

use crate::code_block::CodeBlock;
use crate::env::Env;
use crate::error::{RuntimeError, RuntimeResult};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// 数组存储
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// 映射存储（键有序，便于稳定输出）
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;

/// 原生函数签名：接收调用时的环境与实参
pub type NativeFn = Rc<dyn Fn(&Env, &[Value]) -> RuntimeResult<Value>>;

/// 运行时值
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Rc<str>),
    Array(ArrayRef),
    Map(MapRef),
    /// 脚本异常（可捕获异常或 panic）
    Exception(Rc<Exception>),
    /// 嵌入层可恢复错误，不参与异常展开
    Error(Rc<str>),
    /// 闭包
    Function(Rc<Function>),
    /// 原生函数
    Native(Rc<NativeFunction>),
    /// 编译好的代码块（不透明资源）
    CodeBlock(Rc<CodeBlock>),
}

/// 值的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Map,
    Exception,
    Error,
    Function,
    Builtin,
    Resource,
}

impl ValueKind {
    /// 错误信息中使用的大写名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Null => "NULL",
            ValueKind::Boolean => "BOOLEAN",
            ValueKind::Integer => "INTEGER",
            ValueKind::Float => "FLOAT",
            ValueKind::String => "STRING",
            ValueKind::Array => "ARRAY",
            ValueKind::Map => "MAP",
            ValueKind::Exception => "EXCEPTION",
            ValueKind::Error => "ERROR",
            ValueKind::Function => "FUNCTION",
            ValueKind::Builtin => "BUILTIN",
            ValueKind::Resource => "RESOURCE",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==================== 异常 ====================

/// 脚本异常
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    pub message: String,
    /// false 表示 panic，绕过所有异常处理块
    pub catchable: bool,
    /// 是否已被某个处理块捕获
    pub caught: bool,
}

impl Exception {
    /// 可捕获异常
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            catchable: true,
            caught: false,
        }
    }

    /// 不可捕获异常
    pub fn panic(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            catchable: false,
            caught: false,
        }
    }

    /// 仍在传播中的可捕获异常
    pub fn is_exception(&self) -> bool {
        self.catchable && !self.caught
    }

    pub fn is_panic(&self) -> bool {
        !self.catchable
    }

    /// 被处理块接住后的副本
    pub fn mark_caught(mut self) -> Self {
        self.caught = true;
        self
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.catchable {
            write!(f, "Exception: {}", self.message)
        } else {
            write!(f, "Panic: {}", self.message)
        }
    }
}

// ==================== 可调用值 ====================

/// 闭包：函数体代码块加上定义时的环境
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub code: Rc<CodeBlock>,
    pub env: Env,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("code", &self.code.name)
            .finish()
    }
}

/// 由宿主注册的原生函数
pub struct NativeFunction {
    pub name: String,
    pub func: NativeFn,
}

impl NativeFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Env, &[Value]) -> RuntimeResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Rc::new(func),
        }
    }

    pub fn call(&self, env: &Env, args: &[Value]) -> RuntimeResult<Value> {
        (self.func)(env, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// 原生函数参数个数检查
pub fn check_min_args(name: &str, min: usize, args: &[Value]) -> RuntimeResult<()> {
    if args.len() < min {
        return Err(RuntimeError::exception(format!(
            "{name} expects at least {min} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

// ==================== Value 方法 ====================

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn exception(exception: Exception) -> Self {
        Value::Exception(Rc::new(exception))
    }

    pub fn error(message: impl AsRef<str>) -> Self {
        Value::Error(Rc::from(message.as_ref()))
    }

    pub fn native(
        name: impl Into<String>,
        func: impl Fn(&Env, &[Value]) -> RuntimeResult<Value> + 'static,
    ) -> Self {
        Value::Native(Rc::new(NativeFunction::new(name, func)))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Map(_) => ValueKind::Map,
            Value::Exception(_) => ValueKind::Exception,
            Value::Error(_) => ValueKind::Error,
            Value::Function(_) => ValueKind::Function,
            Value::Native(_) => ValueKind::Builtin,
            Value::CodeBlock(_) => ValueKind::Resource,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_exception(&self) -> Option<&Exception> {
        match self {
            Value::Exception(e) => Some(e),
            _ => None,
        }
    }

    /// 条件判断使用的真值
    ///
    /// null 与 false 为假，数值为 0 时为假，空字符串为假，
    /// 其余种类一律视为假。
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            _ => false,
        }
    }

    /// 该种类是否参与真值转换
    pub fn is_bool_like(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Boolean(_)
                | Value::Integer(_)
                | Value::Float(_)
                | Value::String(_)
        )
    }

    /// 深拷贝
    ///
    /// 数组与映射递归复制，代码块资源不可复制，得到 null。
    pub fn dup(&self) -> Value {
        match self {
            Value::Array(items) => Value::array(items.borrow().iter().map(Value::dup).collect()),
            Value::Map(entries) => Value::map(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.dup()))
                    .collect(),
            ),
            Value::CodeBlock(_) => Value::Null,
            other => other.clone(),
        }
    }

    /// 面向用户的文本表示
    pub fn inspect(&self) -> String {
        match self {
            Value::Null => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => format_float(*n),
            Value::String(s) => s.to_string(),
            Value::Array(items) => {
                let parts: Vec<String> = items.borrow().iter().map(Value::inspect).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{k}: {}", v.inspect()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::Exception(e) => e.to_string(),
            Value::Error(msg) => format!("Error: {msg}"),
            Value::Function(func) => format!("func {}({})", func.name, func.params.join(", ")),
            Value::Native(native) => format!("<builtin {}>", native.name),
            Value::CodeBlock(code) => format!("<codeblock {}>", code.name),
        }
    }
}

fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{n:.1}")
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Map(a), Value::Map(b)) => *a.borrow() == *b.borrow(),
            (Value::Exception(a), Value::Exception(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::CodeBlock(a), Value::CodeBlock(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s:?}"),
            Value::Function(func) => write!(f, "{func:?}"),
            Value::Native(native) => write!(f, "{native:?}"),
            other => f.write_str(&other.inspect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Exception> for Value {
    fn from(e: Exception) -> Self {
        Value::exception(e)
    }
}
