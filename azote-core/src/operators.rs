//! 运算符语义
//!
//! 二元运算要求两侧种类完全一致，不做任何隐式转换：
//! 种类不同时抛出 `type mismatch`，种类相同但不支持该运算时抛出
//! `unknown operator`。两者都是可捕获异常。整数除零是致命错误。

use crate::error::{Fault, RuntimeError, RuntimeResult};
use crate::value::Value;
use std::fmt;

/// 二元运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // ===== 算术 =====
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Mod,

    // ===== 位运算 =====
    /// `a << b`
    Shl,
    /// `a >> b`
    Shr,
    /// `a & b`
    BitAnd,
    /// `a | b`
    BitOr,
    /// `a ^ b`
    BitXor,
    /// `a &^ b`（位清除）
    AndNot,

    // ===== 逻辑 =====
    /// `a and b`，两侧已求值
    And,
    /// `a or b`，两侧已求值
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::AndNot => "&^",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 比较运算符，编码为 COMPARE 指令的单字节操作数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareOp {
    Lt = 0,
    Gt = 1,
    Eq = 2,
    Ne = 3,
    Le = 4,
    Ge = 5,
}

impl CompareOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CompareOp::Lt),
            1 => Some(CompareOp::Gt),
            2 => Some(CompareOp::Eq),
            3 => Some(CompareOp::Ne),
            4 => Some(CompareOp::Le),
            5 => Some(CompareOp::Ge),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }

    fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }

    fn apply<T: PartialOrd>(&self, left: T, right: T) -> bool {
        match self {
            CompareOp::Lt => left < right,
            CompareOp::Gt => left > right,
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            CompareOp::Le => left <= right,
            CompareOp::Ge => left >= right,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ==================== 错误构造 ====================

fn type_mismatch(left: &Value, op: &str, right: &Value) -> RuntimeError {
    RuntimeError::exception(format!(
        "type mismatch: {} {} {}",
        left.kind(),
        op,
        right.kind()
    ))
}

fn unknown_operator(left: &Value, op: &str, right: &Value) -> RuntimeError {
    RuntimeError::exception(format!(
        "unknown operator: {} {} {}",
        left.kind(),
        op,
        right.kind()
    ))
}

// ==================== 二元运算 ====================

/// 计算 `left op right`
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => integer_binary(op, *a, *b),
        (Value::Float(a), Value::Float(b)) => float_binary(op, *a, *b)
            .map(Value::Float)
            .ok_or_else(|| unknown_operator(left, op.symbol(), right)),
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(a);
            joined.push_str(b);
            Ok(Value::from(joined))
        }
        (Value::Array(a), Value::Array(b)) if op == BinaryOp::Add => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::array(items))
        }
        (Value::Boolean(a), Value::Boolean(b)) => match op {
            BinaryOp::And => Ok(Value::Boolean(*a && *b)),
            BinaryOp::Or => Ok(Value::Boolean(*a || *b)),
            _ => Err(unknown_operator(left, op.symbol(), right)),
        },
        _ if left.kind() != right.kind() => Err(type_mismatch(left, op.symbol(), right)),
        _ => Err(unknown_operator(left, op.symbol(), right)),
    }
}

fn integer_binary(op: BinaryOp, a: i64, b: i64) -> RuntimeResult<Value> {
    let result = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(Fault::DivisionByZero.into());
            }
            a.wrapping_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(Fault::DivisionByZero.into());
            }
            a.wrapping_rem(b)
        }
        BinaryOp::Shl => shift_left(a, b)?,
        BinaryOp::Shr => shift_right(a, b)?,
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::AndNot => a & !b,
        BinaryOp::And | BinaryOp::Or => {
            return Err(unknown_operator(
                &Value::Integer(a),
                op.symbol(),
                &Value::Integer(b),
            ))
        }
    };
    Ok(Value::Integer(result))
}

fn shift_amount(b: i64) -> RuntimeResult<Option<u32>> {
    if b < 0 {
        return Err(RuntimeError::exception("Shift value must be non-negative"));
    }
    // None 表示移位量不小于 64
    Ok(u32::try_from(b).ok().filter(|s| *s < i64::BITS))
}

fn shift_left(a: i64, b: i64) -> RuntimeResult<i64> {
    Ok(match shift_amount(b)? {
        Some(s) => a << s,
        None => 0,
    })
}

fn shift_right(a: i64, b: i64) -> RuntimeResult<i64> {
    Ok(match shift_amount(b)? {
        Some(s) => a >> s,
        None if a < 0 => -1,
        None => 0,
    })
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div => Some(a / b),
        // 浮点取余（与 fmod 一致，符号随被除数）
        BinaryOp::Mod => Some(a % b),
        _ => None,
    }
}

// ==================== 比较 ====================

/// 计算 `left op right`，结果为布尔值
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> RuntimeResult<Value> {
    let result = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => op.apply(a, b),
        (Value::Float(a), Value::Float(b)) => op.apply(a, b),
        (Value::String(a), Value::String(b)) if op.is_equality() => op.apply(a, b),
        (Value::Boolean(a), Value::Boolean(b)) if op.is_equality() => op.apply(a, b),
        (Value::Null, Value::Null) if op.is_equality() => op == CompareOp::Eq,
        _ if left.kind() != right.kind() => return Err(type_mismatch(left, op.symbol(), right)),
        _ => return Err(unknown_operator(left, op.symbol(), right)),
    };
    Ok(Value::Boolean(result))
}

// ==================== 一元运算 ====================

/// 数值取负
pub fn negate(value: &Value) -> RuntimeResult<Value> {
    match value {
        Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
        Value::Float(n) => Ok(Value::Float(-n)),
        other => Err(RuntimeError::exception(format!(
            "unknown operator: -{}",
            other.kind()
        ))),
    }
}

/// 逻辑非，基于真值
pub fn not(value: &Value) -> Value {
    Value::Boolean(!value.is_truthy())
}
