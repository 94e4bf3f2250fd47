//! 索引与属性访问 (LOAD_INDEX / STORE_INDEX / LOAD_ATTRIBUTE / STORE_ATTRIBUTE)

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::Value;
use std::rc::Rc;

fn out_of_bounds(index: i64, len: usize) -> RuntimeError {
    RuntimeError::exception(format!("Index out of bounds: {index} (length {len})"))
}

/// 将整数索引转换为有效下标
fn position(index: i64, len: usize) -> RuntimeResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| out_of_bounds(index, len))
}

/// `target[index]`
///
/// 数组与字符串要求整数索引且不越界，映射要求字符串键，缺失的键得到 null。
pub fn load_index(target: &Value, index: &Value) -> RuntimeResult<Value> {
    match (target, index) {
        (Value::Array(items), Value::Integer(i)) => {
            let items = items.borrow();
            let at = position(*i, items.len())?;
            Ok(items[at].clone())
        }
        (Value::String(s), Value::Integer(i)) => {
            let len = s.chars().count();
            let at = position(*i, len)?;
            Ok(s.chars()
                .nth(at)
                .map(|c| Value::from(c.to_string()))
                .unwrap_or(Value::Null))
        }
        (Value::Map(entries), Value::String(key)) => {
            Ok(entries.borrow().get(&**key).cloned().unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::exception(format!(
            "index operator not supported: {}[{}]",
            target.kind(),
            index.kind()
        ))),
    }
}

/// 容器不能存入自身
fn reject_self_store(target: &Value, value: &Value) -> RuntimeResult<()> {
    let same = match (target, value) {
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
        _ => false,
    };
    if same {
        return Err(RuntimeError::exception(format!(
            "cannot store {} into itself",
            target.kind()
        )));
    }
    Ok(())
}

/// `target[index] = value`
pub fn store_index(target: &Value, index: &Value, value: Value) -> RuntimeResult<()> {
    reject_self_store(target, &value)?;
    match (target, index) {
        (Value::Array(items), Value::Integer(i)) => {
            let mut items = items.borrow_mut();
            let at = position(*i, items.len())?;
            items[at] = value;
            Ok(())
        }
        (Value::Map(entries), Value::String(key)) => {
            entries.borrow_mut().insert(key.to_string(), value);
            Ok(())
        }
        _ => Err(RuntimeError::exception(format!(
            "index assignment not supported: {}[{}]",
            target.kind(),
            index.kind()
        ))),
    }
}

/// `target.name`，只有映射支持属性
pub fn load_attribute(target: &Value, name: &str) -> RuntimeResult<Value> {
    match target {
        Value::Map(entries) => Ok(entries.borrow().get(name).cloned().unwrap_or(Value::Null)),
        other => Err(RuntimeError::exception(format!(
            "attribute access not supported on {}",
            other.kind()
        ))),
    }
}

/// `target.name = value`
pub fn store_attribute(target: &Value, name: &str, value: Value) -> RuntimeResult<()> {
    reject_self_store(target, &value)?;
    match target {
        Value::Map(entries) => {
            entries.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        other => Err(RuntimeError::exception(format!(
            "attribute assignment not supported on {}",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_array_index() {
        let arr = Value::array(vec![Value::Integer(10), Value::Integer(20)]);
        assert_eq!(load_index(&arr, &Value::Integer(1)).unwrap(), Value::Integer(20));
        store_index(&arr, &Value::Integer(0), Value::Integer(5)).unwrap();
        assert_eq!(arr.inspect(), "[5, 20]");
        assert_eq!(
            load_index(&arr, &Value::Integer(2)).unwrap_err(),
            RuntimeError::exception("Index out of bounds: 2 (length 2)")
        );
        assert!(load_index(&arr, &Value::Integer(-1)).is_err());
    }

    #[test]
    fn test_string_index() {
        let s = Value::string("héllo");
        assert_eq!(load_index(&s, &Value::Integer(1)).unwrap(), Value::string("é"));
        assert!(store_index(&s, &Value::Integer(0), Value::string("x")).is_err());
    }

    #[test]
    fn test_map_access() {
        let map = Value::map(BTreeMap::new());
        store_attribute(&map, "a", Value::Integer(1)).unwrap();
        store_index(&map, &Value::string("b"), Value::Integer(2)).unwrap();
        assert_eq!(load_attribute(&map, "b").unwrap(), Value::Integer(2));
        assert_eq!(load_index(&map, &Value::string("a")).unwrap(), Value::Integer(1));
        assert_eq!(load_attribute(&map, "missing").unwrap(), Value::Null);
    }

    #[test]
    fn test_self_store_rejected() {
        let arr = Value::array(vec![Value::Integer(1)]);
        assert_eq!(
            store_index(&arr, &Value::Integer(0), arr.clone()).unwrap_err(),
            RuntimeError::exception("cannot store ARRAY into itself")
        );
        assert_eq!(arr.inspect(), "[1]");

        let map = Value::map(BTreeMap::new());
        assert_eq!(
            store_attribute(&map, "me", map.clone()).unwrap_err(),
            RuntimeError::exception("cannot store MAP into itself")
        );
        assert!(store_index(&map, &Value::string("me"), map.clone()).is_err());

        // 内容相同的另一个容器可以存入
        let other = Value::array(vec![Value::Integer(1)]);
        store_index(&arr, &Value::Integer(0), other).unwrap();
        assert_eq!(arr.inspect(), "[[1]]");
    }

    #[test]
    fn test_unsupported_targets() {
        assert_eq!(
            load_attribute(&Value::Integer(1), "x").unwrap_err(),
            RuntimeError::exception("attribute access not supported on INTEGER")
        );
        assert_eq!(
            load_index(&Value::Null, &Value::Integer(0)).unwrap_err(),
            RuntimeError::exception("index operator not supported: NULL[INTEGER]")
        );
    }
}
