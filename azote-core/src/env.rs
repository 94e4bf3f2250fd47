//! 词法环境
//!
//! 环境是作用域链上的一个节点：本地绑定表加上可选的父环境。
//! 父环境通过 `Rc` 共享，多个子环境（函数帧、块作用域、闭包）可以指向同一个父环境。
//!
//! 查找类操作（`get`/`set`/`is_const`）沿链向上解析；
//! 定义类操作（`create`/`create_const`）只作用于本地，允许遮蔽外层同名绑定。

use crate::error::EnvError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// 共享的环境句柄
pub type Env = Rc<Environment>;

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    readonly: bool,
}

/// 作用域链节点
#[derive(Default)]
pub struct Environment {
    store: RefCell<HashMap<String, Binding>>,
    parent: RefCell<Option<Env>>,
}

impl Environment {
    /// 创建根环境
    pub fn new() -> Env {
        Rc::new(Self::default())
    }

    /// 创建以 `parent` 为父环境的新作用域
    pub fn enclose(parent: &Env) -> Env {
        Rc::new(Self {
            store: RefCell::new(HashMap::new()),
            parent: RefCell::new(Some(Rc::clone(parent))),
        })
    }

    pub fn parent(&self) -> Option<Env> {
        self.parent.borrow().clone()
    }

    pub fn set_parent(&self, parent: Option<Env>) {
        *self.parent.borrow_mut() = parent;
    }

    // ==================== 解析 ====================

    /// 沿作用域链查找第一个定义了 `name` 的绑定
    fn resolve<T>(&self, name: &str, read: impl Fn(&Binding) -> T) -> Option<T> {
        if let Some(binding) = self.store.borrow().get(name) {
            return Some(read(binding));
        }
        let mut current = self.parent();
        while let Some(env) = current {
            if let Some(binding) = env.store.borrow().get(name) {
                return Some(read(binding));
            }
            current = env.parent();
        }
        None
    }

    /// 读取变量，沿链向上查找
    pub fn get(&self, name: &str) -> Result<Value, EnvError> {
        self.resolve(name, |b| b.value.clone())
            .ok_or_else(|| EnvError::NotDefined(name.to_string()))
    }

    /// 只在本地查找
    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.store.borrow().get(name).map(|b| b.value.clone())
    }

    /// 名称在定义它的作用域中是否只读；未定义时为 false
    pub fn is_const(&self, name: &str) -> bool {
        self.resolve(name, |b| b.readonly).unwrap_or(false)
    }

    pub fn is_const_local(&self, name: &str) -> bool {
        self.store
            .borrow()
            .get(name)
            .map(|b| b.readonly)
            .unwrap_or(false)
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.store.borrow().contains_key(name)
    }

    // ==================== 定义 ====================

    /// 在本地定义可变绑定
    pub fn create(&self, name: &str, value: Value) -> Result<(), EnvError> {
        self.insert_new(name, value, false)
    }

    /// 在本地定义只读绑定
    pub fn create_const(&self, name: &str, value: Value) -> Result<(), EnvError> {
        self.insert_new(name, value, true)
    }

    fn insert_new(&self, name: &str, value: Value, readonly: bool) -> Result<(), EnvError> {
        let mut store = self.store.borrow_mut();
        if store.contains_key(name) {
            return Err(EnvError::AlreadyDefined(name.to_string()));
        }
        store.insert(name.to_string(), Binding { value, readonly });
        Ok(())
    }

    // ==================== 赋值 ====================

    /// 赋值给定义该名称的作用域
    pub fn set(&self, name: &str, value: Value) -> Result<(), EnvError> {
        if let Some(binding) = self.store.borrow_mut().get_mut(name) {
            return assign(name, binding, value);
        }
        let mut current = self.parent();
        while let Some(env) = current {
            if let Some(binding) = env.store.borrow_mut().get_mut(name) {
                return assign(name, binding, value);
            }
            current = env.parent();
        }
        Err(EnvError::NotDefined(name.to_string()))
    }

    /// 在本地强制写入，忽略只读标记
    ///
    /// 供参数绑定和循环变量重绑定使用。
    pub fn set_force(&self, name: &str, value: Value, readonly: bool) {
        self.store
            .borrow_mut()
            .insert(name.to_string(), Binding { value, readonly });
    }

    // ==================== 删除 ====================

    /// 只从本地删除
    pub fn unset_local(&self, name: &str) -> Option<Value> {
        self.store.borrow_mut().remove(name).map(|b| b.value)
    }

    /// 从定义该名称的作用域删除，找到第一个即停止
    pub fn unset(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.unset_local(name) {
            return Some(value);
        }
        let mut current = self.parent();
        while let Some(env) = current {
            if let Some(value) = env.unset_local(name) {
                return Some(value);
            }
            current = env.parent();
        }
        None
    }

    // ==================== 诊断 ====================

    /// 渲染整条作用域链，本地绑定按名称排序
    pub fn dump(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let mut out = String::new();
        {
            let store = self.store.borrow();
            let mut names: Vec<&String> = store.keys().collect();
            names.sort();
            for name in names {
                let binding = &store[name];
                let marker = if binding.readonly { " (const)" } else { "" };
                out.push_str(&format!(
                    "{pad}{name} = {}{marker}\n",
                    binding.value.inspect()
                ));
            }
        }
        if let Some(parent) = self.parent() {
            let label = if parent.parent().is_some() {
                "Parent"
            } else {
                "Global"
            };
            out.push_str(&format!("{pad}{label}:\n"));
            out.push_str(&parent.dump(indent + 2));
        }
        out
    }
}

fn assign(name: &str, binding: &mut Binding, value: Value) -> Result<(), EnvError> {
    if binding.readonly {
        return Err(EnvError::ConstantViolation(name.to_string()));
    }
    binding.value = value;
    Ok(())
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.store.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("has_parent", &self.parent.borrow().is_some())
            .finish()
    }
}
