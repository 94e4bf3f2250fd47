//! API 类型定义
//!
//! 执行的输出类型。

use azote_core::Value;

/// 执行输出
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOutput {
    /// 返回值
    pub value: Value,
    /// `print` 写入的输出
    pub stdout: String,
}
