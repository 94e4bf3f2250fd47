//! 代码块：编译产物

use crate::bytecode::{decode_at, Instruction, OpCode, Operand};
use crate::error::Fault;
use crate::operators::CompareOp;
use crate::value::Value;
use tracing::debug;

/// 编译后的函数或脚本体，构建完成后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub name: String,
    /// 源文件标记（诊断用）
    pub filename: String,
    /// 指令字节流
    pub code: Vec<u8>,
    /// 常量表
    pub constants: Vec<Value>,
    /// 名称表（全局变量与属性访问）
    pub names: Vec<String>,
    /// 局部变量名，按槽位排列
    pub locals: Vec<String>,
    /// 操作数栈最大深度
    pub max_stack_size: usize,
    /// 块栈最大深度
    pub max_block_size: usize,
}

impl CodeBlock {
    /// 局部槽位数
    pub fn local_count(&self) -> usize {
        self.locals.len()
    }

    pub fn constant(&self, index: usize) -> Result<&Value, Fault> {
        self.constants.get(index).ok_or(Fault::ConstantOutOfBounds {
            index,
            len: self.constants.len(),
        })
    }

    pub fn name_at(&self, index: usize) -> Result<&str, Fault> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(Fault::NameOutOfBounds {
                index,
                len: self.names.len(),
            })
    }

    pub fn local_name(&self, index: usize) -> Result<&str, Fault> {
        self.locals
            .get(index)
            .map(String::as_str)
            .ok_or(Fault::LocalOutOfBounds {
                index,
                len: self.locals.len(),
            })
    }

    /// 顺序解码全部指令
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            code: &self.code,
            offset: 0,
            failed: false,
        }
    }

    // ==================== 反汇编 ====================

    /// 反汇编为文本；常量表中嵌套的代码块随后依次输出
    pub fn disassemble(&self) -> Result<String, Fault> {
        let mut out = String::new();
        self.write_disassembly(&mut out, 0)?;
        Ok(out)
    }

    fn write_disassembly(&self, out: &mut String, indent: usize) -> Result<(), Fault> {
        let pad = " ".repeat(indent);
        out.push_str(&format!("{pad}== {} ({}) ==\n", self.name, self.filename));
        out.push_str(&format!(
            "{pad}locals: {}  max stack: {}  max blocks: {}\n",
            self.local_count(),
            self.max_stack_size,
            self.max_block_size
        ));
        for instruction in self.instructions() {
            let instruction = instruction?;
            out.push_str(&format!("{pad}{}\n", self.render(&instruction)?));
        }
        for constant in &self.constants {
            if let Value::CodeBlock(inner) = constant {
                out.push('\n');
                inner.write_disassembly(out, indent + 2)?;
            }
        }
        Ok(())
    }

    /// 单条指令的文本形式：偏移、助记符、操作数及其含义
    pub fn render(&self, instruction: &Instruction) -> Result<String, Fault> {
        let offset = instruction.offset;
        let name = instruction.opcode.name();
        let arg = instruction.arg();
        let detail = match (instruction.opcode, instruction.operand) {
            (_, Operand::None) => return Ok(format!("{offset:04} {name}")),
            (OpCode::LoadConst, _) => self.constant(arg)?.inspect(),
            (
                OpCode::LoadFast
                | OpCode::StoreFast
                | OpCode::StoreConst
                | OpCode::Define
                | OpCode::DeleteFast,
                _,
            ) => self.local_name(arg)?.to_string(),
            (
                OpCode::LoadGlobal
                | OpCode::StoreGlobal
                | OpCode::DeleteGlobal
                | OpCode::LoadAttribute
                | OpCode::StoreAttribute,
                _,
            ) => self.name_at(arg)?.to_string(),
            (OpCode::Compare, Operand::Byte(b)) => CompareOp::from_byte(b)
                .map(|op| op.symbol().to_string())
                .unwrap_or_else(|| "?".to_string()),
            (OpCode::JumpForward, _) => format!("to {}", instruction.next_offset() + arg),
            (op, _) if op.has_absolute_target() => format!("to {arg}"),
            (OpCode::StartLoop, Operand::Pair(iter, end)) => {
                return Ok(format!(
                    "{offset:04} {name:<22}{iter} {end} (iter {iter}, end {end})"
                ))
            }
            (OpCode::Call, _) => format!("{arg} positional"),
            (OpCode::MakeArray, _) => format!("{arg} items"),
            (OpCode::MakeMap, _) => format!("{arg} pairs"),
            _ => String::new(),
        };
        Ok(format!("{offset:04} {name:<22}{arg} ({detail})"))
    }

    /// 以 debug 级别输出反汇编
    pub fn log_disassembly(&self) {
        match self.disassemble() {
            Ok(text) => {
                for line in text.lines() {
                    debug!(target: "azote::compiler", "{}", line);
                }
            }
            Err(fault) => debug!(target: "azote::compiler", %fault, "disassembly failed"),
        }
    }
}

/// 指令迭代器，遇到第一个解码错误后停止
pub struct Instructions<'a> {
    code: &'a [u8],
    offset: usize,
    failed: bool,
}

impl Iterator for Instructions<'_> {
    type Item = Result<Instruction, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.code.len() {
            return None;
        }
        match decode_at(self.code, self.offset) {
            Ok(instruction) => {
                self.offset = instruction.next_offset();
                Some(Ok(instruction))
            }
            Err(fault) => {
                self.failed = true;
                Some(Err(fault))
            }
        }
    }
}
