//! 代码块构建器
//!
//! 编译期使用的去重表与指令发射器。表与标签只在构建期间存在，
//! `build` 之后产出不可变的 `CodeBlock`。
//!
//! 栈深度按发射顺序累计：每条指令的栈效应取其顺序执行路径上的效应，
//! 汇合点（如异常处理入口）需调用方通过 `bind_catch` / `adjust_stack` 修正。

use crate::bytecode::{write_u16, OpCode};
use crate::code_block::CodeBlock;
use crate::error::CompileError;
use crate::operators::{BinaryOp, CompareOp};
use crate::value::Value;
use azote_config::CompilerConfig;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// 16 位索引可寻址的最大条目数
pub const TABLE_LIMIT: usize = u16::MAX as usize + 1;

// ==================== 常量表 ====================

/// 可去重的字面量键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LiteralKey {
    Null,
    Boolean(bool),
    Integer(i64),
    /// 按位模式比较：0.0 与 -0.0 不同，相同 NaN 共享
    Float(u64),
    String(Rc<str>),
}

impl LiteralKey {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(LiteralKey::Null),
            Value::Boolean(b) => Some(LiteralKey::Boolean(*b)),
            Value::Integer(n) => Some(LiteralKey::Integer(*n)),
            Value::Float(n) => Some(LiteralKey::Float(n.to_bits())),
            Value::String(s) => Some(LiteralKey::String(Rc::clone(s))),
            _ => None,
        }
    }
}

/// 常量表
///
/// 标量字面量按 (种类, 值) 去重；数组、代码块等复合值每次都占用新槽位。
#[derive(Debug, Default)]
pub struct ConstantTable {
    values: Vec<Value>,
    index: HashMap<LiteralKey, u16>,
}

impl ConstantTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: Value) -> Result<u16, CompileError> {
        let key = LiteralKey::of(&value);
        if let Some(existing) = key.as_ref().and_then(|k| self.index.get(k)) {
            return Ok(*existing);
        }
        if self.values.len() >= TABLE_LIMIT {
            return Err(CompileError::TableOverflow {
                table: "constant",
                limit: TABLE_LIMIT,
            });
        }
        let slot = self.values.len() as u16;
        self.values.push(value);
        if let Some(key) = key {
            self.index.insert(key, slot);
        }
        Ok(slot)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.values
    }
}

// ==================== 名称表 ====================

/// 标识符表（名称表与局部变量表共用），线性查找去重
#[derive(Debug)]
pub struct StringTable {
    table: &'static str,
    entries: Vec<String>,
}

impl StringTable {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            entries: Vec::new(),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.entries
            .iter()
            .position(|entry| entry == name)
            .map(|i| i as u16)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn insert(&mut self, name: &str) -> Result<u16, CompileError> {
        if let Some(existing) = self.index_of(name) {
            return Ok(existing);
        }
        if self.entries.len() >= TABLE_LIMIT {
            return Err(CompileError::TableOverflow {
                table: self.table,
                limit: TABLE_LIMIT,
            });
        }
        self.entries.push(name.to_string());
        Ok((self.entries.len() - 1) as u16)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.entries
    }
}

// ==================== 构建器 ====================

/// 跳转目标标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug, Clone, Copy)]
enum PatchKind {
    Absolute,
    /// 相对于操作数之后的位置
    Forward,
}

#[derive(Debug)]
struct Patch {
    at: usize,
    label: Label,
    kind: PatchKind,
}

/// 代码块构建器
#[derive(Debug)]
pub struct CodeBlockBuilder {
    name: String,
    filename: String,
    emit_debug_info: bool,
    code: Vec<u8>,
    constants: ConstantTable,
    names: StringTable,
    locals: StringTable,
    labels: Vec<Option<usize>>,
    patches: Vec<Patch>,
    stack_depth: usize,
    max_stack: usize,
    block_depth: usize,
    max_block: usize,
}

impl CodeBlockBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: "<unknown>".to_string(),
            emit_debug_info: true,
            code: Vec::new(),
            constants: ConstantTable::new(),
            names: StringTable::new("name"),
            locals: StringTable::new("local"),
            labels: Vec::new(),
            patches: Vec::new(),
            stack_depth: 0,
            max_stack: 0,
            block_depth: 0,
            max_block: 0,
        }
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_config(mut self, config: &CompilerConfig) -> Self {
        self.emit_debug_info = config.emit_debug_info;
        self
    }

    /// 当前发射位置
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// 当前累计的栈深度
    pub fn stack_depth(&self) -> usize {
        self.stack_depth
    }

    // ==================== 表 ====================

    pub fn add_constant(&mut self, value: Value) -> Result<u16, CompileError> {
        self.constants.insert(value)
    }

    pub fn add_name(&mut self, name: &str) -> Result<u16, CompileError> {
        self.names.insert(name)
    }

    pub fn add_local(&mut self, name: &str) -> Result<u16, CompileError> {
        self.locals.insert(name)
    }

    // ==================== 发射 ====================

    /// 发射无操作数指令
    pub fn emit(&mut self, op: OpCode) -> Result<(), CompileError> {
        if op.operand_size() != 0 {
            return Err(CompileError::OperandOutOfRange {
                opcode: op.name(),
                operand: 0,
                width: op.operand_size(),
            });
        }
        self.code.push(op as u8);
        self.account(op, 0);
        Ok(())
    }

    /// 发射单操作数指令（1 或 2 字节宽）
    pub fn emit_arg(&mut self, op: OpCode, arg: usize) -> Result<(), CompileError> {
        let width = op.operand_size();
        let fits = match width {
            1 => arg <= u8::MAX as usize,
            2 => arg <= u16::MAX as usize,
            _ => false,
        };
        if !fits {
            return Err(CompileError::OperandOutOfRange {
                opcode: op.name(),
                operand: arg,
                width,
            });
        }
        self.code.push(op as u8);
        if width == 1 {
            self.code.push(arg as u8);
        } else {
            self.code.extend_from_slice(&write_u16(arg as u16));
        }
        self.account(op, arg);
        Ok(())
    }

    pub fn load_const(&mut self, value: impl Into<Value>) -> Result<(), CompileError> {
        let index = self.add_constant(value.into())?;
        self.emit_arg(OpCode::LoadConst, index as usize)
    }

    /// 对局部槽位的访问：LOAD_FAST、STORE_FAST、STORE_CONST、DEFINE、DELETE_FAST
    pub fn local_op(&mut self, op: OpCode, name: &str) -> Result<(), CompileError> {
        let index = self.add_local(name)?;
        self.emit_arg(op, index as usize)
    }

    /// 对名称表的访问：LOAD_GLOBAL、STORE_GLOBAL、DELETE_GLOBAL、LOAD_ATTRIBUTE、STORE_ATTRIBUTE
    pub fn name_op(&mut self, op: OpCode, name: &str) -> Result<(), CompileError> {
        let index = self.add_name(name)?;
        self.emit_arg(op, index as usize)
    }

    pub fn binary(&mut self, op: BinaryOp) -> Result<(), CompileError> {
        self.emit(OpCode::for_binary(op))
    }

    pub fn compare(&mut self, op: CompareOp) -> Result<(), CompileError> {
        self.emit_arg(OpCode::Compare, op as usize)
    }

    pub fn call(&mut self, argc: usize) -> Result<(), CompileError> {
        self.emit_arg(OpCode::Call, argc)
    }

    // ==================== 标签与跳转 ====================

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// 将标签绑定到当前位置
    pub fn bind(&mut self, label: Label) {
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(self.code.len());
        }
    }

    /// 绑定异常处理入口：展开时异常值会被压入栈
    pub fn bind_catch(&mut self, label: Label) {
        self.bind(label);
        self.adjust_stack(1);
    }

    /// 绝对目标跳转（JUMP_ABSOLUTE、条件跳转、START_TRY）
    pub fn jump(&mut self, op: OpCode, label: Label) -> Result<(), CompileError> {
        if !op.has_absolute_target() {
            return Err(CompileError::OperandOutOfRange {
                opcode: op.name(),
                operand: label.0,
                width: op.operand_size(),
            });
        }
        self.emit_arg(op, 0)?;
        self.patches.push(Patch {
            at: self.code.len() - 2,
            label,
            kind: PatchKind::Absolute,
        });
        Ok(())
    }

    /// 相对前向跳转
    pub fn jump_forward(&mut self, label: Label) -> Result<(), CompileError> {
        self.emit_arg(OpCode::JumpForward, 0)?;
        self.patches.push(Patch {
            at: self.code.len() - 2,
            label,
            kind: PatchKind::Forward,
        });
        Ok(())
    }

    /// START_LOOP：`iter` 为 continue 目标，`end` 为 break 目标
    pub fn start_loop(&mut self, iter: Label, end: Label) -> Result<(), CompileError> {
        self.code.push(OpCode::StartLoop as u8);
        let at = self.code.len();
        self.code.extend_from_slice(&[0, 0, 0, 0]);
        self.patches.push(Patch {
            at,
            label: iter,
            kind: PatchKind::Absolute,
        });
        self.patches.push(Patch {
            at: at + 2,
            label: end,
            kind: PatchKind::Absolute,
        });
        self.account(OpCode::StartLoop, 0);
        Ok(())
    }

    pub fn start_try(&mut self, catch: Label) -> Result<(), CompileError> {
        self.jump(OpCode::StartTry, catch)
    }

    // ==================== 深度统计 ====================

    /// 手动修正栈深度（汇合点）
    pub fn adjust_stack(&mut self, delta: isize) {
        self.stack_depth = self.stack_depth.saturating_add_signed(delta);
        self.max_stack = self.max_stack.max(self.stack_depth);
    }

    fn account(&mut self, op: OpCode, arg: usize) {
        let delta = stack_effect(op, arg);
        self.adjust_stack(delta);
        match op {
            OpCode::StartLoop | OpCode::StartTry => {
                self.block_depth += 1;
                self.max_block = self.max_block.max(self.block_depth);
            }
            OpCode::EndBlock => self.block_depth = self.block_depth.saturating_sub(1),
            _ => {}
        }
    }

    // ==================== 完成 ====================

    pub fn build(mut self) -> Result<CodeBlock, CompileError> {
        for patch in &self.patches {
            let target = self
                .labels
                .get(patch.label.0)
                .copied()
                .flatten()
                .ok_or(CompileError::UnboundLabel(patch.label.0))?;
            let operand = match patch.kind {
                PatchKind::Absolute => target,
                PatchKind::Forward => target
                    .checked_sub(patch.at + 2)
                    .ok_or(CompileError::JumpOutOfRange(target))?,
            };
            let operand = u16::try_from(operand).map_err(|_| CompileError::JumpOutOfRange(target))?;
            self.code[patch.at..patch.at + 2].copy_from_slice(&write_u16(operand));
        }

        let filename = if self.emit_debug_info {
            self.filename
        } else {
            "<unknown>".to_string()
        };
        let block = CodeBlock {
            name: self.name,
            filename,
            code: self.code,
            constants: self.constants.into_vec(),
            names: self.names.into_vec(),
            locals: self.locals.into_vec(),
            max_stack_size: self.max_stack,
            max_block_size: self.max_block,
        };
        debug!(
            target: "azote::compiler",
            name = %block.name,
            bytes = block.code.len(),
            constants = block.constants.len(),
            max_stack = block.max_stack_size,
            max_blocks = block.max_block_size,
            "code block built"
        );
        Ok(block)
    }
}

/// 顺序执行路径上的栈效应
fn stack_effect(op: OpCode, arg: usize) -> isize {
    use OpCode::*;
    let arg = arg as isize;
    match op {
        Noop | DeleteFast | DeleteGlobal | LoadAttribute | UnaryNeg | UnaryNot | JumpAbsolute
        | JumpForward | StartLoop | EndBlock | Break | Continue | StartTry | OpenScope
        | CloseScope => 0,
        DupTop | LoadConst | LoadFast | LoadGlobal => 1,
        PopTop | StoreFast | StoreConst | Define | StoreGlobal | LoadIndex | Compare
        | PopJumpIfTrue | PopJumpIfFalse | JumpIfTrueOrPop | JumpIfFalseOrPop | Throw | Return => {
            -1
        }
        BinaryAdd | BinarySub | BinaryMul | BinaryDivide | BinaryMod | BinaryShiftL
        | BinaryShiftR | BinaryAnd | BinaryOr | BinaryXor | BinaryAndNot | BinaryLogicAnd
        | BinaryLogicOr => -1,
        StoreAttribute | MakeFunction => -2,
        StoreIndex => -3,
        MakeArray => 1 - arg,
        MakeMap => 1 - 2 * arg,
        Call => -arg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_dedup_for_literals() {
        let mut table = ConstantTable::new();
        assert_eq!(table.insert(Value::Integer(1)).unwrap(), 0);
        assert_eq!(table.insert(Value::string("a")).unwrap(), 1);
        assert_eq!(table.insert(Value::Integer(1)).unwrap(), 0);
        assert_eq!(table.insert(Value::string("a")).unwrap(), 1);
        assert_eq!(table.insert(Value::Null).unwrap(), 2);
        assert_eq!(table.insert(Value::Null).unwrap(), 2);
        assert_eq!(table.insert(Value::Boolean(true)).unwrap(), 3);
        // 种类不同不合并
        assert_eq!(table.insert(Value::Float(1.0)).unwrap(), 4);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_float_dedup_by_bits() {
        let mut table = ConstantTable::new();
        let zero = table.insert(Value::Float(0.0)).unwrap();
        let neg_zero = table.insert(Value::Float(-0.0)).unwrap();
        assert_ne!(zero, neg_zero);
        let nan = table.insert(Value::Float(f64::NAN)).unwrap();
        assert_eq!(table.insert(Value::Float(f64::NAN)).unwrap(), nan);
    }

    #[test]
    fn test_compound_constants_never_dedup() {
        let mut table = ConstantTable::new();
        let a = table.insert(Value::array(vec![])).unwrap();
        let b = table.insert(Value::array(vec![])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_constant_table_overflow() {
        let mut table = ConstantTable::new();
        for _ in 0..TABLE_LIMIT {
            table.insert(Value::array(vec![])).unwrap();
        }
        assert_eq!(
            table.insert(Value::Integer(7)),
            Err(CompileError::TableOverflow {
                table: "constant",
                limit: TABLE_LIMIT
            })
        );
    }

    #[test]
    fn test_string_table() {
        let mut names = StringTable::new("name");
        assert_eq!(names.insert("x").unwrap(), 0);
        assert_eq!(names.insert("y").unwrap(), 1);
        assert_eq!(names.insert("x").unwrap(), 0);
        assert!(names.contains("y"));
        assert_eq!(names.index_of("z"), None);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_labels_and_jumps() {
        let mut b = CodeBlockBuilder::new("jumps");
        let end = b.new_label();
        let skip = b.new_label();
        b.load_const(true).unwrap(); // 0..3
        b.jump(OpCode::PopJumpIfFalse, end).unwrap(); // 3..6
        b.jump_forward(skip).unwrap(); // 6..9
        b.emit(OpCode::Noop).unwrap(); // 9
        b.bind(skip);
        b.bind(end);
        b.emit(OpCode::Return).unwrap(); // 10
        let block = b.build().unwrap();
        assert_eq!(&block.code[3..6], &[0x53, 0x00, 0x0a]);
        // 9 之后到 10：偏移 1
        assert_eq!(&block.code[6..9], &[0x51, 0x00, 0x01]);
    }

    #[test]
    fn test_unbound_label() {
        let mut b = CodeBlockBuilder::new("bad");
        let label = b.new_label();
        b.jump(OpCode::JumpAbsolute, label).unwrap();
        assert_eq!(b.build(), Err(CompileError::UnboundLabel(0)));
    }

    #[test]
    fn test_backward_forward_jump_rejected() {
        let mut b = CodeBlockBuilder::new("bad");
        let top = b.new_label();
        b.bind(top);
        b.jump_forward(top).unwrap();
        assert_eq!(b.build(), Err(CompileError::JumpOutOfRange(0)));
    }

    #[test]
    fn test_depth_accounting() {
        let mut b = CodeBlockBuilder::new("depth");
        let iter = b.new_label();
        let end = b.new_label();
        let catch = b.new_label();
        b.start_loop(iter, end).unwrap();
        b.bind(iter);
        b.start_try(catch).unwrap();
        b.load_const(Value::Integer(1)).unwrap();
        b.load_const(Value::Integer(2)).unwrap();
        b.load_const(Value::Integer(3)).unwrap();
        b.emit_arg(OpCode::MakeArray, 3).unwrap();
        b.emit(OpCode::PopTop).unwrap();
        b.emit(OpCode::EndBlock).unwrap();
        b.bind_catch(catch);
        b.emit(OpCode::PopTop).unwrap();
        b.emit(OpCode::EndBlock).unwrap();
        b.bind(end);
        let block = b.build().unwrap();
        assert_eq!(block.max_stack_size, 3);
        assert_eq!(block.max_block_size, 2);
    }

    #[test]
    fn test_operand_range_checks() {
        let mut b = CodeBlockBuilder::new("range");
        assert!(matches!(
            b.emit(OpCode::LoadConst),
            Err(CompileError::OperandOutOfRange { .. })
        ));
        assert!(matches!(
            b.emit_arg(OpCode::Call, 70_000),
            Err(CompileError::OperandOutOfRange { operand: 70_000, .. })
        ));
        assert!(b.jump(OpCode::Call, Label(0)).is_err());
    }

    #[test]
    fn test_debug_info_toggle() {
        let config = CompilerConfig {
            emit_debug_info: false,
        };
        let block = CodeBlockBuilder::new("f")
            .filename("script.az")
            .with_config(&config)
            .build()
            .unwrap();
        assert_eq!(block.filename, "<unknown>");
        let block = CodeBlockBuilder::new("f").filename("script.az").build().unwrap();
        assert_eq!(block.filename, "script.az");
    }
}
