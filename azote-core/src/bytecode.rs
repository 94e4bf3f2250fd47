//! 指令集定义
//!
//! 每条指令由一个操作码字节和固定宽度的大端操作数组成，
//! 操作数宽度只由操作码决定（0、1、2 或 4 字节）。

use crate::error::Fault;
use crate::operators::BinaryOp;

/// 操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // ===== 栈操作 =====
    Noop = 0x00,
    PopTop = 0x01,
    DupTop = 0x02,

    // ===== 加载与存储 =====
    LoadConst = 0x10,
    LoadFast = 0x11,
    StoreFast = 0x12,
    StoreConst = 0x13,
    Define = 0x14,
    DeleteFast = 0x15,
    LoadGlobal = 0x16,
    StoreGlobal = 0x17,
    DeleteGlobal = 0x18,
    LoadAttribute = 0x19,
    StoreAttribute = 0x1A,
    LoadIndex = 0x1B,
    StoreIndex = 0x1C,

    // ===== 二元运算 =====
    BinaryAdd = 0x20,
    BinarySub = 0x21,
    BinaryMul = 0x22,
    BinaryDivide = 0x23,
    BinaryMod = 0x24,
    BinaryShiftL = 0x25,
    BinaryShiftR = 0x26,
    BinaryAnd = 0x27,
    BinaryOr = 0x28,
    BinaryXor = 0x29,
    BinaryAndNot = 0x2A,
    BinaryLogicAnd = 0x2B,
    BinaryLogicOr = 0x2C,

    // ===== 一元运算 =====
    UnaryNeg = 0x30,
    UnaryNot = 0x31,

    Compare = 0x38,

    // ===== 构造 =====
    MakeArray = 0x40,
    MakeMap = 0x41,
    MakeFunction = 0x42,

    // ===== 跳转 =====
    JumpAbsolute = 0x50,
    JumpForward = 0x51,
    PopJumpIfTrue = 0x52,
    PopJumpIfFalse = 0x53,
    JumpIfTrueOrPop = 0x54,
    JumpIfFalseOrPop = 0x55,

    // ===== 块栈 =====
    StartLoop = 0x60,
    EndBlock = 0x61,
    Break = 0x62,
    Continue = 0x63,
    StartTry = 0x64,
    Throw = 0x65,
    OpenScope = 0x66,
    CloseScope = 0x67,

    // ===== 调用 =====
    Call = 0x70,
    Return = 0x71,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use OpCode::*;
        let op = match byte {
            0x00 => Noop,
            0x01 => PopTop,
            0x02 => DupTop,
            0x10 => LoadConst,
            0x11 => LoadFast,
            0x12 => StoreFast,
            0x13 => StoreConst,
            0x14 => Define,
            0x15 => DeleteFast,
            0x16 => LoadGlobal,
            0x17 => StoreGlobal,
            0x18 => DeleteGlobal,
            0x19 => LoadAttribute,
            0x1A => StoreAttribute,
            0x1B => LoadIndex,
            0x1C => StoreIndex,
            0x20 => BinaryAdd,
            0x21 => BinarySub,
            0x22 => BinaryMul,
            0x23 => BinaryDivide,
            0x24 => BinaryMod,
            0x25 => BinaryShiftL,
            0x26 => BinaryShiftR,
            0x27 => BinaryAnd,
            0x28 => BinaryOr,
            0x29 => BinaryXor,
            0x2A => BinaryAndNot,
            0x2B => BinaryLogicAnd,
            0x2C => BinaryLogicOr,
            0x30 => UnaryNeg,
            0x31 => UnaryNot,
            0x38 => Compare,
            0x40 => MakeArray,
            0x41 => MakeMap,
            0x42 => MakeFunction,
            0x50 => JumpAbsolute,
            0x51 => JumpForward,
            0x52 => PopJumpIfTrue,
            0x53 => PopJumpIfFalse,
            0x54 => JumpIfTrueOrPop,
            0x55 => JumpIfFalseOrPop,
            0x60 => StartLoop,
            0x61 => EndBlock,
            0x62 => Break,
            0x63 => Continue,
            0x64 => StartTry,
            0x65 => Throw,
            0x66 => OpenScope,
            0x67 => CloseScope,
            0x70 => Call,
            0x71 => Return,
            _ => return None,
        };
        Some(op)
    }

    /// 获取操作码名称
    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Noop => "NOOP",
            PopTop => "POP_TOP",
            DupTop => "DUP_TOP",
            LoadConst => "LOAD_CONST",
            LoadFast => "LOAD_FAST",
            StoreFast => "STORE_FAST",
            StoreConst => "STORE_CONST",
            Define => "DEFINE",
            DeleteFast => "DELETE_FAST",
            LoadGlobal => "LOAD_GLOBAL",
            StoreGlobal => "STORE_GLOBAL",
            DeleteGlobal => "DELETE_GLOBAL",
            LoadAttribute => "LOAD_ATTRIBUTE",
            StoreAttribute => "STORE_ATTRIBUTE",
            LoadIndex => "LOAD_INDEX",
            StoreIndex => "STORE_INDEX",
            BinaryAdd => "BINARY_ADD",
            BinarySub => "BINARY_SUB",
            BinaryMul => "BINARY_MUL",
            BinaryDivide => "BINARY_DIVIDE",
            BinaryMod => "BINARY_MOD",
            BinaryShiftL => "BINARY_SHIFTL",
            BinaryShiftR => "BINARY_SHIFTR",
            BinaryAnd => "BINARY_AND",
            BinaryOr => "BINARY_OR",
            BinaryXor => "BINARY_XOR",
            BinaryAndNot => "BINARY_ANDNOT",
            BinaryLogicAnd => "BINARY_LOGIC_AND",
            BinaryLogicOr => "BINARY_LOGIC_OR",
            UnaryNeg => "UNARY_NEG",
            UnaryNot => "UNARY_NOT",
            Compare => "COMPARE",
            MakeArray => "MAKE_ARRAY",
            MakeMap => "MAKE_MAP",
            MakeFunction => "MAKE_FUNCTION",
            JumpAbsolute => "JUMP_ABSOLUTE",
            JumpForward => "JUMP_FORWARD",
            PopJumpIfTrue => "POP_JUMP_IF_TRUE",
            PopJumpIfFalse => "POP_JUMP_IF_FALSE",
            JumpIfTrueOrPop => "JUMP_IF_TRUE_OR_POP",
            JumpIfFalseOrPop => "JUMP_IF_FALSE_OR_POP",
            StartLoop => "START_LOOP",
            EndBlock => "END_BLOCK",
            Break => "BREAK",
            Continue => "CONTINUE",
            StartTry => "START_TRY",
            Throw => "THROW",
            OpenScope => "OPEN_SCOPE",
            CloseScope => "CLOSE_SCOPE",
            Call => "CALL",
            Return => "RETURN",
        }
    }

    /// 操作数字节数
    pub fn operand_size(&self) -> usize {
        use OpCode::*;
        match self {
            Compare => 1,
            LoadConst | LoadFast | StoreFast | StoreConst | Define | DeleteFast | LoadGlobal
            | StoreGlobal | DeleteGlobal | LoadAttribute | StoreAttribute | MakeArray | MakeMap
            | JumpAbsolute | JumpForward | PopJumpIfTrue | PopJumpIfFalse | JumpIfTrueOrPop
            | JumpIfFalseOrPop | StartTry | Call => 2,
            StartLoop => 4,
            _ => 0,
        }
    }

    /// 二元运算指令对应的运算符
    pub fn binary_op(&self) -> Option<BinaryOp> {
        use OpCode::*;
        let op = match self {
            BinaryAdd => BinaryOp::Add,
            BinarySub => BinaryOp::Sub,
            BinaryMul => BinaryOp::Mul,
            BinaryDivide => BinaryOp::Div,
            BinaryMod => BinaryOp::Mod,
            BinaryShiftL => BinaryOp::Shl,
            BinaryShiftR => BinaryOp::Shr,
            BinaryAnd => BinaryOp::BitAnd,
            BinaryOr => BinaryOp::BitOr,
            BinaryXor => BinaryOp::BitXor,
            BinaryAndNot => BinaryOp::AndNot,
            BinaryLogicAnd => BinaryOp::And,
            BinaryLogicOr => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    /// 运算符对应的二元运算指令
    pub fn for_binary(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => OpCode::BinaryAdd,
            BinaryOp::Sub => OpCode::BinarySub,
            BinaryOp::Mul => OpCode::BinaryMul,
            BinaryOp::Div => OpCode::BinaryDivide,
            BinaryOp::Mod => OpCode::BinaryMod,
            BinaryOp::Shl => OpCode::BinaryShiftL,
            BinaryOp::Shr => OpCode::BinaryShiftR,
            BinaryOp::BitAnd => OpCode::BinaryAnd,
            BinaryOp::BitOr => OpCode::BinaryOr,
            BinaryOp::BitXor => OpCode::BinaryXor,
            BinaryOp::AndNot => OpCode::BinaryAndNot,
            BinaryOp::And => OpCode::BinaryLogicAnd,
            BinaryOp::Or => OpCode::BinaryLogicOr,
        }
    }

    /// 操作数为绝对跳转目标的指令
    pub fn has_absolute_target(&self) -> bool {
        use OpCode::*;
        matches!(
            self,
            JumpAbsolute
                | PopJumpIfTrue
                | PopJumpIfFalse
                | JumpIfTrueOrPop
                | JumpIfFalseOrPop
                | StartTry
        )
    }
}

/// 解码后的操作数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    Byte(u8),
    Short(u16),
    /// START_LOOP 的 (iter, end)
    Pair(u16, u16),
}

/// 一条解码后的指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// 操作码所在偏移
    pub offset: usize,
    pub opcode: OpCode,
    pub operand: Operand,
}

impl Instruction {
    /// 指令总字节数
    pub fn len(&self) -> usize {
        1 + self.opcode.operand_size()
    }

    /// 下一条指令的偏移
    pub fn next_offset(&self) -> usize {
        self.offset + self.len()
    }

    /// 单值操作数（无操作数时为 0）
    pub fn arg(&self) -> usize {
        match self.operand {
            Operand::None => 0,
            Operand::Byte(b) => b as usize,
            Operand::Short(s) => s as usize,
            Operand::Pair(first, _) => first as usize,
        }
    }
}

/// 大端 16 位解码
pub fn read_u16(high: u8, low: u8) -> u16 {
    (u16::from(high) << 8) | u16::from(low)
}

/// 大端 16 位编码
pub fn write_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// 解码 `offset` 处的指令
pub fn decode_at(code: &[u8], offset: usize) -> Result<Instruction, Fault> {
    let byte = *code
        .get(offset)
        .ok_or(Fault::TruncatedInstruction { offset })?;
    let opcode = OpCode::from_byte(byte).ok_or(Fault::InvalidOpcode {
        opcode: byte,
        offset,
    })?;
    let width = opcode.operand_size();
    let bytes = code
        .get(offset + 1..offset + 1 + width)
        .ok_or(Fault::TruncatedInstruction { offset })?;
    let operand = match *bytes {
        [] => Operand::None,
        [b] => Operand::Byte(b),
        [hi, lo] => Operand::Short(read_u16(hi, lo)),
        [a, b, c, d] => Operand::Pair(read_u16(a, b), read_u16(c, d)),
        _ => return Err(Fault::TruncatedInstruction { offset }),
    };
    Ok(Instruction {
        offset,
        opcode,
        operand,
    })
}
