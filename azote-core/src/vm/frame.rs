//! 调用帧与块栈

use crate::code_block::CodeBlock;
use crate::env::Env;
use crate::error::Fault;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// 块的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Loop,
    Handler,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Loop => f.write_str("loop"),
            BlockKind::Handler => f.write_str("handler"),
        }
    }
}

/// 块栈条目
///
/// `sp` 与 `scope` 记录进入块时的操作数栈高度和环境，
/// break/continue 与异常展开据此恢复。
#[derive(Debug, Clone)]
pub enum Block {
    Loop {
        /// 循环体起点
        start: usize,
        /// continue 目标
        iter: usize,
        /// break 目标
        end: usize,
        sp: usize,
        scope: Env,
    },
    Handler {
        catch: usize,
        sp: usize,
        scope: Env,
    },
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Loop { .. } => BlockKind::Loop,
            Block::Handler { .. } => BlockKind::Handler,
        }
    }
}

/// 一次代码块激活
pub struct Frame {
    code: Rc<CodeBlock>,
    stack: Vec<Value>,
    stack_capacity: usize,
    blocks: Vec<Block>,
    block_capacity: usize,
    /// 下一条指令的偏移
    pub pc: usize,
    /// 正在执行的指令偏移（回溯用）
    pub last_offset: usize,
    pub env: Env,
}

impl Frame {
    /// 按代码块声明的深度预分配两个栈
    pub fn new(code: Rc<CodeBlock>, env: Env) -> Self {
        let stack_capacity = code.max_stack_size;
        let block_capacity = code.max_block_size;
        Self {
            stack: Vec::with_capacity(stack_capacity),
            stack_capacity,
            blocks: Vec::with_capacity(block_capacity),
            block_capacity,
            code,
            pc: 0,
            last_offset: 0,
            env,
        }
    }

    pub fn code(&self) -> &Rc<CodeBlock> {
        &self.code
    }

    // ==================== 操作数栈 ====================

    pub fn push(&mut self, value: Value) -> Result<(), Fault> {
        if self.stack.len() >= self.stack_capacity {
            return Err(Fault::StackOverflow {
                capacity: self.stack_capacity,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        self.stack.pop().ok_or(Fault::StackExhausted)
    }

    pub fn peek(&self) -> Result<&Value, Fault> {
        self.stack.last().ok_or(Fault::StackExhausted)
    }

    /// 弹出 `n` 个值，按压栈顺序返回
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, Fault> {
        let len = self.stack.len();
        if n > len {
            return Err(Fault::StackExhausted);
        }
        Ok(self.stack.split_off(len - n))
    }

    /// 栈指针（当前高度）
    pub fn sp(&self) -> usize {
        self.stack.len()
    }

    pub fn truncate(&mut self, sp: usize) {
        self.stack.truncate(sp);
    }

    /// 渲染操作数栈，栈顶在前
    pub fn dump_stack(&self) -> String {
        let mut out = format!("Stack (sp={}, capacity={}):\n", self.sp(), self.stack_capacity);
        for (i, value) in self.stack.iter().enumerate().rev() {
            out.push_str(&format!("  [{i}] {}\n", value.inspect()));
        }
        out
    }

    // ==================== 块栈 ====================

    pub fn push_block(&mut self, block: Block) -> Result<(), Fault> {
        if self.blocks.len() >= self.block_capacity {
            return Err(Fault::BlockStackOverflow {
                capacity: self.block_capacity,
            });
        }
        self.blocks.push(block);
        Ok(())
    }

    pub fn pop_block(&mut self) -> Result<Block, Fault> {
        self.blocks.pop().ok_or(Fault::BlockStackExhausted)
    }

    pub fn block_depth(&self) -> usize {
        self.blocks.len()
    }

    /// 弹出栈顶块直到露出 `kind` 类型的块，该块保留在栈顶
    pub fn pop_block_until(&mut self, kind: BlockKind) -> Result<&Block, Fault> {
        while let Some(top) = self.blocks.last() {
            if top.kind() == kind {
                break;
            }
            self.blocks.pop();
        }
        self.blocks.last().ok_or(Fault::NoMatchingBlock(kind))
    }

    /// 异常展开：弹出块直到找到异常处理块并将其一并弹出
    ///
    /// 本帧没有处理块时块栈被清空，返回 None。
    pub fn take_handler(&mut self) -> Option<(usize, usize, Env)> {
        while let Some(block) = self.blocks.pop() {
            if let Block::Handler { catch, sp, scope } = block {
                return Some((catch, sp, scope));
            }
        }
        None
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("code", &self.code.name)
            .field("pc", &self.pc)
            .field("sp", &self.sp())
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Environment;

    fn frame(max_stack: usize, max_blocks: usize) -> Frame {
        let code = CodeBlock {
            name: "t".to_string(),
            filename: "t.az".to_string(),
            code: vec![],
            constants: vec![],
            names: vec![],
            locals: vec![],
            max_stack_size: max_stack,
            max_block_size: max_blocks,
        };
        Frame::new(Rc::new(code), Environment::new())
    }

    fn loop_block(env: &Env) -> Block {
        Block::Loop {
            start: 0,
            iter: 1,
            end: 2,
            sp: 0,
            scope: Rc::clone(env),
        }
    }

    fn handler_block(env: &Env) -> Block {
        Block::Handler {
            catch: 9,
            sp: 1,
            scope: Rc::clone(env),
        }
    }

    #[test]
    fn test_push_past_capacity_faults() {
        let mut f = frame(2, 0);
        f.push(Value::Integer(1)).unwrap();
        f.push(Value::Integer(2)).unwrap();
        assert_eq!(
            f.push(Value::Integer(3)),
            Err(Fault::StackOverflow { capacity: 2 })
        );
        assert_eq!(f.sp(), 2);
    }

    #[test]
    fn test_pop_empty_faults() {
        let mut f = frame(1, 0);
        assert_eq!(f.pop(), Err(Fault::StackExhausted));
        assert_eq!(f.peek().unwrap_err(), Fault::StackExhausted);
        assert_eq!(f.pop_n(1).unwrap_err(), Fault::StackExhausted);
    }

    #[test]
    fn test_pop_n_keeps_push_order() {
        let mut f = frame(3, 0);
        for n in 1..=3 {
            f.push(Value::Integer(n)).unwrap();
        }
        assert_eq!(
            f.pop_n(2).unwrap(),
            vec![Value::Integer(2), Value::Integer(3)]
        );
        assert_eq!(f.sp(), 1);
    }

    #[test]
    fn test_block_stack_capacity() {
        let env = Environment::new();
        let mut f = frame(0, 1);
        f.push_block(loop_block(&env)).unwrap();
        assert_eq!(
            f.push_block(loop_block(&env)).unwrap_err(),
            Fault::BlockStackOverflow { capacity: 1 }
        );
        f.pop_block().unwrap();
        assert_eq!(f.pop_block().unwrap_err(), Fault::BlockStackExhausted);
    }

    #[test]
    fn test_pop_block_until_stops_at_loop() {
        let env = Environment::new();
        let mut f = frame(0, 4);
        f.push_block(handler_block(&env)).unwrap();
        f.push_block(loop_block(&env)).unwrap();
        f.push_block(handler_block(&env)).unwrap();
        f.push_block(handler_block(&env)).unwrap();
        let kind = f.pop_block_until(BlockKind::Loop).unwrap().kind();
        assert_eq!(kind, BlockKind::Loop);
        // 循环外的处理块不受影响
        assert_eq!(f.block_depth(), 2);
    }

    #[test]
    fn test_pop_block_until_without_match_faults() {
        let env = Environment::new();
        let mut f = frame(0, 2);
        f.push_block(handler_block(&env)).unwrap();
        assert_eq!(
            f.pop_block_until(BlockKind::Loop).unwrap_err(),
            Fault::NoMatchingBlock(BlockKind::Loop)
        );
        assert_eq!(f.block_depth(), 0);
    }

    #[test]
    fn test_take_handler() {
        let env = Environment::new();
        let mut f = frame(0, 3);
        f.push_block(handler_block(&env)).unwrap();
        f.push_block(loop_block(&env)).unwrap();
        let (catch, sp, _) = f.take_handler().unwrap();
        assert_eq!((catch, sp), (9, 1));
        assert_eq!(f.block_depth(), 0);
        assert!(f.take_handler().is_none());
    }

    #[test]
    fn test_dump_stack() {
        let mut f = frame(2, 0);
        f.push(Value::Integer(1)).unwrap();
        f.push(Value::string("top")).unwrap();
        assert_eq!(
            f.dump_stack(),
            "Stack (sp=2, capacity=2):\n  [1] top\n  [0] 1\n"
        );
    }
}
