//! 帧栈（显式调用栈）与回溯

use super::frame::Frame;
use crate::error::Fault;
use std::fmt;

/// 调用栈，栈顶为当前活动帧
///
/// 调用方帧即其下方的一帧，返回时弹出栈顶即恢复调用方。
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Result<&Frame, Fault> {
        self.frames.last().ok_or(Fault::NoActiveFrame)
    }

    pub fn current_mut(&mut self) -> Result<&mut Frame, Fault> {
        self.frames.last_mut().ok_or(Fault::NoActiveFrame)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// 当前调用栈快照，最内层在前
    pub fn backtrace(&self) -> CallTrace {
        CallTrace {
            entries: self
                .frames
                .iter()
                .rev()
                .map(|frame| CallTraceEntry {
                    name: frame.code().name.clone(),
                    filename: frame.code().filename.clone(),
                    offset: frame.last_offset,
                })
                .collect(),
        }
    }
}

/// 回溯中的一帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTraceEntry {
    pub name: String,
    pub filename: String,
    /// 出错时正在执行的指令偏移
    pub offset: usize,
}

/// 调用栈回溯
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallTrace {
    pub entries: Vec<CallTraceEntry>,
}

impl CallTrace {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最内层帧
    pub fn innermost(&self) -> Option<&CallTraceEntry> {
        self.entries.first()
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "  at {} ({}:{:04})",
                entry.name, entry.filename, entry.offset
            )?;
        }
        Ok(())
    }
}
