//! 断点分类

use crate::const_values::{BRK_DETACH, BRK_MAP_PAGE, BRK_PATCH_MEMORY, DEFAULT_MAP_SIZE};
use crate::protocol::StopEvent;

/// 断点命令类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind {
    /// 申请 JIT 内存区域
    MapPage,
    /// 有界内存拷贝
    PatchMemory,
    /// 结束会话
    Detach,
    Invalid,
}

/// 带操作数的断点命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointCommand {
    MapPage {
        address: u64,
        size: u64,
    },
    /// x1 或 x2 缺失时 `src`/`size` 为 None
    PatchMemory {
        dest: u64,
        src: Option<u64>,
        size: Option<u64>,
    },
    Detach,
    Invalid,
}

/// 根据 BRK 立即数分类
pub fn classify(immediate: u16) -> BreakpointKind {
    match immediate {
        BRK_MAP_PAGE => BreakpointKind::MapPage,
        BRK_PATCH_MEMORY => BreakpointKind::PatchMemory,
        BRK_DETACH => BreakpointKind::Detach,
        _ => BreakpointKind::Invalid,
    }
}

impl BreakpointCommand {
    /// 结合停止事件中的寄存器构造命令
    pub fn from_event(kind: BreakpointKind, event: &StopEvent) -> Self {
        match kind {
            BreakpointKind::MapPage => BreakpointCommand::MapPage {
                address: event.x0(),
                size: event
                    .x1()
                    .filter(|&size| size != 0)
                    .unwrap_or(DEFAULT_MAP_SIZE),
            },
            BreakpointKind::PatchMemory => BreakpointCommand::PatchMemory {
                dest: event.x0(),
                src: event.x1(),
                size: event.x2(),
            },
            BreakpointKind::Detach => BreakpointCommand::Detach,
            BreakpointKind::Invalid => BreakpointCommand::Invalid,
        }
    }

    pub fn kind(&self) -> BreakpointKind {
        match self {
            BreakpointCommand::MapPage { .. } => BreakpointKind::MapPage,
            BreakpointCommand::PatchMemory { .. } => BreakpointKind::PatchMemory,
            BreakpointCommand::Detach => BreakpointKind::Detach,
            BreakpointCommand::Invalid => BreakpointKind::Invalid,
        }
    }
}
