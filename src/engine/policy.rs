//! 调度策略
//!
//! 不同的目标脚本在终止条件、地址回写等方面有差异，统一由 [`DispatchPolicy`] 描述。

use serde::Deserialize;

use crate::const_values::DEFAULT_INVALID_CEILING;

/// 循环终止方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum TerminationMode {
    /// 处理满 `count` 次 MapPage 后断开，不做无效断点熔断
    BoundedCount { count: u32 },
    /// 一直运行，直到收到 Detach 或连续无效断点达到 `ceiling`
    UnboundedWithCeiling { ceiling: u32 },
}

impl Default for TerminationMode {
    fn default() -> Self {
        TerminationMode::UnboundedWithCeiling {
            ceiling: DEFAULT_INVALID_CEILING,
        }
    }
}

/// MapPage 的地址来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationMode {
    /// x0 是区域地址，x1 是大小
    #[default]
    InPlace,
    /// x0 是请求的大小，通过 `_M<size>,rx` 向调试服务器申请区域
    RequestRx,
}

/// 哪些命令会清零连续无效计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreakReset {
    /// 任何可识别的命令，包括 Detach
    #[default]
    AnyRecognized,
    /// 只有 MapPage 和 PatchMemory
    HandledOnly,
}

/// 调度策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    pub termination: TerminationMode,
    pub allocation: AllocationMode,
    /// 恢复执行前把映射地址写回 x0
    pub report_allocation_in_x0: bool,
    pub streak_reset: StreakReset,
}

impl DispatchPolicy {
    pub fn bounded(count: u32) -> Self {
        Self {
            termination: TerminationMode::BoundedCount { count },
            ..Default::default()
        }
    }

    pub fn unbounded(ceiling: u32) -> Self {
        Self {
            termination: TerminationMode::UnboundedWithCeiling { ceiling },
            ..Default::default()
        }
    }

    pub fn with_allocation(mut self, allocation: AllocationMode) -> Self {
        self.allocation = allocation;
        self
    }

    pub fn with_report_allocation_in_x0(mut self, report: bool) -> Self {
        self.report_allocation_in_x0 = report;
        self
    }

    pub fn with_streak_reset(mut self, streak_reset: StreakReset) -> Self {
        self.streak_reset = streak_reset;
        self
    }
}
