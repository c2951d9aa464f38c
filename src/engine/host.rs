//! 宿主提供的原语

use thiserror::Error;

/// 宿主原语错误
#[derive(Debug, Error)]
pub enum HostError {
    #[error("无法获取目标进程 ID: {0}")]
    ProcessLookup(String),
    #[error("准备内存区域失败 (地址 {address:#x}, 大小 {size:#x}): {reason}")]
    PrepareRegion {
        address: u64,
        size: u64,
        reason: String,
    },
    #[error("宿主不支持该操作: {0}")]
    Unsupported(&'static str),
}

/// 引擎依赖的宿主原语
pub trait Host {
    /// 目标进程 ID
    fn target_process_id(&mut self) -> Result<u32, HostError>;

    /// 把一段地址范围准备为可执行生成代码的内存区域
    fn prepare_memory_region(&mut self, address: u64, size: u64) -> Result<(), HostError>;
}

/// 只知道进程 ID 的宿主，没有原生内存映射能力
#[derive(Debug, Clone)]
pub struct PidHost {
    pid: u32,
}

impl PidHost {
    pub fn new(pid: u32) -> Self {
        Self { pid }
    }
}

impl Host for PidHost {
    fn target_process_id(&mut self) -> Result<u32, HostError> {
        match self.pid {
            0 => Err(HostError::ProcessLookup("进程 ID 不能为 0".to_string())),
            pid => Ok(pid),
        }
    }

    fn prepare_memory_region(&mut self, _address: u64, _size: u64) -> Result<(), HostError> {
        Err(HostError::Unsupported("prepare_memory_region"))
    }
}
