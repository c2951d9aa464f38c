//! 分块内存拷贝
//!
//! 每块先读源地址再写目标地址。任意一块失败就提前结束，已经写入的字节不回滚。

use tracing::{debug, info, warn};

use crate::const_values::{COPY_CHUNK_SIZE, COPY_HARD_CAP, COPY_PROGRESS_INTERVAL, OK_REPLY};
use crate::protocol::Command;
use crate::transport::{Transport, TransportError};

/// 拷贝提前结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// 读内存没有返回数据
    EmptyRead,
    /// 读到的数据少于请求长度
    ShortRead,
    /// 写内存没有返回 OK
    WriteRejected,
}

/// 拷贝结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Completed { bytes: u64 },
    /// 超过上限，未发出任何读写
    Skipped { size: u64 },
    Aborted { copied: u64, reason: AbortReason },
}

/// 一次拷贝任务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyJob {
    pub source: u64,
    pub destination: u64,
    pub total_size: u64,
    chunk_size: u64,
    hard_cap: u64,
}

impl CopyJob {
    pub fn new(destination: u64, source: u64, total_size: u64) -> Self {
        Self {
            source,
            destination,
            total_size,
            chunk_size: COPY_CHUNK_SIZE,
            hard_cap: COPY_HARD_CAP,
        }
    }

    pub fn is_oversized(&self) -> bool {
        self.total_size > self.hard_cap
    }

    /// 所有块的 (偏移, 长度)
    pub fn chunks(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let count = self.total_size.div_ceil(self.chunk_size);
        (0..count).map(move |index| {
            let offset = index * self.chunk_size;
            (offset, self.chunk_size.min(self.total_size - offset))
        })
    }

    /// 执行拷贝，只有传输层错误会向上传播
    pub fn run<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<CopyOutcome, TransportError> {
        if self.is_oversized() {
            warn!(
                size = format_args!("{:#x}", self.total_size),
                "拷贝大小超过上限 {:#x}，跳过", self.hard_cap
            );
            return Ok(CopyOutcome::Skipped {
                size: self.total_size,
            });
        }

        info!(
            dest = format_args!("{:#x}", self.destination),
            src = format_args!("{:#x}", self.source),
            size = format_args!("{:#x}", self.total_size),
            "开始分块拷贝"
        );

        let mut copied = 0;
        for (index, (offset, length)) in self.chunks().enumerate() {
            let read = Command::ReadMemory {
                addr: self.source + offset,
                length,
            };
            let reply = transport.send(&read.to_string())?;
            let mut data = match hex::decode(&reply) {
                Ok(data) if !data.is_empty() => data,
                _ => {
                    warn!(offset = format_args!("{:#x}", offset), reply = %reply, "读内存失败，拷贝中止");
                    return Ok(CopyOutcome::Aborted {
                        copied,
                        reason: AbortReason::EmptyRead,
                    });
                }
            };
            data.truncate(length as usize);

            let write = Command::WriteMemory {
                addr: self.destination + offset,
                data: &data,
            };
            let reply = transport.send(&write.to_string())?;
            if reply != OK_REPLY {
                warn!(offset = format_args!("{:#x}", offset), reply = %reply, "写内存失败，拷贝中止");
                return Ok(CopyOutcome::Aborted {
                    copied,
                    reason: AbortReason::WriteRejected,
                });
            }
            copied += data.len() as u64;

            if (data.len() as u64) < length {
                warn!(
                    offset = format_args!("{:#x}", offset),
                    "只读到 {:#x}/{:#x} 字节，拷贝中止", data.len(), length
                );
                return Ok(CopyOutcome::Aborted {
                    copied,
                    reason: AbortReason::ShortRead,
                });
            }

            if index as u64 % COPY_PROGRESS_INTERVAL == 0 {
                debug!("拷贝进度: {:#x}/{:#x}", offset, self.total_size);
            }
        }

        info!(bytes = copied, "内存拷贝完成");
        Ok(CopyOutcome::Completed { bytes: copied })
    }
}
