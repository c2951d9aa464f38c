//! 远程调试传输层
//!
//! 引擎只依赖 [`Transport`]：发送一条命令并阻塞等待对应的应答。

mod rsp;

use std::io;

use thiserror::Error;

use crate::protocol::packet::FrameError;

pub use rsp::RspClient;

/// 传输层错误，对会话来说都是致命的
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("传输层 I/O 错误: {0}")]
    Io(#[from] io::Error),
    #[error("连接已关闭")]
    Closed,
    #[error("报文帧错误: {0}")]
    Frame(#[from] FrameError),
    #[error("重传 {attempts} 次后仍未收到确认: {command}")]
    RetransmitsExhausted { command: String, attempts: u32 },
    #[error("应答不是合法的 UTF-8")]
    InvalidUtf8,
}

/// 阻塞式请求/应答传输
pub trait Transport {
    /// 发送一条命令并返回应答 payload
    fn send(&mut self, command: &str) -> Result<String, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).send(command)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        (**self).send(command)
    }
}
