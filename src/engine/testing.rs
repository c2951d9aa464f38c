//! 测试用的脚本化传输层与宿主

use std::collections::VecDeque;

use super::host::{Host, HostError};
use crate::transport::{Transport, TransportError};

type Responder = Box<dyn FnMut(&str) -> Option<String>>;

/// 按顺序返回预设应答的传输层，预设用完后交给 responder，仍无应答则视为断开
pub struct ScriptedTransport {
    replies: VecDeque<String>,
    responder: Option<Responder>,
    pub sent: Vec<String>,
}

impl ScriptedTransport {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            responder: None,
            sent: Vec::new(),
        }
    }

    pub fn with_responder(mut self, responder: impl FnMut(&str) -> Option<String> + 'static) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn count_sent(&self, prefix: &str) -> usize {
        self.sent.iter().filter(|cmd| cmd.starts_with(prefix)).count()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        self.sent.push(command.to_string());
        if let Some(reply) = self.replies.pop_front() {
            return Ok(reply);
        }
        self.responder
            .as_mut()
            .and_then(|responder| responder(command))
            .ok_or(TransportError::Closed)
    }
}

/// 按拷贝命令应答：读内存返回 `len` 个字节，写内存返回 OK
pub fn memory_responder(command: &str) -> Option<String> {
    if let Some(args) = command.strip_prefix('m') {
        let (_, length) = args.split_once(',')?;
        let length = usize::from_str_radix(length, 16).ok()?;
        Some("ab".repeat(length))
    } else if command.starts_with('M') {
        Some("OK".to_string())
    } else {
        None
    }
}

/// 记录所有 prepare_memory_region 调用的宿主
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub pid: u32,
    pub prepared: Vec<(u64, u64)>,
    pub fail_prepare: bool,
}

impl RecordingHost {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            ..Default::default()
        }
    }
}

impl Host for RecordingHost {
    fn target_process_id(&mut self) -> Result<u32, HostError> {
        Ok(self.pid)
    }

    fn prepare_memory_region(&mut self, address: u64, size: u64) -> Result<(), HostError> {
        self.prepared.push((address, size));
        if self.fail_prepare {
            return Err(HostError::PrepareRegion {
                address,
                size,
                reason: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}
