//! 停止应答 (stop-reply) 解析
//!
//! 形如 `T05thread:1a;20:0001000000000000;00:0010000000000000;` 的报文按 `;`
//! 切分后逐个字段解析，不依赖字段顺序，未知字段直接忽略。

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::codec::decode_register;
use crate::const_values::{PC_REGISTER, X0_REGISTER, X1_REGISTER, X2_REGISTER};

/// 停止应答解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StopReplyError {
    #[error("不是 T 类型的停止应答: {0:?}")]
    NotStopReply(String),
    #[error("停止应答缺少线程 ID")]
    MissingThread,
    #[error("停止应答缺少 PC 寄存器")]
    MissingProgramCounter,
    #[error("停止应答缺少 x0 寄存器")]
    MissingX0,
}

/// 一次断点停止事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEvent {
    /// 线程 ID，原样保留
    pub thread_id: String,
    /// 程序计数器
    pub program_counter: u64,
    /// 寄存器编号 -> 值
    pub registers: FxHashMap<u8, u64>,
}

impl StopEvent {
    /// 解析停止应答
    pub fn parse(reply: &str) -> Result<Self, StopReplyError> {
        let body = reply
            .strip_prefix('T')
            .and_then(|rest| rest.get(2..))
            .ok_or_else(|| StopReplyError::NotStopReply(reply.to_string()))?;

        let mut thread_id = None;
        let mut registers = FxHashMap::default();

        for field in body.split(';').filter(|field| !field.is_empty()) {
            let Some((key, value)) = field.split_once(':') else {
                continue;
            };
            if key == "thread" {
                thread_id = Some(value.to_string());
                continue;
            }
            let Ok(index) = u8::from_str_radix(key, 16) else {
                continue;
            };
            match decode_register(value) {
                Ok(decoded) => {
                    registers.insert(index, decoded);
                }
                Err(e) => tracing::debug!(register = index, "忽略无法解码的寄存器: {}", e),
            }
        }

        let thread_id = thread_id
            .filter(|tid| !tid.is_empty())
            .ok_or(StopReplyError::MissingThread)?;
        let program_counter = *registers
            .get(&PC_REGISTER)
            .ok_or(StopReplyError::MissingProgramCounter)?;
        if !registers.contains_key(&X0_REGISTER) {
            return Err(StopReplyError::MissingX0);
        }

        Ok(Self {
            thread_id,
            program_counter,
            registers,
        })
    }

    /// 读取指定寄存器
    pub fn register(&self, index: u8) -> Option<u64> {
        self.registers.get(&index).copied()
    }

    pub fn x0(&self) -> u64 {
        // parse 已经保证 x0 存在
        self.register(X0_REGISTER).unwrap_or_default()
    }

    pub fn x1(&self) -> Option<u64> {
        self.register(X1_REGISTER)
    }

    pub fn x2(&self) -> Option<u64> {
        self.register(X2_REGISTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_stop_reply() {
        let event =
            StopEvent::parse("T05thread:1a;20:0001000000000000;00:0010000000000000;").unwrap();
        assert_eq!(event.thread_id, "1a");
        assert_eq!(event.program_counter, 0x100);
        assert_eq!(event.x0(), 0x1000);
        assert_eq!(event.x1(), None);
        assert_eq!(event.x2(), None);
    }

    #[test]
    fn test_parse_ignores_field_order_and_unknown_keys() {
        let reply = "T05reason:breakpoint;02:0040000000000000;threads:1a,1b;\
                     00:00c0000001000000;thread:1b;01:0080000001000000;\
                     20:34120000010000000;qaddr:1f";
        let event = StopEvent::parse(reply).unwrap();
        assert_eq!(event.thread_id, "1b");
        assert_eq!(event.program_counter, 0x01_0000_1234);
        assert_eq!(event.x0(), 0x01_0000_c000);
        assert_eq!(event.x1(), Some(0x01_0000_8000));
        assert_eq!(event.x2(), Some(0x4000));
    }

    #[test]
    fn test_parse_missing_fields() {
        assert_eq!(
            StopEvent::parse("T0520:0001000000000000;00:0010000000000000;"),
            Err(StopReplyError::MissingThread)
        );
        assert_eq!(
            StopEvent::parse("T05thread:1a;00:0010000000000000;"),
            Err(StopReplyError::MissingProgramCounter)
        );
        assert_eq!(
            StopEvent::parse("T05thread:1a;20:0001000000000000;"),
            Err(StopReplyError::MissingX0)
        );
    }

    #[test]
    fn test_parse_malformed_register_counts_as_missing() {
        assert_eq!(
            StopEvent::parse("T05thread:1a;20:0001;00:0010000000000000;"),
            Err(StopReplyError::MissingProgramCounter)
        );
    }

    #[test]
    fn test_parse_non_stop_replies() {
        for reply in ["", "W00", "X09", "E01", "S05", "OK", "T", "T0"] {
            assert!(
                matches!(StopEvent::parse(reply), Err(StopReplyError::NotStopReply(_))),
                "{reply:?} 应当解析失败"
            );
        }
    }

    #[test]
    fn test_thread_id_is_opaque() {
        let event =
            StopEvent::parse("T05thread:p1f3.2c;20:0001000000000000;00:0000000000000000;")
                .unwrap();
        assert_eq!(event.thread_id, "p1f3.2c");
    }
}
