//! 引擎发出的远程调试命令

use std::fmt;

use super::codec::encode_register;

/// 远程调试命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// 按进程 ID 附加
    ///
    /// Format: `vAttach;<hex-pid>`
    Attach { pid: u32 },
    /// 继续执行直到下一次停止
    ///
    /// Format: `c`
    Continue,
    /// 读内存
    ///
    /// Format: `m<addr>,<length>`
    ReadMemory { addr: u64, length: u64 },
    /// 写内存
    ///
    /// Format: `M<addr>,<length>:<hex-bytes>`
    WriteMemory { addr: u64, data: &'a [u8] },
    /// 设置指定线程的寄存器
    ///
    /// Format: `P<regidx>=<16 hex>;thread:<tid>;`
    WriteRegister {
        index: u8,
        value: u64,
        thread_id: &'a str,
    },
    /// 请求调试服务器分配一块 RX 内存
    ///
    /// Format: `_M<size>,rx`
    AllocateRx { size: u64 },
    /// 关闭应答确认
    ///
    /// Format: `QStartNoAckMode`
    StartNoAckMode,
    /// 断开会话
    ///
    /// Format: `D`
    Detach,
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Attach { pid } => write!(f, "vAttach;{:x}", pid),
            Command::Continue => f.write_str("c"),
            Command::ReadMemory { addr, length } => write!(f, "m{:x},{:x}", addr, length),
            Command::WriteMemory { addr, data } => {
                write!(f, "M{:x},{:x}:{}", addr, data.len(), hex::encode(data))
            }
            Command::WriteRegister {
                index,
                value,
                thread_id,
            } => write!(
                f,
                "P{:x}={};thread:{};",
                index,
                encode_register(*value),
                thread_id
            ),
            Command::AllocateRx { size } => write!(f, "_M{:x},rx", size),
            Command::StartNoAckMode => f.write_str("QStartNoAckMode"),
            Command::Detach => f.write_str("D"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_commands() {
        assert_eq!(Command::Attach { pid: 0x1f3 }.to_string(), "vAttach;1f3");
        assert_eq!(Command::Continue.to_string(), "c");
        assert_eq!(
            Command::ReadMemory {
                addr: 0x1234,
                length: 0x10
            }
            .to_string(),
            "m1234,10"
        );
        assert_eq!(
            Command::WriteMemory {
                addr: 0x2000,
                data: &[0xde, 0xca, 0xfb, 0xad]
            }
            .to_string(),
            "M2000,4:decafbad"
        );
        assert_eq!(Command::AllocateRx { size: 0x10000 }.to_string(), "_M10000,rx");
        assert_eq!(Command::Detach.to_string(), "D");
    }

    #[test]
    fn test_encode_write_register() {
        let command = Command::WriteRegister {
            index: 0x20,
            value: 0x104,
            thread_id: "1a",
        };
        assert_eq!(command.to_string(), "P20=0401000000000000;thread:1a;");

        let command = Command::WriteRegister {
            index: 0,
            value: 0x01_0000_c000,
            thread_id: "1a",
        };
        assert_eq!(command.to_string(), "P0=00c0000001000000;thread:1a;");
    }
}
