//! 断点指令解码

use tracing::{debug, warn};

use crate::const_values::INSTRUCTION_SIZE;
use crate::protocol::{Command, decode_word_le};
use crate::transport::{Transport, TransportError};
use crate::utils::Arm64Disassembler;

/// 取出 BRK 指令中位于 bit 5..=20 的 16 位立即数
#[inline(always)]
pub fn extract_immediate(word: u32) -> u16 {
    ((word >> 5) & 0xffff) as u16
}

/// 读取 PC 处的指令字
///
/// 应答无法解码时返回 `Ok(None)`，只有传输失败才返回错误。
/// 给出反汇编器时在 DEBUG 级别输出指令文本。
pub fn fetch_instruction_word<T: Transport + ?Sized>(
    transport: &mut T,
    pc: u64,
    disassembler: Option<&Arm64Disassembler>,
) -> Result<Option<u32>, TransportError> {
    let command = Command::ReadMemory {
        addr: pc,
        length: INSTRUCTION_SIZE,
    };
    let reply = transport.send(&command.to_string())?;
    match decode_word_le(&reply) {
        Ok(word) => {
            match disassembler {
                Some(disassembler) if tracing::enabled!(tracing::Level::DEBUG) => {
                    let text = disassembler
                        .disasm_instruction(word, pc)
                        .unwrap_or_else(|_| "未知指令".to_string());
                    debug!(pc = format_args!("{:#x}", pc), "断点指令 {:#010x} ({})", word, text);
                }
                _ => {}
            }
            Ok(Some(word))
        }
        Err(e) => {
            warn!(pc = format_args!("{:#x}", pc), "无法读取断点指令: {}", e);
            Ok(None)
        }
    }
}
