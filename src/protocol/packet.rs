//! RSP 报文帧
//!
//! 帧格式为 `$<payload>#<checksum>`，校验和是 payload 所有字节之和模 256。

use thiserror::Error;

/// 帧解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("校验和格式错误: {0:?}")]
    BadChecksumDigits(String),
    #[error("校验和不匹配: 收到 {received:#04x}, 计算得到 {calculated:#04x}")]
    ChecksumMismatch { received: u8, calculated: u8 },
    #[error("游程编码没有可重复的前一个字符")]
    DanglingRunLength,
    #[error("转义字符位于报文末尾")]
    DanglingEscape,
}

/// 计算 RSP 校验和
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, &x| acc.wrapping_add(x))
}

/// 给 payload 加上帧头和校验和
pub fn encode_frame(payload: &str) -> String {
    format!("${}#{:02x}", payload, checksum(payload.as_bytes()))
}

/// 校验收到的 payload
pub fn verify_checksum(payload: &[u8], digits: &[u8]) -> Result<(), FrameError> {
    let text = String::from_utf8_lossy(digits);
    let received = u8::from_str_radix(&text, 16)
        .map_err(|_| FrameError::BadChecksumDigits(text.to_string()))?;
    let calculated = checksum(payload);
    if received != calculated {
        return Err(FrameError::ChecksumMismatch {
            received,
            calculated,
        });
    }
    Ok(())
}

/// 展开 payload 中的转义 (`}`) 与游程编码 (`*`)
///
/// `}` 之后的字节需要与 0x20 异或；`*` 之后的字符减去 29 是前一个字符额外重复的次数。
pub fn unescape_payload(raw: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(byte) = iter.next() {
        match byte {
            b'}' => {
                let escaped = iter.next().ok_or(FrameError::DanglingEscape)?;
                out.push(escaped ^ 0x20);
            }
            b'*' => {
                let count = iter.next().ok_or(FrameError::DanglingRunLength)?;
                let last = *out.last().ok_or(FrameError::DanglingRunLength)?;
                let repeat = count.saturating_sub(29) as usize;
                out.extend(std::iter::repeat_n(last, repeat));
            }
            _ => out.push(byte),
        }
    }
    Ok(out)
}
