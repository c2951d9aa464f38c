//! 寄存器编解码
//!
//! 线路上的寄存器以传输顺序的十六进制字节表示（第 0 字节在前），
//! 只有前 5 个字节有效，后 3 个字节恒为 0。

use thiserror::Error;

use crate::const_values::{REGISTER_MASK, REGISTER_SIGNIFICANT_BYTES, REGISTER_WIRE_BYTES};

/// 编解码错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("寄存器值格式错误: {0:?}")]
    MalformedRegister(String),
    #[error("指令字格式错误: {0:?}")]
    MalformedWord(String),
}

/// 从十六进制文本中按顺序取出前 `count` 个字节
fn leading_bytes(hex: &str, count: usize) -> Option<Vec<u8>> {
    let text = hex.get(..count * 2)?;
    hex::decode(text).ok()
}

/// 解码寄存器值，只读取前 5 个字节并按小端序组装
pub fn decode_register(hex: &str) -> Result<u64, CodecError> {
    let bytes = leading_bytes(hex, REGISTER_SIGNIFICANT_BYTES)
        .ok_or_else(|| CodecError::MalformedRegister(hex.to_string()))?;

    Ok(bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &byte| (acc << 8) | byte as u64))
}

/// 编码寄存器值：低 5 字节小端序，再补 3 个零字节
pub fn encode_register(value: u64) -> String {
    let mut bytes = (value & REGISTER_MASK).to_le_bytes();
    bytes[REGISTER_SIGNIFICANT_BYTES..REGISTER_WIRE_BYTES].fill(0);
    hex::encode(bytes)
}

/// 解码 4 字节小端序的指令字
pub fn decode_word_le(hex: &str) -> Result<u32, CodecError> {
    let bytes = leading_bytes(hex, 4).ok_or_else(|| CodecError::MalformedWord(hex.to_string()))?;
    let word: [u8; 4] = bytes
        .try_into()
        .map_err(|_| CodecError::MalformedWord(hex.to_string()))?;
    Ok(u32::from_le_bytes(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_register_reads_five_bytes() {
        assert_eq!(decode_register("fc44660101000000").unwrap(), 0x01_0166_44fc);
        assert_eq!(decode_register("0001000000000000").unwrap(), 0x100);
        // 第 6 字节之后的内容被忽略
        assert_eq!(decode_register("0100000000ffffff").unwrap(), 1);
        assert_eq!(decode_register("0203040506").unwrap(), 0x06_0504_0302);
    }

    #[test]
    fn test_decode_register_too_short() {
        assert_eq!(
            decode_register("00010000"),
            Err(CodecError::MalformedRegister("00010000".to_string()))
        );
        assert!(decode_register("").is_err());
    }

    #[test]
    fn test_decode_register_rejects_non_hex() {
        assert!(decode_register("zz01000000000000").is_err());
    }

    #[test]
    fn test_encode_register_truncates_to_40_bits() {
        assert_eq!(encode_register(0x1004), "0410000000000000");
        assert_eq!(encode_register(0xff_ffff_ffff), "ffffffffff000000");
        assert_eq!(encode_register(0x1234_5678_9abc_def0), "f0debc9a78000000");
        assert_eq!(encode_register(0), "0000000000000000");
    }

    #[test]
    fn test_decode_word_le() {
        assert_eq!(decode_word_le("210d20d4").unwrap(), 0xd420_0d21);
        assert_eq!(decode_word_le("1f2003d5").unwrap(), 0xd503_201f);
        assert!(matches!(decode_word_le("E01"), Err(CodecError::MalformedWord(_))));
        assert!(decode_word_le("").is_err());
    }

    proptest! {
        #[test]
        fn prop_register_round_trip(value in 0u64..(1u64 << 40)) {
            prop_assert_eq!(decode_register(&encode_register(value)).unwrap(), value);
        }

        #[test]
        fn prop_encoded_register_shape(value in any::<u64>()) {
            let encoded = encode_register(value);
            prop_assert_eq!(encoded.len(), 16);
            prop_assert!(encoded.ends_with("000000"));
            prop_assert_eq!(decode_register(&encoded).unwrap(), value & REGISTER_MASK);
        }
    }
}
