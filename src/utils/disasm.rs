//! AArch64 指令反汇编，仅用于日志

use anyhow::{Result, anyhow};
use capstone::prelude::*;

/// AArch64 反汇编器
pub struct Arm64Disassembler {
    cs: Capstone,
}

impl Arm64Disassembler {
    pub fn new() -> Result<Self> {
        let cs = Capstone::new()
            .arm64()
            .mode(arch::arm64::ArchMode::Arm)
            .build()
            .map_err(|e| anyhow!("Failed to create capstone engine: {}", e))?;

        Ok(Self { cs })
    }

    /// 反汇编单条指令
    ///
    /// # 参数
    /// - `code`: 小端序的 4 字节指令字
    /// - `address`: 指令地址
    pub fn disasm_instruction(&self, code: u32, address: u64) -> Result<String> {
        let code_bytes = code.to_le_bytes();

        let insns = self
            .cs
            .disasm_count(&code_bytes, address, 1)
            .map_err(|e| anyhow!("Failed to disassemble: {}", e))?;

        let Some(insn) = insns.iter().next() else {
            return Ok(format!("0x{:08x}    <invalid>", code));
        };

        let mnemonic = insn.mnemonic().unwrap_or("<unknown>");
        match insn.op_str() {
            Some(op_str) if !op_str.is_empty() => Ok(format!("{} {}", mnemonic, op_str)),
            _ => Ok(mnemonic.to_string()),
        }
    }
}
