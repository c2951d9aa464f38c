//! 工具模块

pub mod disasm;

pub use disasm::Arm64Disassembler;
