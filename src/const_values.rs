//! 协议与调度引擎使用的常量

/// 寄存器在线路上的有效字节数（40 位）
pub const REGISTER_SIGNIFICANT_BYTES: usize = 5;
/// 寄存器在线路上的总字节数（高 3 字节恒为 0）
pub const REGISTER_WIRE_BYTES: usize = 8;
/// 40 位寄存器掩码
pub const REGISTER_MASK: u64 = (1 << (REGISTER_SIGNIFICANT_BYTES * 8)) - 1;

/// 程序计数器的寄存器编号
pub const PC_REGISTER: u8 = 0x20;
/// x0 寄存器编号
pub const X0_REGISTER: u8 = 0x00;
/// x1 寄存器编号
pub const X1_REGISTER: u8 = 0x01;
/// x2 寄存器编号
pub const X2_REGISTER: u8 = 0x02;

/// 指令长度（字节）
pub const INSTRUCTION_SIZE: u64 = 4;

/// BRK 立即数：申请 JIT 内存区域
pub const BRK_MAP_PAGE: u16 = 0x69;
/// BRK 立即数：分块内存拷贝
pub const BRK_PATCH_MEMORY: u16 = 0x70;
/// BRK 立即数：结束会话
pub const BRK_DETACH: u16 = 0x71;

/// x1 缺失或为 0 时映射区域的默认大小 (64 KiB)
pub const DEFAULT_MAP_SIZE: u64 = 0x10000;
/// 分块拷贝的块大小 (16 KiB)
pub const COPY_CHUNK_SIZE: u64 = 0x4000;
/// 单次拷贝的上限 (4 MiB)，超过则直接跳过
pub const COPY_HARD_CAP: u64 = 0x40_0000;
/// 每隔多少块打印一次拷贝进度
pub const COPY_PROGRESS_INTERVAL: u64 = 10;

/// 连续无效断点的默认上限
pub const DEFAULT_INVALID_CEILING: u32 = 10;

/// 写内存成功时的应答
pub const OK_REPLY: &str = "OK";

/// 发送失败后的默认重传次数
pub const DEFAULT_MAX_RETRANSMITS: u32 = 3;
