//! 断点驱动的 JIT 启用引擎
//!
//! 通过 GDB 远程串行协议附加到目标进程，拦截目标运行时主动触发的 BRK 断点，
//! 根据立即数替目标完成内存映射和分块拷贝，然后恢复执行。

pub mod config;
pub mod const_values;
pub mod engine;
pub mod protocol;
pub mod transport;
pub mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::EngineConfig;
use crate::engine::{
    AllocationMode, DispatchPolicy, Dispatcher, PidHost, SessionReport, TerminationMode,
};
use crate::transport::RspClient;

/// 断点驱动的 JIT 启用工具
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 目标进程 ID（十进制或 0x 开头的十六进制）
    #[arg(short, long, value_parser = parse_int)]
    pub pid: u32,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<String>,

    /// 调试服务器地址，覆盖配置文件
    #[arg(short, long)]
    pub address: Option<String>,

    /// 处理 N 次 MapPage 后断开
    #[arg(long, conflicts_with = "ceiling")]
    pub bounded: Option<u32>,

    /// 连续无效断点上限
    #[arg(long)]
    pub ceiling: Option<u32>,

    /// 由调试服务器分配 RX 区域（x0 为请求大小）
    #[arg(long)]
    pub request_rx: bool,

    /// 恢复执行前把映射地址写回 x0
    #[arg(long)]
    pub report_x0: bool,

    /// 协商 no-ack 模式
    #[arg(long)]
    pub no_ack: bool,
}

impl Args {
    /// 用命令行参数覆盖配置
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(address) = &self.address {
            config.transport.address = address.clone();
        }
        if self.no_ack {
            config.transport.no_ack_mode = true;
        }

        let policy: &mut DispatchPolicy = &mut config.policy;
        if let Some(count) = self.bounded {
            policy.termination = TerminationMode::BoundedCount { count };
        }
        if let Some(ceiling) = self.ceiling {
            policy.termination = TerminationMode::UnboundedWithCeiling { ceiling };
        }
        if self.request_rx {
            policy.allocation = AllocationMode::RequestRx;
        }
        if self.report_x0 {
            policy.report_allocation_in_x0 = true;
        }
    }
}

fn parse_int(s: &str) -> Result<u32, String> {
    if let Some(hex_str) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex_str, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u32>().map_err(|e| e.to_string())
    }
}

pub fn build_engine_run_blocking(args: Args) -> Result<SessionReport> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::new(path)?,
        None => EngineConfig::default(),
    };
    args.apply(&mut config);
    info!(?config, "加载配置");

    let transport = &config.transport;
    let mut client = RspClient::connect(&transport.address, transport.read_timeout())
        .with_context(|| format!("无法连接调试服务器 {}", transport.address))?
        .with_max_retransmits(transport.max_retransmits);
    if transport.no_ack_mode {
        client.start_no_ack_mode()?;
    }

    let mut dispatcher = Dispatcher::new(client, PidHost::new(args.pid), config.policy);
    info!(policy = ?dispatcher.policy(), "开始调度");
    let report = dispatcher.run().context("调度会话出错")?;
    Ok(report)
}
