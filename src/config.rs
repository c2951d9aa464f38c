use anyhow::{self, Context};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::const_values::DEFAULT_MAX_RETRANSMITS;
use crate::engine::DispatchPolicy;

/// 传输层配置
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TransportConfig {
    /// 调试服务器地址
    pub address: String,
    /// 连接后协商 no-ack 模式
    pub no_ack_mode: bool,
    /// 读超时（毫秒），0 表示一直等待
    pub read_timeout_ms: u64,
    pub max_retransmits: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:1234".to_string(),
            no_ack_mode: false,
            read_timeout_ms: 0,
            max_retransmits: DEFAULT_MAX_RETRANSMITS,
        }
    }
}

impl TransportConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
    }
}

/// 引擎配置（来自 profile/config.toml）
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub transport: TransportConfig,
    pub policy: DispatchPolicy,
}

impl EngineConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<EngineConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取配置文件: {:?}", &path.as_ref().as_os_str()))?;
        Self::from_toml(&toml_str)
            .with_context(|| format!("无法解析配置文件: {:?}", &path.as_ref().as_os_str()))
    }

    pub fn from_toml(toml_str: &str) -> anyhow::Result<EngineConfig> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        anyhow::Ok(config)
    }
}
