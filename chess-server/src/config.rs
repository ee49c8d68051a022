//! 服务端配置

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use protocol::{CONNECT_TIMEOUT_SECS, LIVENESS_INTERVAL_MS, PROBE_TIMEOUT_MS};

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 9080;

/// 配置文件路径的环境变量
pub const CONFIG_ENV: &str = "CHESS_SERVER_CONFIG";

/// 服务端配置（JSON 文件，缺省字段使用默认值）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_addr: String,
    /// 存活检测间隔（毫秒）
    pub liveness_interval_ms: u64,
    /// 单次推送/探测往返超时（毫秒）
    pub probe_timeout_ms: u64,
    /// 反向连接超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 新对局的初始棋盘快照，未设置时使用标准开局
    pub initial_board: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            liveness_interval_ms: LIVENESS_INTERVAL_MS,
            probe_timeout_ms: PROBE_TIMEOUT_MS,
            connect_timeout_ms: CONNECT_TIMEOUT_SECS * 1000,
            initial_board: None,
        }
    }
}

impl ServerConfig {
    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// 按命令行参数、环境变量的顺序查找配置文件，都没有时使用默认配置
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::args()
            .nth(1)
            .or_else(|| std::env::var(CONFIG_ENV).ok());
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
