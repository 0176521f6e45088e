//! 监听器与总线配置
//!
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::runtime::Handle;

use crate::error::EventError;

/// 并发模式：同一监听器上一次调用尚未结束时，新的匹配事件如何处理
///
/// - `Parallel`：不限并发，每次都立即启动新的调用
/// - `Serial`：并发度 1，新调用进入 FIFO 队列依次执行
/// - `Cutoff`：并发度 1，取消进行中的调用并立即启动新调用
/// - `Mute`：并发度 1，进行中的调用会屏蔽新调用
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    #[default]
    Parallel,
    Serial,
    Cutoff,
    Mute,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Serial => "serial",
            Self::Cutoff => "cutoff",
            Self::Mute => "mute",
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConcurrencyMode {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parallel" => Ok(Self::Parallel),
            "serial" => Ok(Self::Serial),
            "cutoff" => Ok(Self::Cutoff),
            "mute" => Ok(Self::Mute),
            other => Err(EventError::InvalidConfig {
                reason: format!("unknown concurrency mode: {other}"),
            }),
        }
    }
}

/// 监听器配置
///
/// `name` 既是注册表中的唯一标识，也是结果 `completed` 中的键。
/// `mode` 未设置时使用总线的 [`BusConfig::default_mode`]。
#[derive(Clone, Debug, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[builder(into)]
    pub name: String,
    #[serde(default, alias = "concurrency", skip_serializing_if = "Option::is_none")]
    pub mode: Option<ConcurrencyMode>,
}

impl HandlerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

impl From<&str> for HandlerConfig {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// 总线配置
#[derive(Clone, Debug, Default)]
pub struct BusConfig {
    /// 未显式指定 `mode` 的监听器所使用的并发模式
    pub default_mode: ConcurrencyMode,
    /// 驱动异步产出的运行时；为空时使用调用方所在的 tokio 运行时
    pub runtime: Option<Handle>,
}
