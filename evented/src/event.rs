//! 事件（Event）
//!
//! 遵循 Flux Standard Action 的形态：`type` + 可选 `payload`、`error`、`meta`。
//! 事件创建后不可变，分发时克隆进结果而不修改原值。
//!
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct Event {
    /// 事件类型，匹配器据此判断是否响应
    #[builder(into)]
    #[serde(rename = "type")]
    event_type: String,
    /// 事件负载
    #[builder(default)]
    #[serde(default)]
    payload: Value,
    /// 是否为错误事件
    #[builder(default)]
    #[serde(default)]
    error: bool,
    /// 附加元信息
    #[builder(default)]
    #[serde(default)]
    meta: Value,
}

impl Event {
    /// 仅以类型创建事件，负载为 `null`
    pub fn new(event_type: impl Into<String>) -> Self {
        Self::builder().event_type(event_type).build()
    }

    /// 以类型与负载创建事件
    pub fn with_payload(event_type: impl Into<String>, payload: Value) -> Self {
        Self::builder()
            .event_type(event_type)
            .payload(payload)
            .build()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn meta(&self) -> &Value {
        &self.meta
    }
}
