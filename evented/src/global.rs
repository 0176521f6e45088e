//! 进程级默认总线
//!
//! 仅为便捷入口：所有能力都可通过显式构造的 [`EventBus`] 获得，
//! 测试与多个相互独立的总线可以并存。
//!
use crate::bus::EventBus;
use crate::completed::DispatchResult;
use crate::config::HandlerConfig;
use crate::error::EventResult;
use crate::event::Event;
use crate::handler::HandlerResult;
use crate::listener::Listener;
use crate::matcher::EventMatcher;
use serde_json::Value;
use std::sync::OnceLock;

static DEFAULT_BUS: OnceLock<EventBus> = OnceLock::new();

/// 默认总线，首次访问时创建
pub fn default_bus() -> &'static EventBus {
    DEFAULT_BUS.get_or_init(EventBus::new)
}

/// 在默认总线上分发无负载事件；携带负载时使用 [`dispatch`]
pub fn trigger(event_type: impl Into<String>) -> DispatchResult {
    default_bus().trigger(event_type)
}

pub fn dispatch(event_type: impl Into<String>, payload: Value) -> DispatchResult {
    default_bus().dispatch(event_type, payload)
}

pub fn on<M, F>(matcher: M, handler: F, config: impl Into<HandlerConfig>) -> EventResult<Listener>
where
    M: Into<EventMatcher>,
    F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
{
    default_bus().on(matcher, handler, config)
}

pub fn reset() {
    default_bus().reset();
}
