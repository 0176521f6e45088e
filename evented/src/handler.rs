//! 事件处理器（Subscriber / EventHandler）
//!
//! 处理器以事件为参数被同步调用，返回 [`Reaction`]：
//! - 直接给出值，调用立即完成；
//! - 返回一个惰性的异步产出（future 或 stream），调用在其给出最终值或失败时完成。
//!
//! 同步返回 `Err` 视为处理器已损坏，对应监听器会被自动注销。
//!
use crate::event::Event;
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::{Stream, StreamExt, stream};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 处理器的同步返回
pub type HandlerResult = anyhow::Result<Reaction>;

/// 处理器对一次事件的反应
pub enum Reaction {
    /// 同步给出的值
    Value(Value),
    /// 惰性异步产出；以最后一个值作为结果，首个错误作为失败
    Deferred(BoxStream<'static, anyhow::Result<Value>>),
}

impl Reaction {
    /// 无返回值（`null`）
    pub fn none() -> Self {
        Self::Value(Value::Null)
    }

    /// 单值异步产出
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Deferred(stream::once(fut).boxed())
    }

    /// 多值异步产出；流结束时的最后一个值为结果，空流结果为 `null`
    pub fn stream<S>(s: S) -> Self
    where
        S: Stream<Item = anyhow::Result<Value>> + Send + 'static,
    {
        Self::Deferred(s.boxed())
    }
}

impl From<Value> for Reaction {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<()> for Reaction {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// 订阅者：同步调用，返回值或异步产出
pub trait Subscriber: Send + Sync + 'static {
    fn call(&self, event: &Event) -> HandlerResult;
}

impl<F> Subscriber for F
where
    F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, event: &Event) -> HandlerResult {
        self(event)
    }
}

/// 异步事件处理器：以对象形式实现的处理逻辑
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &Event) -> anyhow::Result<Value>;
}

/// 将 [`EventHandler`] 适配为 [`Subscriber`]：每次调用产出一个单值 future
pub(crate) struct HandlerAdapter<H> {
    inner: Arc<H>,
}

impl<H> HandlerAdapter<H> {
    pub(crate) fn new(inner: Arc<H>) -> Self {
        Self { inner }
    }
}

impl<H: EventHandler> Subscriber for HandlerAdapter<H> {
    fn call(&self, event: &Event) -> HandlerResult {
        let handler = self.inner.clone();
        let event = event.clone();
        Ok(Reaction::future(async move { handler.handle(&event).await }))
    }
}
