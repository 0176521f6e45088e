//! 单次调用的结果（Outcome）与其 future
//!
//! 每次调用的结果经 oneshot 通道送达一个可克隆的 [`ListenerFuture`]。
//! 无人读取时发送结果被直接丢弃：未被消费的失败不会以任何形式被强制暴露，
//! 而显式等待该 future 的一方仍能拿到真实的失败。
//!
use crate::error::HandlerFailure;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture, Shared};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// 正常结束的结果
///
/// `Cancelled` 与 `Muted` 不是错误，分别对应 cutoff 模式下被新调用顶替、
/// mute 模式下因已有调用进行中而被屏蔽。
#[derive(Clone, Debug, PartialEq)]
pub enum Settled {
    /// 处理器返回（或其异步产出最终给出）的值
    Value(Value),
    Cancelled,
    Muted,
}

impl Settled {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_muted(&self) -> bool {
        matches!(self, Self::Muted)
    }
}

/// 单次调用的最终结果
pub type Outcome = Result<Settled, HandlerFailure>;

/// 某个监听器一次调用的结果 future，可克隆、可多处等待
#[derive(Clone)]
pub struct ListenerFuture {
    inner: Shared<BoxFuture<'static, Outcome>>,
}

impl ListenerFuture {
    /// 已完成的结果
    pub(crate) fn ready(outcome: Outcome) -> Self {
        Self {
            inner: future::ready(outcome).boxed().shared(),
        }
    }

    /// 若已完成，返回结果的副本；未完成时立即返回 `None`
    pub fn peek(&self) -> Option<Outcome> {
        self.inner.clone().now_or_never()
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }
}

impl Future for ListenerFuture {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for ListenerFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerFuture")
            .field("outcome", &self.peek())
            .finish()
    }
}

/// 调用方持有的结果写入端
pub(crate) struct Resolver {
    tx: oneshot::Sender<Outcome>,
}

impl Resolver {
    pub(crate) fn resolve(self, outcome: Outcome) {
        // 接收端可能已被丢弃（结果无人关心），忽略即可
        let _ = self.tx.send(outcome);
    }
}

/// 创建一对尚未完成的写入端与结果 future
///
/// 写入端在未写入的情况下被丢弃（例如运行时关闭导致驱动任务被终止），
/// 结果视为 `Cancelled`，保证 future 不会永远挂起。
pub(crate) fn pending() -> (Resolver, ListenerFuture) {
    let (tx, rx) = oneshot::channel::<Outcome>();
    let inner = async move { rx.await.unwrap_or(Ok(Settled::Cancelled)) }
        .boxed()
        .shared();
    (Resolver { tx }, ListenerFuture { inner })
}
