//! 事件总线统一错误定义
//!
//! 注册期错误（重名、非法名称、非法匹配器）同步返回；
//! 处理器失败只经由对应监听器的结果 future 传播，不会影响其它监听器。
//!
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
    // --- 注册 ---
    #[error("duplicate listener: name={name}")]
    DuplicateListener { name: String },
    #[error("invalid listener name: {reason}")]
    InvalidListenerName { reason: String },
    #[error("invalid matcher: {reason}")]
    InvalidMatcher { reason: String },
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    // --- 处理 ---
    #[error(transparent)]
    Handler(#[from] HandlerFailure),
}

/// 统一 Result 类型别名
pub type EventResult<T> = Result<T, EventError>;

impl From<regex::Error> for EventError {
    fn from(err: regex::Error) -> Self {
        EventError::InvalidMatcher {
            reason: err.to_string(),
        }
    }
}

/// 处理器失败：同步返回错误，或其异步产出以错误结束
///
/// 结果 future 可被多处克隆并等待，因此内部错误以 `Arc` 共享。
#[derive(Clone, Debug)]
pub struct HandlerFailure {
    listener: String,
    error: Arc<anyhow::Error>,
}

impl HandlerFailure {
    pub fn new(listener: impl Into<String>, error: anyhow::Error) -> Self {
        Self {
            listener: listener.into(),
            error: Arc::new(error),
        }
    }

    /// 失败的监听器名称
    pub fn listener(&self) -> &str {
        &self.listener
    }

    /// 处理器返回的原始错误
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }
}

impl fmt::Display for HandlerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handler failed: listener={}, reason={}",
            self.listener, self.error
        )
    }
}

impl std::error::Error for HandlerFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&**self.error)
    }
}
