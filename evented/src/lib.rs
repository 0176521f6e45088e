//! 进程内事件总线（evented）
//!
//! 生产者发出带类型的事件；多个具名、独立注册的监听器各自以匹配器决定是否响应，
//! 并在显式的并发模式下运行，决定同一监听器上一次调用尚未结束时新事件的处理方式：
//! - `parallel`：不限并发；
//! - `serial`：排队依次执行；
//! - `cutoff`：取消进行中的调用，执行最新的；
//! - `mute`：进行中时屏蔽新调用。
//!
//! 每次分发立即返回 [`DispatchResult`]：事件副本加上按监听器名称组织的结果 future，
//! 以及可直接 `.await` 的合并结果。未被读取的失败不会被强制暴露。
//!
//! 典型用法：
//!
//! ```
//! use evented::{Event, EventBus, HandlerConfig, ConcurrencyMode, Reaction};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let bus = EventBus::new();
//! bus.on(
//!     "greet",
//!     |ev: &Event| Ok(Reaction::from(json!(format!("hello {}", ev.payload())))),
//!     HandlerConfig::new("greeter").with_mode(ConcurrencyMode::Serial),
//! )?;
//!
//! let result = bus.dispatch("greet", json!("world"));
//! assert_eq!(result.event_type(), "greet");
//!
//! let greeting = result.completed().get("greeter").unwrap().await?;
//! assert_eq!(greeting.into_value(), Some(json!("hello \"world\"")));
//! # Ok(())
//! # }
//! ```
//!
pub mod bus;
pub mod completed;
pub mod config;
pub mod error;
pub mod event;
#[cfg(feature = "global")]
pub mod global;
pub mod handler;
pub mod listener;
pub mod matcher;
pub mod outcome;
mod scheduler;

pub use bus::EventBus;
pub use completed::{Completed, DispatchResult};
pub use config::{BusConfig, ConcurrencyMode, HandlerConfig};
pub use error::{EventError, EventResult, HandlerFailure};
pub use event::Event;
#[cfg(feature = "global")]
pub use global::{default_bus, dispatch, on, reset, trigger};
pub use handler::{EventHandler, HandlerResult, Reaction, Subscriber};
pub use listener::Listener;
pub use matcher::{EventMatcher, Predicate};
pub use outcome::{ListenerFuture, Outcome, Settled};
