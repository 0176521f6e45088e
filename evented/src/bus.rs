//! 事件总线（EventBus）
//!
//! 注册表以唯一名称保存监听器记录。每次分发：
//! 1. 对当前注册表取快照（按注册顺序），避免监听器在分发过程中自行注销造成干扰；
//! 2. 以编译后的谓词过滤出匹配的监听器，未匹配者不会被调度、也不出现在结果中；
//! 3. 交由各监听器的调度器接纳调用，立即返回聚合结果，不等待任何处理器完成。
//!
use crate::completed::{Completed, DispatchResult};
use crate::config::{BusConfig, HandlerConfig};
use crate::error::{EventError, EventResult};
use crate::event::Event;
use crate::handler::{EventHandler, HandlerAdapter, HandlerResult, Subscriber};
use crate::listener::{Listener, ListenerRecord};
use crate::matcher::EventMatcher;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// 进程内事件总线，可克隆，克隆体共享同一注册表
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
pub(crate) struct BusInner {
    listeners: DashMap<String, Arc<ListenerRecord>>,
    seq: AtomicU64,
    config: BusConfig,
}

impl BusInner {
    /// 仅当同名项仍指向该记录时才移除，避免过期句柄误删后注册的同名监听器
    pub(crate) fn remove(&self, record: &Arc<ListenerRecord>) {
        self.listeners
            .remove_if(record.name(), |_, current| Arc::ptr_eq(current, record));
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: DashMap::new(),
                seq: AtomicU64::new(0),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// 注册同步处理器
    ///
    /// 处理器可直接返回值，也可返回异步产出（见 [`crate::Reaction`]）。
    pub fn on<M, F>(
        &self,
        matcher: M,
        handler: F,
        config: impl Into<HandlerConfig>,
    ) -> EventResult<Listener>
    where
        M: Into<EventMatcher>,
        F: Fn(&Event) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(matcher.into(), Arc::new(handler), config.into())
    }

    /// 注册异步处理器对象
    pub fn on_handler<M, H>(
        &self,
        matcher: M,
        handler: Arc<H>,
        config: impl Into<HandlerConfig>,
    ) -> EventResult<Listener>
    where
        M: Into<EventMatcher>,
        H: EventHandler,
    {
        self.subscribe(
            matcher.into(),
            Arc::new(HandlerAdapter::new(handler)),
            config.into(),
        )
    }

    /// 注册任意订阅者
    pub fn subscribe(
        &self,
        matcher: EventMatcher,
        handler: Arc<dyn Subscriber>,
        config: HandlerConfig,
    ) -> EventResult<Listener> {
        if config.name.trim().is_empty() {
            return Err(EventError::InvalidListenerName {
                reason: "listener name must not be empty".to_string(),
            });
        }

        let mode = config.mode.unwrap_or(self.inner.config.default_mode);
        let predicate = matcher.compile();

        match self.inner.listeners.entry(config.name) {
            Entry::Occupied(slot) => Err(EventError::DuplicateListener {
                name: slot.key().clone(),
            }),
            Entry::Vacant(slot) => {
                let record = Arc::new(ListenerRecord::new(
                    slot.key().clone(),
                    self.inner.seq.fetch_add(1, Ordering::Relaxed),
                    mode,
                    predicate,
                    handler,
                    self.inner.config.runtime.clone(),
                    Arc::downgrade(&self.inner),
                ));
                slot.insert(record.clone());
                debug!(listener = %record.name(), %mode, "listener registered");
                Ok(Listener::new(record))
            }
        }
    }

    /// 分发一个完整构造的事件
    pub fn process(&self, event: Event) -> DispatchResult {
        let matched: Vec<Arc<ListenerRecord>> = self
            .snapshot()
            .into_iter()
            .filter(|record| record.matches(&event))
            .collect();

        debug!(
            event_type = %event.event_type(),
            matched = matched.len(),
            "dispatching event"
        );

        let entries = matched
            .into_iter()
            .map(|record| (record.name().to_owned(), record.admit(event.clone())))
            .collect();

        DispatchResult::new(event, Completed::new(entries))
    }

    /// 以类型与负载构造事件并分发
    pub fn dispatch(&self, event_type: impl Into<String>, payload: Value) -> DispatchResult {
        self.process(Event::with_payload(event_type, payload))
    }

    /// 分发一个无负载的事件，负载为 `null`
    ///
    /// 携带负载时使用 [`EventBus::dispatch`]，两者合起来即 `trigger(type, payload?)`。
    pub fn trigger(&self, event_type: impl Into<String>) -> DispatchResult {
        self.process(Event::new(event_type))
    }

    /// 注销并丢弃全部监听器；进行中的调用不受影响
    pub fn reset(&self) {
        self.inner.listeners.retain(|_, record| {
            record.close();
            false
        });
        debug!("event bus reset");
    }

    /// 已注册监听器的名称（注册顺序）
    pub fn listener_names(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .map(|record| record.name().to_owned())
            .collect()
    }

    pub fn size(&self) -> usize {
        self.inner.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.listeners.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.listeners.contains_key(name)
    }

    fn snapshot(&self) -> Vec<Arc<ListenerRecord>> {
        let mut records: Vec<Arc<ListenerRecord>> = self
            .inner
            .listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.seq());
        records
    }
}
