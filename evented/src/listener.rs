//! 监听器（Listener）
//!
//! `ListenerRecord` 是注册表中的订阅记录：名称、编译后的谓词、处理器、
//! 并发模式与调度器内部的运行状态。对外只暴露 [`Listener`] 句柄。
//!
use crate::bus::BusInner;
use crate::config::ConcurrencyMode;
use crate::event::Event;
use crate::handler::Subscriber;
use crate::matcher::Predicate;
use crate::scheduler::RunState;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tracing::debug;

pub(crate) struct ListenerRecord {
    name: String,
    seq: u64,
    mode: ConcurrencyMode,
    predicate: Predicate,
    handler: Arc<dyn Subscriber>,
    runtime: Option<Handle>,
    run_state: Mutex<RunState>,
    closed: AtomicBool,
    bus: Weak<BusInner>,
}

impl ListenerRecord {
    pub(crate) fn new(
        name: String,
        seq: u64,
        mode: ConcurrencyMode,
        predicate: Predicate,
        handler: Arc<dyn Subscriber>,
        runtime: Option<Handle>,
        bus: Weak<BusInner>,
    ) -> Self {
        Self {
            name,
            seq,
            mode,
            predicate,
            handler,
            runtime,
            run_state: Mutex::new(RunState::default()),
            closed: AtomicBool::new(false),
            bus,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    pub(crate) fn matches(&self, event: &Event) -> bool {
        (self.predicate)(event)
    }

    pub(crate) fn handler(&self) -> &dyn Subscriber {
        self.handler.as_ref()
    }

    /// 驱动异步产出的运行时：优先使用总线配置，其次为当前上下文中的运行时
    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RunState> {
        self.run_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 标记为已注销，返回此前是否已注销
    pub(crate) fn close(&self) -> bool {
        self.closed.swap(true, Ordering::AcqRel)
    }

    /// 幂等注销；仅当注册表中同名项仍指向本记录时才移除
    pub(crate) fn unsubscribe(self: &Arc<Self>) {
        if self.close() {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self);
        }
        debug!(listener = %self.name, "listener unsubscribed");
    }
}

/// 注册成功后返回的监听器句柄
#[derive(Clone)]
pub struct Listener {
    record: Arc<ListenerRecord>,
}

impl Listener {
    pub(crate) fn new(record: Arc<ListenerRecord>) -> Self {
        Self { record }
    }

    pub fn name(&self) -> &str {
        self.record.name()
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.record.mode()
    }

    /// 从总线注销；重复调用无副作用
    pub fn unsubscribe(&self) {
        self.record.unsubscribe();
    }

    pub fn is_closed(&self) -> bool {
        self.record.is_closed()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.record.name())
            .field("mode", &self.record.mode())
            .field("closed", &self.record.is_closed())
            .finish()
    }
}
