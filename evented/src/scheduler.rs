//! 并发调度（Scheduler）
//!
//! 每个监听器持有一份运行状态，按其并发模式决定新到达的调用是
//! 立即执行、排队、顶替进行中的调用，还是被屏蔽：
//!
//! - `Parallel`：每次都启动新调用，互不影响；
//! - `Serial`：同一时刻最多一个调用，其余按到达顺序进入无界 FIFO 队列，
//!   前一个调用结束（无论成功或失败）后启动下一个；
//! - `Cutoff`：同一时刻最多一个调用，新调用取消进行中的调用并立即启动，
//!   被取消的调用结果为 `Cancelled`；
//! - `Mute`：同一时刻最多一个调用，进行中时新调用不执行处理器，结果为 `Muted`。
//!
//! 处理器总是在调用方线程上同步执行；只有返回异步产出时才会在运行时上
//! 派生驱动任务。状态锁从不跨越处理器调用或 `.await` 持有。
//!
use crate::config::ConcurrencyMode;
use crate::error::HandlerFailure;
use crate::event::Event;
use crate::handler::Reaction;
use crate::listener::ListenerRecord;
use crate::outcome::{self, ListenerFuture, Outcome, Resolver, Settled};
use futures_core::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 调度器内部的运行状态，不对外暴露
#[derive(Default)]
pub(crate) struct RunState {
    /// serial / mute：是否有调用在进行
    busy: bool,
    /// serial：等待执行的调用
    queue: VecDeque<Pending>,
    /// cutoff：当前调用的代次与取消令牌
    generation: u64,
    current: Option<CancellationToken>,
}

struct Pending {
    event: Event,
    resolver: Resolver,
}

/// 一次调用在结束时需要归还的调度状态
enum Turn {
    Parallel,
    Serial,
    Cutoff {
        generation: u64,
        token: CancellationToken,
    },
    Mute,
}

impl Turn {
    fn cancellation(&self) -> Option<CancellationToken> {
        match self {
            Turn::Cutoff { token, .. } => Some(token.clone()),
            _ => None,
        }
    }
}

/// 驱动任务持有的调度状态；任务被丢弃（如运行时关闭）时由 `Drop` 归还
struct DriverGuard {
    record: Arc<ListenerRecord>,
    turn: Option<Turn>,
}

impl DriverGuard {
    fn finish(mut self) {
        if let Some(turn) = self.turn.take() {
            self.record.settle(turn);
        }
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        if let Some(turn) = self.turn.take() {
            trace!(listener = %self.record.name(), "driver dropped before settling");
            self.record.abandon(turn);
        }
    }
}

enum Progress {
    Settled,
    InFlight,
}

impl ListenerRecord {
    /// 接纳一次调用，立即返回其结果 future
    pub(crate) fn admit(self: &Arc<Self>, event: Event) -> ListenerFuture {
        match self.mode() {
            ConcurrencyMode::Parallel => {
                let (resolver, future) = outcome::pending();
                self.invoke(event, resolver, Turn::Parallel);
                future
            }
            ConcurrencyMode::Serial => {
                let (resolver, future) = outcome::pending();
                let pending = Pending { event, resolver };
                {
                    let mut state = self.state();
                    if state.busy {
                        state.queue.push_back(pending);
                        trace!(
                            listener = %self.name(),
                            queued = state.queue.len(),
                            "invocation queued"
                        );
                        return future;
                    }
                    state.busy = true;
                }
                self.run_serial(pending);
                future
            }
            ConcurrencyMode::Cutoff => {
                let (resolver, future) = outcome::pending();
                let token = CancellationToken::new();
                let generation = {
                    let mut state = self.state();
                    if let Some(previous) = state.current.replace(token.clone()) {
                        trace!(listener = %self.name(), "cutting off in-flight invocation");
                        previous.cancel();
                    }
                    state.generation = state.generation.wrapping_add(1);
                    state.generation
                };
                self.invoke(event, resolver, Turn::Cutoff { generation, token });
                future
            }
            ConcurrencyMode::Mute => {
                {
                    let mut state = self.state();
                    if state.busy {
                        trace!(listener = %self.name(), "invocation muted");
                        return ListenerFuture::ready(Ok(Settled::Muted));
                    }
                    state.busy = true;
                }
                let (resolver, future) = outcome::pending();
                self.invoke(event, resolver, Turn::Mute);
                future
            }
        }
    }

    /// 依次执行 serial 队列，直到遇到进行中的异步调用或队列为空
    fn run_serial(self: &Arc<Self>, first: Pending) {
        let mut next = first;
        loop {
            if let Progress::InFlight = self.invoke(next.event, next.resolver, Turn::Serial) {
                return;
            }
            match self.next_queued() {
                Some(pending) => next = pending,
                None => return,
            }
        }
    }

    fn next_queued(&self) -> Option<Pending> {
        let mut state = self.state();
        let next = state.queue.pop_front();
        if next.is_none() {
            state.busy = false;
        }
        next
    }

    /// 调用结束后归还调度状态；serial 由 `run_serial` 自行推进
    fn release(&self, turn: &Turn) {
        match turn {
            Turn::Parallel | Turn::Serial => {}
            Turn::Cutoff { generation, .. } => {
                let mut state = self.state();
                if state.generation == *generation {
                    state.current = None;
                }
            }
            Turn::Mute => {
                self.state().busy = false;
            }
        }
    }

    /// 异步调用结束：serial 启动下一个排队调用，其它模式归还状态
    fn settle(self: &Arc<Self>, turn: Turn) {
        match turn {
            Turn::Serial => {
                if let Some(pending) = self.next_queued() {
                    self.run_serial(pending);
                }
            }
            other => self.release(&other),
        }
    }

    fn invoke(self: &Arc<Self>, event: Event, resolver: Resolver, turn: Turn) -> Progress {
        let reaction = match self.handler().call(&event) {
            Ok(reaction) => reaction,
            Err(err) => {
                self.fail(resolver, err);
                self.release(&turn);
                return Progress::Settled;
            }
        };

        let producer = match reaction {
            Reaction::Value(value) => {
                resolver.resolve(Ok(Settled::Value(value)));
                self.release(&turn);
                return Progress::Settled;
            }
            Reaction::Deferred(producer) => producer,
        };

        let Some(runtime) = self.runtime() else {
            self.fail(
                resolver,
                anyhow::anyhow!("no tokio runtime available to drive the async handler"),
            );
            self.release(&turn);
            return Progress::Settled;
        };

        let cancel = turn.cancellation();
        let guard = DriverGuard {
            record: Arc::clone(self),
            turn: Some(turn),
        };
        runtime.spawn(async move {
            let record = &guard.record;
            let outcome = record.drive(producer, cancel).await;
            match outcome {
                Err(failure) => {
                    debug!(listener = %record.name(), error = %failure.error(), "async handler failed");
                    record.unsubscribe();
                    resolver.resolve(Err(failure));
                }
                ok => resolver.resolve(ok),
            }
            guard.finish();
        });
        Progress::InFlight
    }

    /// 驱动任务未结束即被丢弃：归还调度状态，serial 队列中的调用以 `Cancelled` 结束
    fn abandon(&self, turn: Turn) {
        match turn {
            Turn::Serial => {
                let stranded: Vec<Pending> = {
                    let mut state = self.state();
                    state.busy = false;
                    state.queue.drain(..).collect()
                };
                for pending in stranded {
                    pending.resolver.resolve(Ok(Settled::Cancelled));
                }
            }
            other => self.release(&other),
        }
    }

    /// 处理器失败：注销监听器，并以失败结束本次调用
    fn fail(self: &Arc<Self>, resolver: Resolver, err: anyhow::Error) {
        debug!(listener = %self.name(), error = %err, "handler failed, unsubscribing");
        self.unsubscribe();
        resolver.resolve(Err(HandlerFailure::new(self.name(), err)));
    }

    /// 驱动异步产出直到结束；取消令牌触发时立即丢弃产出并返回 `Cancelled`
    async fn drive(
        &self,
        mut producer: BoxStream<'static, anyhow::Result<Value>>,
        cancel: Option<CancellationToken>,
    ) -> Outcome {
        let run = async {
            let mut last = Value::Null;
            while let Some(item) = producer.next().await {
                match item {
                    Ok(value) => last = value,
                    Err(err) => return Err(HandlerFailure::new(self.name(), err)),
                }
            }
            Ok(Settled::Value(last))
        };

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Ok(Settled::Cancelled),
                    outcome = run => outcome,
                }
            }
            None => run.await,
        }
    }
}
