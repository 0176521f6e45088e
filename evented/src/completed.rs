//! 分发结果（DispatchResult）与结果聚合（Completed）
//!
//! 每次分发构建一个 `Completed`：按监听器注册顺序保存“名称 → 结果 future”，
//! 本身也可 `.await`，等价于等待全部结果，全部成功才成功，否则给出最先观察到的失败。
//!
//! 读取某个监听器的结果不会触发任何工作：调用在分发时已经开始，
//! 这里只暴露已在进行中的 future。合并结果是惰性的，只在被等待时才汇总。
//!
use crate::error::HandlerFailure;
use crate::event::Event;
use crate::outcome::{ListenerFuture, Outcome, Settled};
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use std::fmt;
use std::future::IntoFuture;
use std::ops::Deref;

#[derive(Clone, Default)]
pub struct Completed {
    entries: Vec<(String, ListenerFuture)>,
}

impl Completed {
    pub(crate) fn new(entries: Vec<(String, ListenerFuture)>) -> Self {
        Self { entries }
    }

    /// 指定监听器本次调用的结果；未匹配该事件的监听器返回 `None`
    pub fn get(&self, name: &str) -> Option<ListenerFuture> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, fut)| fut.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// 参与本次分发的监听器名称（注册顺序）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ListenerFuture)> {
        self.entries.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 等待全部结果：全部成功时按注册顺序返回各结果，否则返回最先观察到的失败
    pub fn all(&self) -> BoxFuture<'static, Result<Vec<Settled>, HandlerFailure>> {
        let futures: Vec<ListenerFuture> = self.entries.iter().map(|(_, f)| f.clone()).collect();
        future::try_join_all(futures).boxed()
    }

    /// 等待全部结果，无论成功或失败都按名称给出
    pub fn settled(&self) -> BoxFuture<'static, Vec<(String, Outcome)>> {
        let futures = self
            .entries
            .iter()
            .map(|(name, fut)| {
                let name = name.clone();
                fut.clone().map(move |outcome| (name, outcome))
            })
            .collect::<Vec<_>>();
        future::join_all(futures).boxed()
    }
}

impl IntoFuture for Completed {
    type Output = Result<Vec<Settled>, HandlerFailure>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.all()
    }
}

impl IntoFuture for &Completed {
    type Output = Result<Vec<Settled>, HandlerFailure>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.all()
    }
}

impl fmt::Debug for Completed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, fut)| (n, fut)))
            .finish()
    }
}

/// `dispatch` 的返回：触发事件的副本，加上各监听器的结果
#[derive(Clone, Debug)]
pub struct DispatchResult {
    event: Event,
    completed: Completed,
}

impl DispatchResult {
    pub(crate) fn new(event: Event, completed: Completed) -> Self {
        Self { event, completed }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn completed(&self) -> &Completed {
        &self.completed
    }

    pub fn into_parts(self) -> (Event, Completed) {
        (self.event, self.completed)
    }
}

impl Deref for DispatchResult {
    type Target = Event;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}
