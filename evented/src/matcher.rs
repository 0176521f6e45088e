//! 事件匹配器（EventMatcher）
//!
//! 将多种形态的匹配条件编译为统一的谓词 `Fn(&Event) -> bool`。
//! 编译只在注册时执行一次，分发时仅调用编译后的谓词。
//!
//! 原始形态存在歧义时（例如来自配置的 JSON 值），按以下固定优先级解释：
//! 正则 → 谓词函数 → 布尔常量 → 集合 → 精确字符串。
//!
use crate::error::{EventError, EventResult};
use crate::event::Event;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// 编译后的谓词
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

#[derive(Clone)]
pub enum EventMatcher {
    /// 事件类型与给定字符串完全相等
    Exact(String),
    /// 事件类型属于给定集合
    OneOf(BTreeSet<String>),
    /// 事件类型匹配正则
    Pattern(Regex),
    /// 自定义谓词
    Predicate(Predicate),
    /// 恒定结果
    Constant(bool),
}

impl EventMatcher {
    /// 以闭包构造谓词匹配器
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// 以正则源码构造匹配器
    pub fn pattern(source: &str) -> EventResult<Self> {
        Ok(Self::Pattern(Regex::new(source)?))
    }

    /// 匹配任意事件
    pub fn any() -> Self {
        Self::Constant(true)
    }

    /// 解析原始（JSON）形态的匹配条件
    ///
    /// - `{"pattern": "..."}` 或形如 `"/.../"` 的字符串 → 正则
    /// - `true` / `false` → 布尔常量
    /// - 字符串数组 → 集合
    /// - 其它字符串 → 精确匹配
    ///
    /// JSON 无法表达函数，谓词形态只能通过 [`EventMatcher::predicate`] 构造。
    pub fn from_value(raw: &Value) -> EventResult<Self> {
        if let Some(source) = pattern_source(raw) {
            return Self::pattern(source);
        }

        match raw {
            Value::Bool(b) => Ok(Self::Constant(*b)),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| EventError::InvalidMatcher {
                            reason: format!("set member must be a string, found {item}"),
                        })
                })
                .collect::<EventResult<BTreeSet<_>>>()
                .map(Self::OneOf),
            Value::String(s) => Ok(Self::Exact(s.clone())),
            other => Err(EventError::InvalidMatcher {
                reason: format!("unsupported matcher form: {other}"),
            }),
        }
    }

    /// 编译为谓词；空集合与空正则永不匹配
    pub fn compile(self) -> Predicate {
        match self {
            Self::Pattern(re) => {
                if re.as_str().is_empty() {
                    Arc::new(|_: &Event| false)
                } else {
                    Arc::new(move |ev: &Event| re.is_match(ev.event_type()))
                }
            }
            Self::Predicate(f) => f,
            Self::Constant(b) => Arc::new(move |_: &Event| b),
            Self::OneOf(set) => Arc::new(move |ev: &Event| set.contains(ev.event_type())),
            Self::Exact(s) => Arc::new(move |ev: &Event| ev.event_type() == s),
        }
    }
}

fn pattern_source(raw: &Value) -> Option<&str> {
    match raw {
        Value::Object(map) => map.get("pattern").and_then(Value::as_str),
        Value::String(s) if s.len() >= 2 && s.starts_with('/') && s.ends_with('/') => {
            s.get(1..s.len() - 1)
        }
        _ => None,
    }
}

impl fmt::Debug for EventMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            Self::OneOf(set) => f.debug_tuple("OneOf").field(set).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Constant(b) => f.debug_tuple("Constant").field(b).finish(),
        }
    }
}

impl From<&str> for EventMatcher {
    fn from(s: &str) -> Self {
        Self::Exact(s.to_owned())
    }
}

impl From<String> for EventMatcher {
    fn from(s: String) -> Self {
        Self::Exact(s)
    }
}

impl From<bool> for EventMatcher {
    fn from(b: bool) -> Self {
        Self::Constant(b)
    }
}

impl From<Regex> for EventMatcher {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

impl From<Vec<String>> for EventMatcher {
    fn from(types: Vec<String>) -> Self {
        Self::OneOf(types.into_iter().collect())
    }
}

impl From<&[&str]> for EventMatcher {
    fn from(types: &[&str]) -> Self {
        Self::OneOf(types.iter().map(|t| (*t).to_owned()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for EventMatcher {
    fn from(types: [&str; N]) -> Self {
        Self::OneOf(types.iter().map(|t| (*t).to_owned()).collect())
    }
}

impl From<BTreeSet<String>> for EventMatcher {
    fn from(set: BTreeSet<String>) -> Self {
        Self::OneOf(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn matches(m: EventMatcher, ty: &str) -> bool {
        (m.compile())(&Event::new(ty))
    }

    #[test]
    fn exact_matches_only_same_type() {
        assert!(matches("a".into(), "a"));
        assert!(!matches("a".into(), "ab"));
    }

    #[test]
    fn one_of_matches_members() {
        let m: EventMatcher = ["a", "b"].into();
        assert!(matches(m.clone(), "a"));
        assert!(matches(m.clone(), "b"));
        assert!(!matches(m, "c"));
    }

    #[test]
    fn pattern_tests_event_type() {
        let m = EventMatcher::pattern("^user/").unwrap();
        assert!(matches(m.clone(), "user/created"));
        assert!(!matches(m, "order/created"));
    }

    #[test]
    fn predicate_sees_whole_event() {
        let m = EventMatcher::predicate(|ev| ev.payload().get("vip").is_some());
        let pred = m.compile();
        assert!(pred(&Event::with_payload("x", json!({"vip": true}))));
        assert!(!pred(&Event::new("x")));
    }

    #[test]
    fn constant_ignores_event() {
        assert!(matches(true.into(), "anything"));
        assert!(!matches(false.into(), "anything"));
    }

    #[test]
    fn empty_set_and_empty_pattern_never_match() {
        assert!(!matches(EventMatcher::OneOf(BTreeSet::new()), ""));
        assert!(!matches(EventMatcher::pattern("").unwrap(), ""));
        assert!(!matches(EventMatcher::from_value(&json!("//")).unwrap(), "x"));
    }

    #[test]
    fn raw_forms_follow_precedence() {
        // 形如 /.../ 的字符串既可视为正则也可视为精确字符串：正则优先
        let m = EventMatcher::from_value(&json!("/^ab/")).unwrap();
        assert!(matches!(m, EventMatcher::Pattern(_)));
        assert!(matches(m.clone(), "abc"));
        assert!(!matches(m, "/^ab/"));

        let m = EventMatcher::from_value(&json!({"pattern": "c$"})).unwrap();
        assert!(matches!(m, EventMatcher::Pattern(_)));

        let m = EventMatcher::from_value(&json!(true)).unwrap();
        assert!(matches!(m, EventMatcher::Constant(true)));

        let m = EventMatcher::from_value(&json!(["x", "y"])).unwrap();
        assert!(matches!(m, EventMatcher::OneOf(_)));

        let m = EventMatcher::from_value(&json!("x")).unwrap();
        assert!(matches!(m, EventMatcher::Exact(_)));
    }

    #[test]
    fn raw_forms_reject_unknown_shapes() {
        assert!(EventMatcher::from_value(&json!(42)).is_err());
        assert!(EventMatcher::from_value(&json!(["x", 1])).is_err());
        assert!(EventMatcher::from_value(&json!("/(/")).is_err());
    }
}
