use anyhow::anyhow;
use async_trait::async_trait;
use evented::{
    BusConfig, Event, EventBus, EventHandler, HandlerConfig, Listener, Reaction, Settled,
};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn counting(
    calls: &Arc<AtomicUsize>,
    reply: Value,
) -> impl Fn(&Event) -> anyhow::Result<Reaction> + Send + Sync + 'static {
    let calls = calls.clone();
    move |_: &Event| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Reaction::from(reply.clone()))
    }
}

#[test]
fn on_then_reset_leaves_registry_empty() {
    let bus = EventBus::new();
    bus.on(true, |_: &Event| Ok(Reaction::none()), "anyHandler")
        .unwrap();
    assert_eq!(bus.size(), 1);
    assert_eq!(bus.listener_names(), vec!["anyHandler"]);

    bus.reset();
    assert_eq!(bus.size(), 0);
    assert!(bus.listener_names().is_empty());
}

#[test]
fn unsubscribe_is_idempotent() {
    let bus = EventBus::new();
    let a = bus.on(true, |_: &Event| Ok(Reaction::none()), "a").unwrap();
    bus.on(true, |_: &Event| Ok(Reaction::none()), "b").unwrap();

    a.unsubscribe();
    assert_eq!(bus.size(), 1);
    a.unsubscribe();
    assert_eq!(bus.size(), 1);
    assert_eq!(bus.listener_names(), vec!["b"]);
}

#[tokio::test]
async fn only_matching_listeners_are_invoked() {
    let bus = EventBus::new();
    let x_calls = Arc::new(AtomicUsize::new(0));
    let y_calls = Arc::new(AtomicUsize::new(0));
    bus.on("X", counting(&x_calls, json!("x")), "onX").unwrap();
    bus.on("Y", counting(&y_calls, json!("y")), "onY").unwrap();

    let result = bus.trigger("X");

    assert_eq!(result.completed().names().collect::<Vec<_>>(), vec!["onX"]);
    assert!(result.completed().get("onY").is_none());
    assert_eq!(x_calls.load(Ordering::SeqCst), 1);
    assert_eq!(y_calls.load(Ordering::SeqCst), 0);

    let all = result.completed().clone().await.unwrap();
    assert_eq!(all, vec![Settled::Value(json!("x"))]);
}

#[tokio::test]
async fn dispatch_round_trips_type_and_payload() {
    let bus = EventBus::new();
    bus.on(true, |_: &Event| Ok(Reaction::none()), "any").unwrap();

    let payload = json!({"id": 1, "tags": ["a", "b"]});
    let result = bus.dispatch("user/created", payload.clone());
    assert_eq!(result.event_type(), "user/created");
    assert_eq!(result.payload(), &payload);
    assert!(!result.is_error());
    assert_eq!(result.completed().len(), 1);

    let event = Event::builder()
        .event_type("failed")
        .error(true)
        .meta(json!({"retry": 3}))
        .build();
    let result = bus.process(event.clone());
    assert_eq!(result.event(), &event);
}

#[tokio::test]
async fn handler_returns_value_through_completed() {
    let bus = EventBus::new();
    bus.on(true, |_: &Event| Ok(Reaction::from(json!(42))), "fortyTwo")
        .unwrap();

    let result = bus.trigger("any");
    let outcome = result.completed().get("fortyTwo").unwrap().await.unwrap();
    assert_eq!(outcome.into_value(), Some(json!(42)));
}

#[tokio::test]
async fn throwing_handler_rejects_and_unsubscribes() {
    let bus = EventBus::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let listener = {
        let calls = calls.clone();
        bus.on(
            true,
            move |_: &Event| {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("bad boy"))
            },
            "anyHandler",
        )
        .unwrap()
    };

    let result = bus.trigger("any");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(bus.size(), 0);
    assert!(listener.is_closed());

    let err = result
        .completed()
        .get("anyHandler")
        .unwrap()
        .await
        .unwrap_err();
    assert_eq!(err.listener(), "anyHandler");
    assert_eq!(err.error().to_string(), "bad boy");

    let combined = result.completed().clone().await.unwrap_err();
    assert_eq!(combined.listener(), "anyHandler");

    // 已注销的处理器不会再被调用
    let again = bus.trigger("any");
    assert!(again.completed().is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unread_failure_does_not_disturb_other_listeners() {
    let bus = EventBus::new();
    let ok_calls = Arc::new(AtomicUsize::new(0));
    bus.on(true, |_: &Event| Err(anyhow!("broken")), "bad")
        .unwrap();
    bus.on(true, counting(&ok_calls, json!("fine")), "good")
        .unwrap();

    // 结果从未被读取
    drop(bus.trigger("first"));

    let result = bus.trigger("second");
    assert_eq!(result.completed().names().collect::<Vec<_>>(), vec!["good"]);
    assert_eq!(ok_calls.load(Ordering::SeqCst), 2);
    assert!(result.completed().await.is_ok());
}

#[tokio::test]
async fn one_failure_does_not_abort_delivery_to_others() {
    let bus = EventBus::new();
    bus.on(true, |_: &Event| Err(anyhow!("nope")), "bad").unwrap();
    bus.on(true, |_: &Event| Ok(Reaction::from(json!(1))), "good")
        .unwrap();

    let result = bus.trigger("x");
    assert_eq!(result.completed().len(), 2);
    assert!(result.completed().get("bad").unwrap().await.is_err());
    assert_eq!(
        result.completed().get("good").unwrap().await.unwrap(),
        Settled::Value(json!(1))
    );
    assert_eq!(bus.listener_names(), vec!["good"]);
}

#[tokio::test]
async fn dispatch_uses_a_snapshot_of_the_registry() {
    let bus = EventBus::new();
    let victim: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));
    let victim_calls = Arc::new(AtomicUsize::new(0));

    {
        let victim = victim.clone();
        bus.on(
            true,
            move |_: &Event| {
                if let Some(listener) = victim.lock().unwrap().as_ref() {
                    listener.unsubscribe();
                }
                Ok(Reaction::none())
            },
            "killer",
        )
        .unwrap();
    }
    let handle = bus
        .on(true, counting(&victim_calls, Value::Null), "victim")
        .unwrap();
    *victim.lock().unwrap() = Some(handle);

    // 本次分发的快照仍包含 victim
    let first = bus.trigger("x");
    assert_eq!(first.completed().len(), 2);
    assert_eq!(victim_calls.load(Ordering::SeqCst), 1);

    let second = bus.trigger("x");
    assert_eq!(second.completed().names().collect::<Vec<_>>(), vec!["killer"]);
    assert_eq!(victim_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn async_failure_rejects_and_unsubscribes() {
    let bus = EventBus::new();
    bus.on(
        true,
        |_: &Event| Ok(Reaction::future(async { Err(anyhow!("later")) })),
        "lazy",
    )
    .unwrap();

    let result = bus.trigger("x");
    assert_eq!(bus.size(), 1);

    let err = tokio::time::timeout(Duration::from_secs(2), result.completed().get("lazy").unwrap())
        .await
        .expect("settles in time")
        .unwrap_err();
    assert_eq!(err.error().to_string(), "later");
    assert_eq!(bus.size(), 0);
}

struct Doubler;

#[async_trait]
impl EventHandler for Doubler {
    async fn handle(&self, event: &Event) -> anyhow::Result<Value> {
        tokio::task::yield_now().await;
        let n = event
            .payload()
            .as_i64()
            .ok_or_else(|| anyhow!("payload must be a number"))?;
        Ok(json!(n * 2))
    }
}

#[tokio::test]
async fn async_handler_objects_settle_with_their_result() {
    let bus = EventBus::new();
    bus.on_handler("double", Arc::new(Doubler), "doubler").unwrap();

    let result = bus.dispatch("double", json!(21));
    let out = result.completed().get("doubler").unwrap().await.unwrap();
    assert_eq!(out, Settled::Value(json!(42)));

    let result = bus.dispatch("double", json!("NaN"));
    assert!(result.completed().get("doubler").unwrap().await.is_err());
    assert!(!bus.contains("doubler"));
}

#[test]
fn async_handler_without_runtime_fails_instead_of_hanging() {
    let bus = EventBus::new();
    bus.on(
        true,
        |_: &Event| Ok(Reaction::future(async { Ok(json!(1)) })),
        "needs-runtime",
    )
    .unwrap();

    let result = bus.trigger("x");
    let outcome = result
        .completed()
        .get("needs-runtime")
        .unwrap()
        .peek()
        .expect("settled synchronously");
    assert!(outcome.is_err());
    assert_eq!(bus.size(), 0);
}

#[test]
fn configured_runtime_drives_async_handlers_from_sync_code() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let bus = EventBus::with_config(BusConfig {
        runtime: Some(rt.handle().clone()),
        ..Default::default()
    });
    bus.on(
        "x",
        |_: &Event| Ok(Reaction::future(async { Ok(json!("async")) })),
        HandlerConfig::new("a"),
    )
    .unwrap();

    let result = bus.trigger("x");
    let out = rt.block_on(result.completed().get("a").unwrap()).unwrap();
    assert_eq!(out.into_value(), Some(json!("async")));
}

#[tokio::test]
async fn trigger_is_dispatch_without_payload() {
    let bus = EventBus::new();
    bus.on(
        "ping",
        |ev: &Event| Ok(Reaction::from(ev.payload().clone())),
        "echo",
    )
    .unwrap();

    let bare = bus.trigger("ping");
    assert_eq!(bare.event(), &Event::new("ping"));
    assert_eq!(bare.payload(), &Value::Null);
    assert_eq!(bare.event(), bus.dispatch("ping", Value::Null).event());

    let loaded = bus.dispatch("ping", json!({"seq": 7}));
    let echoed = loaded.completed().get("echo").unwrap().await.unwrap();
    assert_eq!(echoed.into_value(), Some(json!({"seq": 7})));
}
