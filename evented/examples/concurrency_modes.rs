/// 并发模式示例
/// 同一串快速到达的 "speak" 事件分别交给四种并发模式的监听器，观察各自的结果。
///
/// 运行：`RUST_LOG=evented=trace cargo run --example concurrency_modes`
use anyhow::Result as AnyResult;
use evented::{ConcurrencyMode, Event, EventBus, HandlerConfig, Reaction, Settled};
use serde_json::json;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn speaker(ev: &Event) -> anyhow::Result<Reaction> {
    let line = ev
        .payload()
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| anyhow::anyhow!("speak payload must be a string"))?;

    Ok(Reaction::future(async move {
        // 模拟说话耗时
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!(format!("said: {line}")))
    }))
}

fn describe(outcome: &evented::Outcome) -> String {
    match outcome {
        Ok(Settled::Value(v)) => v.to_string(),
        Ok(Settled::Cancelled) => "<cancelled>".to_string(),
        Ok(Settled::Muted) => "<muted>".to_string(),
        Err(failure) => format!("<failed: {failure}>"),
    }
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let bus = EventBus::new();
    for mode in [
        ConcurrencyMode::Parallel,
        ConcurrencyMode::Serial,
        ConcurrencyMode::Cutoff,
        ConcurrencyMode::Mute,
    ] {
        bus.on(
            "speak",
            speaker,
            HandlerConfig::new(mode.to_string()).with_mode(mode),
        )?;
    }

    // 一个损坏的监听器：第一次失败后即被注销，不影响其他监听器
    bus.on(
        "speak",
        |_: &Event| Err(anyhow::anyhow!("microphone unplugged")),
        "broken",
    )?;

    println!("listeners: {:?}", bus.listener_names());

    let results: Vec<_> = ["hello", "how are you", "goodbye"]
        .into_iter()
        .map(|line| bus.dispatch("speak", json!(line)))
        .collect();

    for result in &results {
        println!("== {}", result.payload());
        for (name, outcome) in result.completed().settled().await {
            println!("   {name:<8} {}", describe(&outcome));
        }
    }

    println!("listeners after run: {:?}", bus.listener_names());
    Ok(())
}
