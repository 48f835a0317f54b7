// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic resilient-store usage example.
//!
//! Demonstrates:
//! 1. Building a store from `STORE_*` environment variables
//! 2. Strings, hashes, lists and sets (served remote or in-process)
//! 3. Pub/sub and sorted sets, which need the remote
//! 4. Health check and raw metrics
//! 5. Clean disconnect
//!
//! Works with or without Redis. To see the remote path, start one first:
//! ```bash
//! docker run --rm -p 6379:6379 redis:7-alpine
//! ```
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! STORE_URL=redis://127.0.0.1:1 cargo run --example basic_usage   # force fallback
//! ```

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use resilient_store::{ResilientStore, Served, StoreConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_store=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║         resilient-store: Basic Usage Example                  ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure
    // ─────────────────────────────────────────────────────────────────────────
    let config = StoreConfig {
        connect_timeout_ms: 500,
        max_retries: 3,
        ..StoreConfig::from_env()?
    };
    println!("📦 Remote: {} (prefix: {:?})", config.url, config.key_prefix);
    let store = ResilientStore::new(config)?;
    println!("   └─ State before first call: {}", store.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Emulated operations
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n✍️  Writing...");
    report("set session:alice", store.set_with_expiry("session:alice", "token-123", 60).await?);
    report("hset user:alice", store.hmset("user:alice", &[("name", "Alice"), ("role", "admin")]).await?);
    report("rpush recent", store.rpush("recent", &["login", "view", "logout"]).await?);
    report("sadd online", store.sadd("online", &["alice", "bob"]).await?);
    report("incr visits", store.increment("visits").await?);

    println!("\n🔍 Reading...");
    report("get session:alice", store.get("session:alice").await?);
    report("ttl session:alice", store.ttl("session:alice").await?);
    report("hgetall user:alice", store.hget_all("user:alice").await?);
    report("lrange recent 0 -1", store.lrange("recent", 0, -1).await?);
    report("lrange recent -1 -1", store.lrange("recent", -1, -1).await?);
    report("smembers online", store.smembers("online").await?);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Remote-only operations
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📡 Remote-only...");
    report("publish events", store.publish("events", "alice logged in").await);
    report("zadd board", store.zadd("board", 42.0, "alice").await?);
    report("zrange board", store.zrange_with_scores("board", 0, -1).await?);
    let sub = store.create_subscriber().await;
    println!("   └─ subscriber: {:?}", sub);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Health and metrics
    // ─────────────────────────────────────────────────────────────────────────
    let health = store.health_check().await;
    println!("\n🩺 Health: {:?}", health);
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Clean up
    // ─────────────────────────────────────────────────────────────────────────
    store.delete(&["session:alice", "user:alice", "recent", "online", "visits", "board"]).await?;
    store.disconnect().await;
    println!("\n🛑 Disconnected. State: {}", store.state());

    Ok(())
}

fn report<T: std::fmt::Debug>(label: &str, served: Served<T>) {
    let marker = if served.is_degraded() { "⚠️ " } else { "✅" };
    println!("   {} {:<22} [{}] {:?}", marker, label, served.served_by, served.value);
}

/// Dump all captured metrics, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => format!("{}", v),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}s", samples.len(), sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}
