/// WebSocket Debug Tool - statshub realtime protocol walkthrough
///
/// Connects to a running statshub instance and exercises the protocol:
/// - Waits for the initial statistics snapshot
/// - Subscribes to the requested topics
/// - Issues each query message once
/// - Monitors pushed updates and keepalives for a while
///
/// Usage:
///   cargo run --bin debug_websocket
///   cargo run --bin debug_websocket -- --url ws://127.0.0.1:8080/ws
///   cargo run --bin debug_websocket -- --duration 60 --events stats_updates,result_updates
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::time::{timeout, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

fn print_header(title: &str) {
    println!("\n{}", "=".repeat(80));
    println!("  {}", title);
    println!("{}\n", "=".repeat(80));
}

fn print_step(step: &str, status: &str) {
    let status_symbol = match status {
        "SUCCESS" => "✅",
        "RUNNING" => "🔄",
        "ERROR" => "❌",
        "WARNING" => "⚠️",
        _ => "ℹ️",
    };
    println!("{} {}", status_symbol, step);
}

struct Options {
    url: String,
    duration_secs: u64,
    events: Vec<String>,
}

fn parse_options() -> Option<Options> {
    let args: Vec<String> = std::env::args().collect();
    let mut options = Options {
        url: "ws://127.0.0.1:8080/ws".to_string(),
        duration_secs: 30,
        events: vec!["stats_updates".to_string()],
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--url" if i + 1 < args.len() => {
                options.url = args[i + 1].clone();
                i += 1;
            }
            "--duration" if i + 1 < args.len() => {
                options.duration_secs = args[i + 1].parse().unwrap_or(30);
                i += 1;
            }
            "--events" if i + 1 < args.len() => {
                options.events = args[i + 1].split(',').map(|e| e.trim().to_string()).collect();
                i += 1;
            }
            "--help" => {
                println!("Usage: cargo run --bin debug_websocket [OPTIONS]\n");
                println!("Options:");
                println!("  --url <ws-url>          Endpoint (default: ws://127.0.0.1:8080/ws)");
                println!("  --duration <seconds>    Duration to monitor (default: 30)");
                println!("  --events <a,b,...>      Topics to subscribe (default: stats_updates)");
                println!("  --help                  Show this help message");
                return None;
            }
            _ => {}
        }
        i += 1;
    }
    Some(options)
}

fn describe(frame: &Value) -> String {
    let kind = frame["type"].as_str().unwrap_or("?");
    match kind {
        "stats" => format!(
            "stats ({}) operators={} sessions={}",
            frame["data"]["type"].as_str().unwrap_or("?"),
            frame["data"]["stats"]["totals"]["operators"],
            frame["data"]["stats"]["totals"]["sessions"]
        ),
        "update" => format!(
            "update gen={} action={} result={}",
            frame["data"]["metadata"]["generation"],
            frame["data"]["metadata"]["action"].as_str().unwrap_or("?"),
            frame["data"]["metadata"]["result_id"].as_str().unwrap_or("?")
        ),
        "error" => format!("error: {}", frame["error"].as_str().unwrap_or("?")),
        other => format!("{} {}", other, frame["data"]),
    }
}

#[tokio::main]
async fn main() {
    print_header("🔍 STATSHUB WEBSOCKET DEBUG TOOL");

    let Some(options) = parse_options() else {
        return;
    };

    println!("📋 Configuration:");
    println!("   URL:      {}", options.url);
    println!("   Duration: {}s", options.duration_secs);
    println!("   Events:   {}", options.events.join(", "));

    print_header("🔌 STEP 1: CONNECTING");
    print_step(&format!("Connecting to {}", options.url), "RUNNING");

    let connect_start = Instant::now();
    let ws_stream = match timeout(Duration::from_secs(10), connect_async(&options.url)).await {
        Ok(Ok((stream, resp))) => {
            print_step(
                &format!(
                    "Connected in {:?} (status {})",
                    connect_start.elapsed(),
                    resp.status()
                ),
                "SUCCESS",
            );
            stream
        }
        Ok(Err(e)) => {
            print_step(&format!("Connection failed: {}", e), "ERROR");
            println!("\n🔍 Is statshub running? Try: curl http://127.0.0.1:8080/api/health");
            return;
        }
        Err(_) => {
            print_step("Connection timeout (10s)", "ERROR");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    print_header("📨 STEP 2: INITIAL SNAPSHOT");
    match timeout(Duration::from_secs(10), ws_receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str::<Value>(&text) {
            Ok(frame) => print_step(&describe(&frame), "SUCCESS"),
            Err(e) => print_step(&format!("Unparseable frame: {}", e), "WARNING"),
        },
        Ok(Some(Ok(other))) => {
            print_step(&format!("Unexpected message: {:?}", other), "WARNING");
        }
        Ok(Some(Err(e))) => {
            print_step(&format!("WebSocket error: {}", e), "ERROR");
            return;
        }
        Ok(None) => {
            print_step("Connection closed by server", "ERROR");
            return;
        }
        Err(_) => {
            print_step("No initial snapshot within 10s", "ERROR");
            return;
        }
    }

    print_header("📡 STEP 3: SUBSCRIBE AND QUERY");
    let requests = [
        json!({ "type": "subscribe", "data": { "events": options.events } }),
        json!({ "type": "get_top_operators", "data": { "limit": 5 } }),
        json!({ "type": "get_top_products" }),
        json!({ "type": "get_global_stats" }),
        json!({ "type": "get_top_operators", "data": { "limit": 0 } }),
    ];
    for request in &requests {
        print_step(&format!("-> {}", request), "RUNNING");
        if let Err(e) = ws_sender.send(Message::Text(request.to_string())).await {
            print_step(&format!("Failed to send: {}", e), "ERROR");
            return;
        }
    }

    print_header(&format!("👀 STEP 4: MONITORING ({}s)", options.duration_secs));

    let deadline = Instant::now() + Duration::from_secs(options.duration_secs);
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut pings = 0u64;

    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }

        match timeout(deadline - now, ws_receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                    print_step(&format!("Unparseable frame: {}", text), "WARNING");
                    continue;
                };
                let kind = frame["type"].as_str().unwrap_or("?").to_string();
                *counts.entry(kind).or_default() += 1;
                print_step(&format!("<- {}", describe(&frame)), "INFO");
            }
            Ok(Some(Ok(Message::Ping(payload)))) => {
                pings += 1;
                let _ = ws_sender.send(Message::Pong(payload)).await;
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                print_step(&format!("Server closed the connection: {:?}", frame), "WARNING");
                break;
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                print_step(&format!("WebSocket error: {}", e), "ERROR");
                break;
            }
            Ok(None) => {
                print_step("Connection closed", "WARNING");
                break;
            }
            Err(_) => break,
        }
    }

    print_header("📊 SUMMARY");
    for (kind, count) in &counts {
        println!("   {:<16} {}", kind, count);
    }
    println!("   {:<16} {}", "pings", pings);

    let _ = ws_sender.send(Message::Close(None)).await;
}
