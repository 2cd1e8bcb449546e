//! Minimal embedding example for hookcast-core
//!
//! This example demonstrates using hookcast-core as a library in a custom
//! application: events are produced in-process, delivered to a custom sink,
//! and the engine lifecycle is fully managed by the application.

use hookcast_core::traits::WebhookSink;
use hookcast_core::{
    DispatchConfig, DispatchEngine, IdentityKey, LfuCache, MemoryQueue, Result, WebhookEvent,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::Level;

/// Custom sink that prints instead of calling any endpoint
struct ConsoleSink {
    sent: Arc<AtomicUsize>,
}

impl WebhookSink for ConsoleSink {
    fn dispatch(&self, event: &WebhookEvent) -> Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        println!("[Console] {} -> {}", event.kind(), event.fields_json()?);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "console"
    }
}

fn envelopes() -> Vec<serde_json::Value> {
    vec![
        // First sighting: delivered
        json!({"type": "pokestop", "message": {
            "pokestop_id": "stop-1", "enabled": true, "latitude": 51.5, "longitude": -0.12,
            "lure_expiration": null, "active_fort_modifier": null, "last_modified": 1000
        }}),
        // Only the volatile timestamp moved: suppressed
        json!({"type": "pokestop", "message": {
            "pokestop_id": "stop-1", "enabled": true, "latitude": 51.5, "longitude": -0.12,
            "lure_expiration": null, "active_fort_modifier": null, "last_modified": 2000
        }}),
        // Lure applied: delivered again
        json!({"type": "pokestop", "message": {
            "pokestop_id": "stop-1", "enabled": true, "latitude": 51.5, "longitude": -0.12,
            "lure_expiration": 1500001800, "active_fort_modifier": 501, "last_modified": 2100
        }}),
        // 27/45 = 60% is below species 1's threshold: filtered
        json!({"type": "pokemon", "message": {
            "encounter_id": "enc-1", "pokemon_id": 1,
            "individual_attack": 9, "individual_defense": 9, "individual_stamina": 9
        }}),
        // Exceptional: delivered regardless of quality
        json!({"type": "pokemon", "message": {
            "encounter_id": "enc-2", "pokemon_id": 1, "shiny": true,
            "individual_attack": 1, "individual_defense": 2, "individual_stamina": 3
        }}),
    ]
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    println!("=== Embedded hookcast-core Example ===\n");

    // Create custom components
    let (queue, producer) = MemoryQueue::new();
    let sent = Arc::new(AtomicUsize::new(0));
    let sink = ConsoleSink {
        sent: Arc::clone(&sent),
    };
    let cache = LfuCache::<IdentityKey, WebhookEvent>::new(64)?;

    let mut config = DispatchConfig::new();
    config.event_channel_capacity = 100;

    // Create engine
    println!("1. Creating engine...");
    let (engine, mut event_rx) =
        DispatchEngine::new(Box::new(queue), Box::new(sink), Box::new(cache), config)?;

    // Spawn event listener (optional)
    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    // Run engine in background
    println!("2. Starting engine in background...");
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Produce events
    println!("3. Producing events...\n");
    for envelope in envelopes() {
        producer.push(WebhookEvent::from_envelope(envelope)?)?;
    }

    // Wait until the engine has acknowledged all of them
    producer.join().await;

    println!("\n4. Stopping engine...");
    let _ = shutdown_tx.send(());
    engine_handle.await??;
    let _ = tokio::time::timeout(std::time::Duration::from_millis(100), event_listener).await;

    println!("\n=== {} of 5 events delivered ===", sent.load(Ordering::SeqCst));
    println!("Key Points:");
    println!("- Engine lifecycle is fully controlled by application");
    println!("- Unchanged duplicates are suppressed");
    println!("- Low-quality location-point events are filtered");

    Ok(())
}
