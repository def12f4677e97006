//! Operator command handlers.

use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;

use crate::cli::commands::TestInferenceCommand;
use crate::config::EdgeConfig;
use crate::edge::EdgeAi;
use crate::telemetry::TelemetryInput;

pub async fn handle_test_inference(config: EdgeConfig, cmd: TestInferenceCommand) -> Result<()> {
    let edge = EdgeAi::from_config(&config).await?;

    let telemetry = TelemetryInput {
        timestamp: Utc::now(),
        site_id: cmd.site_id,
        power_consumption: cmd.consumption,
        solar_production: Some(cmd.production),
        battery_soc: Some(cmd.battery),
        grid_power: Some(cmd.grid),
        temperature: Some(cmd.temperature),
        extensions: HashMap::new(),
    };

    println!("Running inference test with sample data...");
    println!(
        "Input telemetry: site={} consumption={} production={} battery={} grid={} temperature={}",
        telemetry.site_id,
        telemetry.power_consumption,
        cmd.production,
        cmd.battery,
        cmd.grid,
        cmd.temperature
    );

    let start = Instant::now();
    let prediction = edge.process_telemetry(&telemetry).await;
    let elapsed = start.elapsed();

    match prediction {
        Some(p) => {
            let preview: Vec<String> = p.values.iter().take(5).map(|v| format!("{:.3}", v)).collect();
            println!();
            println!("Prediction result:");
            println!("- ID: {}", p.id);
            println!("- Type: {}", p.forecast_type);
            println!(
                "- Values: [{}]{}",
                preview.join(", "),
                if p.values.len() > 5 { " ..." } else { "" }
            );
            println!("- Horizon: {}", p.values.len());
            println!("- Confidence: {:.2}", p.confidence);
            println!("- Model version: {}", p.model_version);
            println!("- Synced: {}", p.is_synced);
            println!();
            println!("Inference completed in {:.2}ms", elapsed.as_secs_f64() * 1000.0);
        }
        None => {
            println!("Inference produced no prediction; check that a model is installed.");
        }
    }

    edge.shutdown().await;
    Ok(())
}

pub async fn handle_sync_model(config: EdgeConfig) -> Result<()> {
    let edge = EdgeAi::from_config(&config).await?;

    println!("Forcing model sync...");
    let updated = edge.sync_agent().sync_model().await?;
    if updated {
        match edge.sync_agent().model_metadata() {
            Some(meta) => println!("Model was updated to v{}", meta.version),
            None => println!("Model was updated"),
        }
    } else {
        println!("Model is already up to date");
    }

    edge.shutdown().await;
    Ok(())
}

pub async fn handle_sync_predictions(config: EdgeConfig) -> Result<()> {
    let edge = EdgeAi::from_config(&config).await?;

    println!("Syncing queued predictions...");
    let count = edge.fallback().sync_queued_predictions().await;
    println!(
        "Synced {} predictions ({} still queued)",
        count,
        edge.fallback().queue_length()
    );

    edge.shutdown().await;
    Ok(())
}

pub async fn handle_status(config: EdgeConfig) -> Result<()> {
    let edge = EdgeAi::from_config(&config).await?;
    let status = edge.status().await;

    println!("Edge AI System Status");
    println!("---------------------");
    println!(
        "Network connectivity: {}",
        if status.online { "Online" } else { "Offline" }
    );
    println!("Model loaded: {}", if status.model_loaded { "Yes" } else { "No" });

    match &status.model_metadata {
        Some(meta) => {
            println!("Model version: {}", meta.version);
            println!("Model created: {}", meta.created_at);
            println!("Model features: {}", meta.features.join(", "));
        }
        None => println!("Model metadata: Not available"),
    }

    println!("Queued predictions: {}", status.queue_length);
    match status.last_sync {
        Some(at) => println!("Last model sync: {}", at),
        None => println!("Last model sync: Never"),
    }

    edge.shutdown().await;
    Ok(())
}
