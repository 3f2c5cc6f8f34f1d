use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use lifelens_flow::{
    CancerType, DEFAULT_BASE_URL, HttpClient, Sender, WorkflowCoordinator, progress,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lifelens_cli=info,lifelens_flow=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "image/png",
    }
}

fn print_report(coordinator: &WorkflowCoordinator) {
    let snapshot = coordinator.snapshot();

    println!();
    for step in progress(&snapshot) {
        let mark = if step.done { "✓" } else { "✕" };
        println!("  [{mark}] {}", step.label);
    }
    println!();

    if let (Some(prediction), Some(tier)) = (&snapshot.prediction, snapshot.risk_tier()) {
        println!("  Prediction: {}", prediction.diagnosis);
        println!("  Confidence: {}%", prediction.confidence);
        println!("  Risk level: {tier}");
        match &prediction.heatmap {
            Some(_) => println!("  Heatmap:    available (Grad-CAM overlay)"),
            None => println!("  Heatmap:    not provided"),
        }
        println!();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        bail!("usage: lifelens-cli <image> [breast_cancer|melanoma]");
    };
    let cancer_type = match args.next() {
        Some(raw) => raw.parse::<CancerType>()?,
        None => CancerType::default(),
    };

    let base_url = std::env::var("LIFELENS_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    info!(base_url, "connecting to inference service");

    let coordinator = Arc::new(WorkflowCoordinator::new(Arc::new(HttpClient::new(
        base_url,
    ))));

    let path = Path::new(&image_path);
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {image_path}"))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    coordinator.select_cancer_type(cancer_type);
    println!("{}", cancer_type.upload_hint());
    coordinator.select_image(bytes, mime_for(path), filename)?;

    if let Err(e) = coordinator.run_analysis().await {
        // The workflow stays at ImageSelected; rerunning the command retries.
        bail!("analysis failed: {e}");
    }
    print_report(&coordinator);

    println!("Chat with LifeLens (empty line to quit):");
    let mut seen = coordinator.snapshot().messages.len();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }
        coordinator.send_chat(&line).await;

        let snapshot = coordinator.snapshot();
        for message in &snapshot.messages[seen..] {
            if message.sender == Sender::Bot {
                println!("LifeLens: {}", message.text);
            }
        }
        seen = snapshot.messages.len();
    }

    Ok(())
}
