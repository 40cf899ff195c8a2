use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use motion_hub_rs::error::interval_from_secs;
use motion_hub_rs::platform::simulated::SimulatedBackend;
use motion_hub_rs::{HubConfig, MotionHub, SensorKind, SubscriptionRequest, TiltTracker};

#[derive(Parser, Debug)]
#[command(name = "motion_hub")]
#[command(about = "Stream simulated motion readings as JSON lines", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(value_name = "SECONDS", default_value = "5")]
    duration: u64,

    /// Sensor to stream (accelerometer, gyroscope, magnetometer, device-motion)
    #[arg(long, default_value = "device-motion")]
    sensor: String,

    /// Update interval in seconds (config default when omitted)
    #[arg(long)]
    interval: Option<f64>,

    /// Print view-tilt rotations from the fused attitude
    #[arg(long)]
    tilt: bool,

    /// Print one current reading and exit
    #[arg(long)]
    once: bool,

    /// Simulate a dropout every N samples (0 = never)
    #[arg(long, default_value = "0")]
    error_every: u64,

    /// JSON hub config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HubConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => HubConfig::default(),
    };
    let kind: SensorKind = args.sensor.parse()?;

    eprintln!("[{}] Motion Hub starting", ts_now());
    eprintln!("  Sensor: {}", if args.tilt { "tilt" } else { kind.name() });
    eprintln!("  Duration: {} seconds (0=continuous)", args.duration);
    eprintln!("  Dropout every: {} samples (0=never)", args.error_every);

    let hub = simulated_hub(config, args.error_every)?;

    if args.once {
        let timeout = hub.config().current_value_timeout()?;
        let reading = hub.get_current_value_async(kind, timeout).await?;
        println!("{}", serde_json::to_string(&reading)?);
        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut tracker = None;

    if args.tilt {
        let mut tilt = hub.config().tilt.clone();
        if let Some(secs) = args.interval {
            tilt.interval_secs = secs;
        }
        tracker = Some(TiltTracker::start(&hub, &tilt, move |rotation| {
            if let Ok(line) = serde_json::to_string(&rotation) {
                let _ = tx.send(line);
            }
        })?);
    } else {
        let errors = tx.clone();
        let mut request = SubscriptionRequest::new(kind, move |reading| {
            if let Ok(line) = serde_json::to_string(reading) {
                let _ = tx.send(line);
            }
        })
        .on_error(move |err| {
            let _ = errors.send(json!({ "error": err.to_string() }).to_string());
        });
        if let Some(secs) = args.interval {
            request = request.interval(interval_from_secs(secs)?);
        }
        hub.subscribe(request)?;
    }

    let run_for = async {
        if args.duration == 0 {
            std::future::pending::<()>().await
        } else {
            sleep(Duration::from_secs(args.duration)).await
        }
    };
    tokio::pin!(run_for);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut lines = 0usize;
    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => {
                    println!("{}", line);
                    lines += 1;
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                eprintln!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
            _ = &mut run_for => {
                eprintln!("[{}] Duration reached, stopping...", ts_now());
                break;
            }
        }
    }

    drop(tracker);
    let cancelled = hub.stop_all();
    eprintln!(
        "[{}] Done: {} lines, {} subscriptions cancelled",
        ts_now(),
        lines,
        cancelled
    );
    Ok(())
}

fn simulated_hub(config: HubConfig, error_every: u64) -> Result<MotionHub> {
    let mut builder = MotionHub::builder().config(config);
    for kind in SensorKind::ALL {
        let backend = SimulatedBackend::new(kind).with_error_every(error_every);
        builder = builder.backend(kind, Arc::new(backend));
    }
    Ok(builder.build()?)
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
