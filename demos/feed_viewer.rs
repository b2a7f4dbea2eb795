//! Feed viewer example
//!
//! Run with: cargo run --example feed_viewer [HOST] [CAMERA]
//!
//! Examples:
//!   cargo run --example feed_viewer                    # localhost, Oak0
//!   cargo run --example feed_viewer amiga.local        # amiga.local, Oak0
//!   cargo run --example feed_viewer amiga.local Oak1   # amiga.local, Oak1
//!
//! Connects to the camera backend, subscribes to the preview stream, and
//! prints every session state change. Press `t` + Enter to toggle inference
//! (switching to the annotated stream), `r` + Enter to reconnect after an
//! error, Ctrl+C to quit.

use agrovision_feed::{CameraId, ConnectionState, CropKind, FeedConfig, FeedSession};
use tokio::io::{AsyncBufReadExt, BufReader};

fn print_usage() {
    eprintln!("Usage: feed_viewer [HOST] [CAMERA]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  HOST      Backend host (default: localhost)");
    eprintln!("  CAMERA    Initial camera, Oak0 or Oak1 (default: Oak0)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let host = args.get(1).cloned().unwrap_or_else(|| "localhost".into());
    let camera: CameraId = match args.get(2) {
        Some(name) => match name.parse() {
            Ok(camera) => camera,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => CameraId::Oak0,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agrovision_feed=debug".parse()?),
        )
        .init();

    println!("Connecting to ws://{}:8042 (camera {})", host, camera);
    println!("Commands: t=toggle inference, r=reconnect, q=quit");
    println!();

    let handle = FeedSession::connect(FeedConfig::with_host(host));
    handle.select(camera, CropKind::Strawberry).await?;

    let mut snapshots = handle.watch();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow().clone();
                let frame = match &snapshot.latest_frame {
                    Some(frame) => format!("frame #{} ({} bytes)", frame.seq(), frame.bytes().len()),
                    None => "no frame".to_string(),
                };
                println!(
                    "[{}] stream={:?} control={:?} inferring={} {} ({} frames, {} reconnects)",
                    snapshot.selection,
                    snapshot.frame_channel,
                    snapshot.control_channel,
                    snapshot.inference_running,
                    frame,
                    snapshot.stats.frames_received,
                    snapshot.stats.reconnects,
                );
                if snapshot.frame_channel == ConnectionState::Errored {
                    if let Some(reason) = &snapshot.frame_error {
                        println!("  stream error: {} (press r to reconnect)", reason);
                    }
                }
            }
            line = stdin.next_line() => match line?.as_deref().map(str::trim) {
                Some("t") => {
                    if let Err(e) = handle.toggle_inference().await {
                        println!("Cannot toggle inference right now: {}", e);
                    }
                }
                Some("r") => handle.reconnect().await?,
                Some("q") | None => break,
                Some(_) => println!("Commands: t=toggle inference, r=reconnect, q=quit"),
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    handle.end().await.ok();
    Ok(())
}
