//! Tone-generator demo.
//!
//! Plays a square wave through the resona driver, standing in for the
//! irregular sample producer: samples are generated in short bursts with
//! sleeps in between, so the ring and the playback gate do real work
//! absorbing the cadence mismatch.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use resona_core::{AudioOutput, OutputConfig, SampleFormat};
use tracing::info;

/// Producer bursts per second. An emulator pushing once per video frame
/// would sit around 60; 200 keeps bursts comfortably inside the latency
/// window at any common rate.
const BURSTS_PER_SEC: u32 = 200;

#[derive(Debug)]
struct Args {
    freq: f32,
    seconds: f32,
    format: SampleFormat,
    latency_ms: u32,
    device: Option<String>,
    tap: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        freq: 440.0,
        seconds: 3.0,
        format: SampleFormat::I16,
        latency_ms: 50,
        device: None,
        tap: None,
    };

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--freq" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --freq".into());
                };
                args.freq = v
                    .parse::<f32>()
                    .map_err(|_| "invalid value for --freq".to_string())?;
            }
            "--seconds" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --seconds".into());
                };
                args.seconds = v
                    .parse::<f32>()
                    .map_err(|_| "invalid value for --seconds".to_string())?;
            }
            "--format" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --format".into());
                };
                args.format = match v.as_str() {
                    "i16" => SampleFormat::I16,
                    "u16" => SampleFormat::U16,
                    "f32" => SampleFormat::F32,
                    other => return Err(format!("unknown format: {other}")),
                };
            }
            "--latency-ms" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --latency-ms".into());
                };
                args.latency_ms = v
                    .parse::<u32>()
                    .map_err(|_| "invalid value for --latency-ms".to_string())?;
            }
            "--device" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --device".into());
                };
                args.device = Some(v);
            }
            "--tap" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --tap".into());
                };
                args.tap = Some(PathBuf::from(v));
            }
            "--help" | "-h" => {
                println!(
                    "Usage: resona-demo [--freq <hz>] [--seconds <n>] [--format <i16|u16|f32>] \\
  [--latency-ms <n>] [--device <name>] [--tap <file.wav>]"
                );
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }
    Ok(args)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("resona-demo failed: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let args = parse_args().map_err(anyhow::Error::msg)?;

    let mut output = AudioOutput::open(OutputConfig {
        device: args.device.clone(),
        format: args.format,
        latency_ms: args.latency_ms,
        tap: args.tap.clone(),
        ..OutputConfig::default()
    })
    .context("failed to open audio output")?;

    let rate = output.sample_rate();
    info!(
        rate,
        channels = output.spec().channels,
        format = %output.spec().format,
        "tone demo starting"
    );

    // Log gate transitions from a monitor thread; the receiver disconnects
    // once the output shuts down.
    let events = output.events();
    let monitor = thread::spawn(move || {
        while let Ok(event) = events.recv() {
            info!(
                state = ?event.state,
                occupancy = format_args!("{:.2}", event.occupancy),
                "playback state changed"
            );
        }
    });

    // Square wave in normalized [0, 1] amplitude, generated in bursts.
    let burst_len = (rate / BURSTS_PER_SEC).max(1) as usize;
    let total_samples = (args.seconds * rate as f32) as usize;
    let phase_step = args.freq / rate as f32;
    let mut phase = 0.0f32;

    let mut produced = 0usize;
    while produced < total_samples {
        for _ in 0..burst_len.min(total_samples - produced) {
            let level = if phase < 0.5 { 0.75 } else { 0.25 };
            output.add_sample(level);
            phase += phase_step;
            if phase >= 1.0 {
                phase -= 1.0;
            }
            produced += 1;
        }
        thread::sleep(Duration::from_millis(1000 / BURSTS_PER_SEC as u64));
    }

    // Let the sink drain what the ring still holds before tearing down.
    thread::sleep(Duration::from_millis(args.latency_ms as u64 * 2));

    let snapshot = output.metrics();
    output.shutdown();
    let _ = monitor.join();

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
