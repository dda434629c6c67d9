//! Audio playback via the cpal backend.
//!
//! # Design constraints
//!
//! The cpal output callback runs on an OS audio thread at elevated priority.
//! It **must not**:
//! - Allocate heap memory
//! - Block for unbounded time
//! - Perform I/O
//!
//! This module satisfies that contract by keeping the callback to one bounded
//! memcpy out of the ring under a `parking_lot::Mutex`, in-place padding and
//! channel fan-out, and relaxed atomic counter bumps. The producer side holds
//! the same mutex for a single-sample write. The gate's hardware pause/resume
//! side effect always runs outside the lock.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). [`AudioOutput`] therefore must be created, driven, and dropped on
//! the same thread — in practice, the thread running the sample-producing
//! engine.

pub mod device;

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use cpal::traits::DeviceTrait;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    buffering::SampleRing,
    error::{ResonaError, Result},
    gate::{PlaybackGate, PlaybackState},
    metrics::{MetricsSnapshot, OutputMetrics},
    sample::{OutputSample, SampleFormat},
    tap::SampleTap,
};

/// Gate-transition events buffered for a slow subscriber.
const EVENT_CAPACITY: usize = 64;

/// Requested output parameters. The device's negotiated values win wherever
/// they differ; see [`NegotiatedSpec`] for what was actually granted.
///
/// The producer-facing channel count is fixed at 1 and is not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Preferred output device name. `None` selects the system default.
    pub device: Option<String>,
    /// Sample rate hint (Hz).
    pub sample_rate: u32,
    /// Desired sample storage format.
    pub format: SampleFormat,
    /// Target latency window (ms). Ring capacity is
    /// `latency_secs × negotiated rate × 2` — headroom to refill while the
    /// gate holds playback at half-full.
    pub latency_ms: u32,
    /// Callback block-size hint (frames), clamped to the device's range.
    pub block_frames: u32,
    /// Raw-audio tap destination. `None` disables the tap.
    pub tap: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 44_100,
            format: SampleFormat::I16,
            latency_ms: 50,
            block_frames: 1024,
            tap: None,
        }
    }
}

/// What the hardware actually granted at `open`.
#[derive(Debug, Clone, Serialize)]
pub struct NegotiatedSpec {
    /// Granted sample rate (Hz).
    pub sample_rate: u32,
    /// Granted channel count. Mono samples fan out across all channels.
    pub channels: u16,
    /// Granted storage format.
    pub format: SampleFormat,
    /// Granted callback block size, when the device reports one.
    pub block_frames: Option<u32>,
}

/// Published whenever the playback gate flips state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackEvent {
    pub state: PlaybackState,
    /// Ring occupancy that triggered the transition.
    pub occupancy: f32,
}

/// Producer-side handle to the ring: quantize-and-push plus occupancy reads.
///
/// Object-safe so [`AudioOutput`] can hold one handle regardless of which
/// storage format the device negotiated.
pub trait SampleWriter: Send + Sync {
    /// Quantize a clamped level, push it, and return the post-push occupancy.
    fn push_level(&self, level: f32) -> f32;

    /// Current ring occupancy in `[0.0, 1.0]`.
    fn occupancy(&self) -> f32;
}

/// Playback toggle on the hardware sink.
///
/// The cpal stream implements this for real hardware; tests substitute a
/// recording fake to observe gate decisions without a device.
pub trait PlaybackSink {
    fn set_playing(&self, playing: bool) -> Result<()>;
}

struct CpalSink {
    stream: cpal::Stream,
}

impl PlaybackSink for CpalSink {
    fn set_playing(&self, playing: bool) -> Result<()> {
        use cpal::traits::StreamTrait;
        if playing {
            self.stream
                .play()
                .map_err(|e| ResonaError::AudioStream(e.to_string()))
        } else {
            self.stream
                .pause()
                .map_err(|e| ResonaError::AudioStream(e.to_string()))
        }
    }
}

/// Ring state shared between the producer thread and the audio callback.
///
/// The mutex guards the ring and the last-delivered sample; every other
/// field is a relaxed atomic. Both lock holders do bounded work only.
pub struct SharedRing<T> {
    state: Mutex<RingState<T>>,
    metrics: Arc<OutputMetrics>,
}

struct RingState<T> {
    ring: SampleRing<T>,
    /// Most recent sample handed to the hardware; pads underruns so a starved
    /// callback holds the waveform instead of snapping to zero.
    last: T,
}

impl<T: OutputSample> SharedRing<T> {
    pub fn new(capacity: usize, metrics: Arc<OutputMetrics>) -> Self {
        Self {
            state: Mutex::new(RingState {
                ring: SampleRing::new(capacity),
                last: T::SILENCE,
            }),
            metrics,
        }
    }

    /// The pull side: serve one hardware block.
    ///
    /// Pops into the leading frames, pads any shortfall by repeating the last
    /// delivered sample (digital silence before anything was delivered), then
    /// fans each mono frame out across the interleaved channels in place.
    /// Real-time safe: no allocation, no I/O, bounded lock hold.
    pub fn fill(&self, dest: &mut [T], channels: usize) {
        let channels = channels.max(1);
        let frames = dest.len() / channels;

        let (read, last) = {
            let mut state = self.state.lock();
            let read = state.ring.pop_block(&mut dest[..frames]);
            if read > 0 {
                state.last = dest[read - 1];
            }
            (read, state.last)
        };

        for slot in &mut dest[read..frames] {
            *slot = last;
        }

        if channels > 1 {
            // Backward walk: frame i only writes indices ≥ i, so unexpanded
            // frames are never clobbered before they are read.
            for frame in (0..frames).rev() {
                let sample = dest[frame];
                let base = frame * channels;
                for lane in &mut dest[base..base + channels] {
                    *lane = sample;
                }
            }
        }
        // A destination not divisible by the channel count still gets every
        // slot written.
        for slot in &mut dest[frames * channels..] {
            *slot = last;
        }

        self.metrics.blocks_pulled.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .samples_pulled
            .fetch_add(read as u64, Ordering::Relaxed);
        if read < frames {
            self.metrics
                .samples_padded
                .fetch_add((frames - read) as u64, Ordering::Relaxed);
        }
    }
}

impl<T: OutputSample> SampleWriter for SharedRing<T> {
    fn push_level(&self, level: f32) -> f32 {
        let sample = T::from_level(level);
        let (evicted, occupancy) = {
            let mut state = self.state.lock();
            let evicted = state.ring.push(sample);
            (evicted, state.ring.occupancy())
        };
        self.metrics
            .samples_pushed
            .fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.metrics
                .samples_evicted
                .fetch_add(1, Ordering::Relaxed);
        }
        occupancy
    }

    fn occupancy(&self) -> f32 {
        self.state.lock().ring.occupancy()
    }
}

/// The stream endpoint: owns the ring, the gate, and the hardware sink.
///
/// **Not `Send`** — the cpal stream is bound to its creation thread on
/// Windows/macOS. Create, drive, and drop this type on the producer thread.
pub struct AudioOutput {
    // Field order matters on a plain drop: the sink goes first, stopping the
    // callback source before the ring handle is released.
    sink: Box<dyn PlaybackSink>,
    writer: Arc<dyn SampleWriter>,
    gate: PlaybackGate,
    spec: NegotiatedSpec,
    metrics: Arc<OutputMetrics>,
    tap: Option<SampleTap>,
    event_tx: Sender<PlaybackEvent>,
    event_rx: Receiver<PlaybackEvent>,
}

impl AudioOutput {
    /// Open the output device and build the stream, initially paused.
    ///
    /// Resolves the device (preferred name → default → first available),
    /// negotiates rate/format/block size (the device's supported values win
    /// over the request), and sizes the ring from the latency target.
    ///
    /// # Errors
    /// Returns `ResonaError::NoOutputDevice` when no output exists, or
    /// `ResonaError::AudioDevice` / `AudioStream` when the sink cannot be
    /// opened. Open failure is fatal: there is nothing to play into.
    pub fn open(config: OutputConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = device::resolve_output_device(&host, config.device.as_deref())?;

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening output device"
        );

        let spec = negotiate(&device, &config)?;
        let capacity = ring_capacity(config.latency_ms, spec.sample_rate);

        info!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            format = %spec.format,
            capacity,
            "output config negotiated"
        );

        let stream_config = cpal::StreamConfig {
            channels: spec.channels,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: match spec.block_frames {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let metrics = Arc::new(OutputMetrics::default());
        let (sink, writer) = match spec.format {
            SampleFormat::I16 => bind_stream::<i16>(&device, &stream_config, capacity, &metrics)?,
            SampleFormat::U16 => bind_stream::<u16>(&device, &stream_config, capacity, &metrics)?,
            SampleFormat::F32 => bind_stream::<f32>(&device, &stream_config, capacity, &metrics)?,
        };

        // Hardware starts paused; the gate resumes it once the ring pre-fills
        // past the resume threshold.
        sink.set_playing(false)?;

        let tap = match &config.tap {
            Some(path) => Some(SampleTap::create(path, spec.sample_rate)?),
            None => None,
        };

        let (event_tx, event_rx) = crossbeam_channel::bounded(EVENT_CAPACITY);

        Ok(Self {
            sink,
            writer,
            gate: PlaybackGate::new(),
            spec,
            metrics,
            tap,
            event_tx,
            event_rx,
        })
    }

    /// Accept one normalized sample from the producer. Always succeeds.
    ///
    /// Levels outside `[0.0, 1.0]` are a programmer error: debug builds
    /// assert, release builds clamp before quantizing.
    pub fn add_sample(&mut self, level: f32) {
        debug_assert!(
            (0.0..=1.0).contains(&level),
            "sample level out of range: {level}"
        );
        let level = level.clamp(0.0, 1.0);

        let occupancy = self.writer.push_level(level);

        if let Some(mut tap) = self.tap.take() {
            match tap.write(level) {
                Ok(()) => self.tap = Some(tap),
                Err(e) => warn!("raw-audio tap write failed, disabling tap: {e}"),
            }
        }

        if let Some(state) = self.gate.update(occupancy) {
            self.apply_state(state, occupancy);
        }
    }

    /// Current ring occupancy in `[0.0, 1.0]`.
    pub fn usage_ratio(&self) -> f32 {
        self.writer.occupancy()
    }

    /// The negotiated sample rate (Hz). The producer should generate at this
    /// cadence; no resampling happens downstream.
    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn spec(&self) -> &NegotiatedSpec {
        &self.spec
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.gate.state()
    }

    /// Explicit pause/resume override. Idempotent; the gate may override the
    /// requested state again on the next push.
    pub fn set_paused(&mut self, paused: bool) {
        let state = if paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        if self.gate.force(state) {
            let occupancy = self.writer.occupancy();
            self.apply_state(state, occupancy);
        }
    }

    /// Snapshot of playback counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Receiver for gate-transition events. Non-blocking on the producer
    /// side: when the channel is full, events are dropped, not playback.
    pub fn events(&self) -> Receiver<PlaybackEvent> {
        self.event_rx.clone()
    }

    /// Stop playback and tear down.
    ///
    /// Ordering invariant: the sink is paused and dropped, stopping the
    /// callback source, before the ring handle is released. The callback
    /// closure's own `Arc` keeps ring storage alive through any callback
    /// already in flight.
    pub fn shutdown(self) {
        let Self {
            sink,
            writer,
            tap,
            metrics,
            ..
        } = self;

        if let Err(e) = sink.set_playing(false) {
            warn!("failed to pause sink during shutdown: {e}");
        }
        drop(sink);
        drop(writer);

        if let Some(tap) = tap {
            if let Err(e) = tap.finalize() {
                warn!("failed to finalize raw-audio tap: {e}");
            }
        }

        let snap = metrics.snapshot();
        info!(
            samples_pushed = snap.samples_pushed,
            samples_evicted = snap.samples_evicted,
            samples_pulled = snap.samples_pulled,
            samples_padded = snap.samples_padded,
            gate_resumes = snap.gate_resumes,
            gate_pauses = snap.gate_pauses,
            "audio output shut down"
        );
    }

    fn apply_state(&mut self, state: PlaybackState, occupancy: f32) {
        match state {
            PlaybackState::Playing => {
                self.metrics.gate_resumes.fetch_add(1, Ordering::Relaxed);
            }
            PlaybackState::Paused => {
                self.metrics.gate_pauses.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(?state, occupancy, "playback gate transition");

        // The producer must never be disrupted by a sink hiccup: log and
        // carry on.
        if let Err(e) = self.sink.set_playing(state == PlaybackState::Playing) {
            error!("failed to toggle playback: {e}");
        }
        let _ = self.event_tx.try_send(PlaybackEvent { state, occupancy });
    }
}

fn bind_stream<T: OutputSample>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    capacity: usize,
    metrics: &Arc<OutputMetrics>,
) -> Result<(Box<dyn PlaybackSink>, Arc<dyn SampleWriter>)> {
    let shared = Arc::new(SharedRing::<T>::new(capacity, Arc::clone(metrics)));
    let callback_ring = Arc::clone(&shared);
    let channels = stream_config.channels as usize;

    let stream = device
        .build_output_stream(
            stream_config,
            move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
                callback_ring.fill(data, channels);
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(|e| ResonaError::AudioStream(e.to_string()))?;

    let writer: Arc<dyn SampleWriter> = shared;
    Ok((Box::new(CpalSink { stream }), writer))
}

/// Ring capacity from the latency target: twice the latency window, so the
/// gate's half-full resume point sits one full window above empty.
/// Integer math: float rounding must not shave a sample off the window.
fn ring_capacity(latency_ms: u32, sample_rate: u32) -> usize {
    let samples = latency_ms as u64 * sample_rate as u64 * 2 / 1000;
    (samples as usize).max(1)
}

/// Pick the device configuration closest to the request.
///
/// Preference order: mono in the requested format, mono in any supported
/// format, then the fewest channels on offer; among those, a range covering
/// the requested rate. The granted rate is the request clamped into the
/// chosen range. Falls back to the device default configuration when nothing
/// matches the supported format set.
fn negotiate(device: &cpal::Device, config: &OutputConfig) -> Result<NegotiatedSpec> {
    let requested_format = config.format.to_cpal();
    let hint = config.sample_rate;

    let candidates: Vec<(SampleFormat, cpal::SupportedStreamConfigRange)> = device
        .supported_output_configs()
        .map_err(|e| ResonaError::AudioDevice(e.to_string()))?
        .filter_map(|range| SampleFormat::from_cpal(range.sample_format()).map(|f| (f, range)))
        .collect();

    let chosen = candidates.into_iter().min_by_key(|(_, range)| {
        let covers_hint =
            range.min_sample_rate().0 <= hint && hint <= range.max_sample_rate().0;
        (
            range.channels() != 1,
            range.sample_format() != requested_format,
            !covers_hint,
            range.channels(),
        )
    });

    let Some((format, range)) = chosen else {
        let default = device
            .default_output_config()
            .map_err(|e| ResonaError::AudioDevice(e.to_string()))?;
        let format = SampleFormat::from_cpal(default.sample_format()).ok_or_else(|| {
            ResonaError::UnsupportedFormat(format!("{:?}", default.sample_format()))
        })?;
        warn!(
            format = %format,
            channels = default.channels(),
            "no supported output range matched; adopting device default config"
        );
        return Ok(NegotiatedSpec {
            sample_rate: default.sample_rate().0,
            channels: default.channels(),
            format,
            block_frames: block_hint(config.block_frames, default.buffer_size()),
        });
    };

    let sample_rate = hint.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
    let block_frames = block_hint(config.block_frames, range.buffer_size());
    Ok(NegotiatedSpec {
        sample_rate,
        channels: range.channels(),
        format,
        block_frames,
    })
}

fn block_hint(requested: u32, supported: &cpal::SupportedBufferSize) -> Option<u32> {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } => Some(requested.clamp(*min, *max)),
        cpal::SupportedBufferSize::Unknown => None,
    }
}
