//! CLI command implementations

use anyhow::{bail, Context};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};
use yskra_core::{
    AdapterConfig, Command, EmbedProvider, FrameHost, MediaControls, MemoryDom, MemoryFrameHost,
    MessageEnvelope, OutboundMessage, PlayerBackend, PlayerJsFrame, SupportStatus, WindowId,
};

type Player = PlayerJsFrame<Arc<MemoryFrameHost>>;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Source window for `foreign` steps, never handed out to a frame
const FOREIGN_WINDOW: WindowId = WindowId(u64::MAX);

/// One line of a replay trace
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    /// Message posted by the frame's own window
    Peer(Value),
    /// Message posted by some other window
    Foreign(Value),
    /// Frame load outcome; `false` reports a source error
    FrameLoaded(bool),
    /// Write made by the local UI
    Local(LocalWrite),
    WaitMs(u64),
}

/// Local control write, `{"field": ..., "value": ...}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum LocalWrite {
    CurrentTime(f64),
    Playing(bool),
    Rate(f64),
    Volume(f64),
    Muted(bool),
    Looping(bool),
    Quality(Option<usize>),
}

impl LocalWrite {
    fn apply(&self, player: &Player) {
        match *self {
            LocalWrite::CurrentTime(t) => player.set_current_time(t),
            LocalWrite::Playing(p) => player.set_playing(p),
            LocalWrite::Rate(r) => player.set_rate(r),
            LocalWrite::Volume(v) => player.set_volume(v),
            LocalWrite::Muted(m) => player.set_muted(m),
            LocalWrite::Looping(l) => player.set_looping(l),
            LocalWrite::Quality(q) => player.set_quality(q),
        }
    }
}

/// Outcome of a replay
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub source: String,
    pub ready: bool,
    pub sent: Vec<OutboundMessage>,
    pub controls: MediaControls,
    pub playback_errors: Vec<String>,
    pub source_errors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ProviderSupport {
    provider: EmbedProvider,
    status: SupportStatus,
    backend: PlayerBackend,
}

/// Load adapter configuration, defaults when no file is given
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AdapterConfig> {
    let Some(path) = path else {
        return Ok(AdapterConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

/// Parse a JSON-lines trace; blank lines and `#` comments are skipped
pub fn parse_trace(text: &str) -> anyhow::Result<Vec<TraceStep>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid trace line {}", i + 1))
        })
        .collect()
}

/// Replay a trace file
pub async fn replay(
    trace: &Path,
    source: &str,
    config: AdapterConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(trace)
        .await
        .with_context(|| format!("Failed to read trace {}", trace.display()))?;
    let steps = parse_trace(&text)?;

    info!(trace = %trace.display(), steps = steps.len(), "Replaying trace");
    let report = run_replay(&steps, source, config).await?;

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_report(&report);
            Ok(())
        }
    }
}

/// Drive an adapter over an in-memory frame through the given steps
pub async fn run_replay(
    steps: &[TraceStep],
    source: &str,
    config: AdapterConfig,
) -> anyhow::Result<ReplayReport> {
    let dom = Arc::new(MemoryDom::new());
    let video = dom.create_element(dom.root(), "video");
    let host = Arc::new(MemoryFrameHost::new(dom, video));
    let player = PlayerJsFrame::new(Arc::clone(&host), config);

    if let Some(err) = player.capability_error() {
        warn!(error = %err, "Adapter running degraded");
    }

    let playback_errors = Arc::new(Mutex::new(Vec::<String>::new()));
    let source_errors = Arc::new(Mutex::new(Vec::<String>::new()));

    let sink = Arc::clone(&playback_errors);
    let _playback = player.on_playback_error(move |err| {
        lock(&sink).push(err.message.clone());
    });
    let sink = Arc::clone(&source_errors);
    let _source = player.on_source_error(move |err| {
        lock(&sink).push(err.message.clone());
    });

    let (finished, trace_done) = oneshot::channel::<()>();
    let load = async {
        tokio::select! {
            result = player.load(source) => Some(result),
            _ = trace_done => None,
        }
    };
    let run = async {
        for step in steps {
            apply_step(&player, &host, step).await;
        }
        settle().await;
        let _ = finished.send(());
    };

    let (loaded, ()) = tokio::join!(load, run);
    match loaded {
        Some(Ok(())) => info!("Peer became ready"),
        Some(Err(err)) => return Err(err.into()),
        None => warn!("Trace ended before the peer became ready"),
    }

    let report = ReplayReport {
        source: source.to_string(),
        ready: player.is_ready(),
        sent: host.sent(),
        controls: player.controls(),
        playback_errors: std::mem::take(&mut *lock(&playback_errors)),
        source_errors: std::mem::take(&mut *lock(&source_errors)),
    };

    player.destroy();
    Ok(report)
}

async fn apply_step(player: &Player, host: &MemoryFrameHost, step: &TraceStep) {
    match step {
        TraceStep::Peer(payload) => match host.frame_window() {
            Some(window) => player.handle_message(MessageEnvelope::new(window, payload.clone())),
            None => warn!("No frame mounted, peer message dropped"),
        },
        TraceStep::Foreign(payload) => {
            player.handle_message(MessageEnvelope::new(FOREIGN_WINDOW, payload.clone()))
        }
        TraceStep::FrameLoaded(true) => player.notify_frame_loaded(),
        TraceStep::FrameLoaded(false) => player.notify_source_error("frame failed to load"),
        TraceStep::Local(write) => write.apply(player),
        TraceStep::WaitMs(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
    }
    settle().await;
}

/// Give the adapter's background tasks a chance to run
async fn settle() {
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
}

fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// `api` followed by the compact argument, if any
fn wire_line(message: &OutboundMessage) -> String {
    match &message.set {
        Some(set) => format!("{} {}", message.api, set),
        None => message.api.clone(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn print_report(report: &ReplayReport) {
    let c = &report.controls;

    println!("Source: {}", report.source);
    println!("  Ready: {}", report.ready);

    println!("\nSent ({}):", report.sent.len());
    for message in &report.sent {
        println!("  {}", wire_line(message));
    }

    println!("\nControls:");
    println!("  Position: {:.2}s / {:.2}s", c.current_time, c.duration);
    println!("  Buffered to: {:.2}s", c.end_buffer());
    println!(
        "  Playing: {}  Waiting: {}  Ended: {}",
        c.playing, c.waiting, c.ended
    );
    println!(
        "  Volume: {:.2}  Muted: {}  Rate: {}  Loop: {}",
        c.volume, c.muted, c.rate, c.looping
    );
    let qualities: Vec<&str> = c.qualities.iter().map(|q| q.name.as_str()).collect();
    println!(
        "  Quality: {} of [{}]",
        c.quality_name().unwrap_or("-"),
        qualities.join(", ")
    );

    if !report.playback_errors.is_empty() || !report.source_errors.is_empty() {
        println!("\nErrors:");
        for message in &report.source_errors {
            println!("  source: {}", message);
        }
        for message in &report.playback_errors {
            println!("  playback: {}", message);
        }
    }
}

/// Print the wire message for a command
pub fn encode(command: &str, arg: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    if command.trim().is_empty() {
        bail!("Command name must not be empty");
    }

    let message = Command::from_parts(command, arg.map(parse_argument)).to_message();
    match format {
        OutputFormat::Json => print_json(&message),
        OutputFormat::Text => {
            println!("{}", serde_json::to_string(&message)?);
            Ok(())
        }
    }
}

/// JSON when it parses, a plain string otherwise
fn parse_argument(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Show embed provider support
pub fn support(provider: Option<&str>, format: OutputFormat) -> anyhow::Result<()> {
    let providers = match provider {
        Some(name) => vec![name.parse::<EmbedProvider>().map_err(anyhow::Error::msg)?],
        None => EmbedProvider::ALL.to_vec(),
    };

    let rows: Vec<ProviderSupport> = providers
        .into_iter()
        .map(|provider| ProviderSupport {
            provider,
            status: provider.support_status(),
            backend: provider.backend(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Text => {
            println!("Embed providers:");
            for row in &rows {
                let backend = match row.backend {
                    PlayerBackend::PlayerJs => "playerjs frame",
                    PlayerBackend::Iframe => "plain iframe",
                };
                println!(
                    "  {:<10} {:<14} {}",
                    row.provider.to_string(),
                    row.status.to_string(),
                    backend
                );
            }
        }
    }

    Ok(())
}
