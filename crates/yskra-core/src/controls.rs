//! Mirrored media-control state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Covered time range in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Rendition offered by the peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quality {
    pub name: String,
}

/// Text track descriptor; the peer never reports any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextTrack {
    pub id: usize,
    pub label: String,
    pub language: String,
}

/// Snapshot of every control field, laid out like a native media element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaControls {
    pub current_time: f64,
    pub duration: f64,
    pub seeking: bool,
    pub volume: f64,
    pub waiting: bool,
    pub ended: bool,
    pub playing: bool,
    pub rate: f64,
    pub stalled: bool,
    pub buffered: Vec<TimeRange>,
    pub tracks: Vec<TextTrack>,
    pub selected_track: Option<usize>,
    pub is_picture_in_picture: bool,
    pub muted: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub qualities: Vec<Quality>,
    pub quality: Option<usize>,
}

impl Default for MediaControls {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            seeking: false,
            volume: 1.0,
            waiting: false,
            ended: false,
            playing: false,
            rate: 1.0,
            stalled: false,
            buffered: Vec::new(),
            tracks: Vec::new(),
            selected_track: None,
            is_picture_in_picture: false,
            muted: false,
            looping: false,
            qualities: Vec::new(),
            quality: Some(0),
        }
    }
}

impl MediaControls {
    /// End of the last buffered range
    pub fn end_buffer(&self) -> f64 {
        self.buffered.last().map(|r| r.end).unwrap_or(0.0)
    }

    /// Name of the selected rendition, when known
    pub fn quality_name(&self) -> Option<&str> {
        self.quality
            .and_then(|i| self.qualities.get(i))
            .map(|q| q.name.as_str())
    }
}

/// Who initiated a write to a mirrored field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The caller or UI; forwarded to the peer
    Local,
    /// Applied from a peer event; never forwarded
    Remote,
}

/// Write to a field mirrored in both directions
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    CurrentTime(f64),
    Playing(bool),
    Rate(f64),
    Volume(f64),
    Muted(bool),
    Looping(bool),
    Quality(Option<usize>),
}

impl FieldUpdate {
    /// Store the value, returning whether it changed
    pub fn apply_to(&self, controls: &mut MediaControls) -> bool {
        fn set<T: PartialEq + Copy>(slot: &mut T, value: T) -> bool {
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        }

        match *self {
            FieldUpdate::CurrentTime(t) => set(&mut controls.current_time, t),
            FieldUpdate::Playing(p) => set(&mut controls.playing, p),
            FieldUpdate::Rate(r) => set(&mut controls.rate, r),
            FieldUpdate::Volume(v) => set(&mut controls.volume, v),
            FieldUpdate::Muted(m) => set(&mut controls.muted, m),
            FieldUpdate::Looping(l) => set(&mut controls.looping, l),
            FieldUpdate::Quality(q) => set(&mut controls.quality, q),
        }
    }
}

/// Source failed to load in the frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceError {
    pub url: Option<Url>,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Peer reported a playback failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackError {
    pub message: String,
    pub at: DateTime<Utc>,
}
