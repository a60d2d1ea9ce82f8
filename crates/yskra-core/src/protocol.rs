//! PlayerJS postMessage protocol
//!
//! Outbound commands are posted to the frame window as `{ api, set }`.
//! The peer pushes `{ event, data }` notifications and answers
//! request/response commands with `{ event, answer }`, reusing the
//! command name as the event name.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message posted to the peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Command name
    pub api: String,
    /// Command argument
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Value>,
}

/// Message received from the peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Event name, or the command name for replies
    pub event: String,
    /// Pushed event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Reply payload for request/response commands; `Some(Value::Null)`
    /// when the peer answered with `null`
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub answer: Option<Value>,
}

/// Keep an explicit `null` as `Some(Value::Null)`; only a missing key is `None`
fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl InboundMessage {
    /// Decode a raw message payload; anything but an object with a string `event` is rejected
    pub fn from_value(payload: Value) -> Result<Self> {
        Ok(serde_json::from_value(payload)?)
    }
}

/// Commands understood by the peer
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Seek(f64),
    Speed(f64),
    Volume(f64),
    Mute,
    Unmute,
    Loop(bool),
    /// Select a rendition by name
    Quality(String),
    /// Show or hide the peer's own controls
    Ui(bool),
    /// Show or hide the peer's playlist
    ShowPlaylist(bool),
    /// Ask for the buffered end position
    Buffered,
    /// Ask for the available rendition names
    Qualities,
    /// Anything else, passed through untouched
    Raw { name: String, arg: Option<Value> },
}

impl Command {
    /// Build a typed command from a protocol name and optional argument,
    /// coercing the argument of known commands
    pub fn from_parts(name: &str, arg: Option<Value>) -> Self {
        match (name, arg.as_ref()) {
            ("play", None) => Command::Play,
            ("pause", None) => Command::Pause,
            ("mute", None) => Command::Mute,
            ("unmute", None) => Command::Unmute,
            ("buffered", None) => Command::Buffered,
            ("qualities", None) => Command::Qualities,
            ("seek", Some(v)) => match number(v) {
                Some(t) => Command::Seek(t),
                None => Command::raw(name, arg),
            },
            ("speed", Some(v)) => match number(v) {
                Some(r) => Command::Speed(r),
                None => Command::raw(name, arg),
            },
            ("volume", Some(v)) => match number(v) {
                Some(level) => Command::Volume(level),
                None => Command::raw(name, arg),
            },
            ("loop", Some(v)) => Command::Loop(flag(v)),
            ("ui", Some(v)) => Command::Ui(flag(v)),
            ("showplaylist", Some(v)) => Command::ShowPlaylist(flag(v)),
            ("quality", Some(Value::String(q))) => Command::Quality(q.clone()),
            _ => Command::raw(name, arg),
        }
    }

    /// Pass-through command, argument sent as given
    pub fn raw(name: &str, arg: Option<Value>) -> Self {
        Command::Raw {
            name: name.to_string(),
            arg,
        }
    }

    /// Protocol name, also used to match replies
    pub fn name(&self) -> &str {
        match self {
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Seek(_) => "seek",
            Command::Speed(_) => "speed",
            Command::Volume(_) => "volume",
            Command::Mute => "mute",
            Command::Unmute => "unmute",
            Command::Loop(_) => "loop",
            Command::Quality(_) => "quality",
            Command::Ui(_) => "ui",
            Command::ShowPlaylist(_) => "showplaylist",
            Command::Buffered => "buffered",
            Command::Qualities => "qualities",
            Command::Raw { name, .. } => name,
        }
    }

    /// Wire argument
    pub fn argument(&self) -> Option<Value> {
        match self {
            Command::Seek(v) | Command::Speed(v) | Command::Volume(v) => Some(Value::from(*v)),
            Command::Loop(on) | Command::Ui(on) | Command::ShowPlaylist(on) => {
                Some(Value::from(u8::from(*on)))
            }
            Command::Quality(name) => Some(Value::from(name.as_str())),
            Command::Raw { arg, .. } => arg.clone(),
            Command::Play
            | Command::Pause
            | Command::Mute
            | Command::Unmute
            | Command::Buffered
            | Command::Qualities => None,
        }
    }

    /// Commands that set the same piece of peer state share a slot;
    /// only the latest command per slot matters
    pub fn slot(&self) -> Option<&'static str> {
        match self {
            Command::Play | Command::Pause => Some("playback"),
            Command::Mute | Command::Unmute => Some("mute"),
            Command::Seek(_) => Some("seek"),
            Command::Speed(_) => Some("speed"),
            Command::Volume(_) => Some("volume"),
            Command::Loop(_) => Some("loop"),
            Command::Quality(_) => Some("quality"),
            Command::Ui(_) => Some("ui"),
            Command::ShowPlaylist(_) => Some("showplaylist"),
            Command::Buffered | Command::Qualities | Command::Raw { .. } => None,
        }
    }

    /// Encode for posting
    pub fn to_message(&self) -> OutboundMessage {
        OutboundMessage {
            api: self.name().to_string(),
            set: self.argument(),
        }
    }
}

/// Events pushed by the peer
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Player finished initializing
    Inited,
    Time(f64),
    Duration(f64),
    Speed(f64),
    /// Active rendition name
    Quality(String),
    /// Audio track switches are not mirrored
    AudioTrack,
    End,
    Loop(bool),
    Play,
    Paused,
    Waiting,
    Buffered,
    Mute,
    Unmute,
    Volume(f64),
    Error(String),
    Unknown(String),
}

impl PeerEvent {
    /// Parse an event name and its payload
    pub fn parse(event: &str, data: Option<&Value>) -> Result<Self> {
        let parsed = match event {
            "inited" => PeerEvent::Inited,
            "time" => PeerEvent::Time(required_number(event, data)?),
            "duration" => PeerEvent::Duration(required_number(event, data)?),
            "speed" => PeerEvent::Speed(required_number(event, data)?),
            "volume" => PeerEvent::Volume(required_number(event, data)?),
            "quality" => match data {
                Some(Value::String(name)) => PeerEvent::Quality(name.clone()),
                Some(other) => PeerEvent::Quality(other.to_string()),
                None => return Err(Error::malformed(event, "missing rendition name")),
            },
            "loop" => match data {
                Some(v) => PeerEvent::Loop(flag(v)),
                None => return Err(Error::malformed(event, "missing loop flag")),
            },
            "audiotrack" => PeerEvent::AudioTrack,
            "end" => PeerEvent::End,
            "play" => PeerEvent::Play,
            "paused" => PeerEvent::Paused,
            "waiting" => PeerEvent::Waiting,
            "buffered" => PeerEvent::Buffered,
            "mute" => PeerEvent::Mute,
            "unmute" => PeerEvent::Unmute,
            "error" => PeerEvent::Error(match data {
                Some(Value::String(msg)) => msg.clone(),
                Some(other) => other.to_string(),
                None => "unknown playback error".to_string(),
            }),
            other => PeerEvent::Unknown(other.to_string()),
        };
        Ok(parsed)
    }
}

fn required_number(event: &str, data: Option<&Value>) -> Result<f64> {
    let value = data.ok_or_else(|| Error::malformed(event, "missing payload"))?;
    number(value).ok_or_else(|| Error::malformed(event, format!("not a number: {value}")))
}

/// Numeric payloads arrive either as JSON numbers or as numeric strings
pub fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// The peer encodes flags as 0/1; only an exact 1 (or `true`) is set
pub fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}
