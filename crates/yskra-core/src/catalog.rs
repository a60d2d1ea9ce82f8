//! Embed providers and how well each one can be driven

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Third-party players offered by the catalogue API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProvider {
    Vibix,
    Turbo,
    Collaps,
    Alloha,
    Hdvb,
    Videocdn,
    Torrents,
}

/// How far a provider's player can be controlled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    Unknown,
    NotSupported,
    /// Controlled directly through the PlayerJS message API
    Native,
    /// Only usable through a proxy
    Proxy,
}

/// Player implementation used to show a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerBackend {
    /// [`PlayerJsFrame`](crate::PlayerJsFrame) remote control
    PlayerJs,
    /// Plain frame, no control
    Iframe,
}

impl EmbedProvider {
    pub const ALL: [EmbedProvider; 7] = [
        EmbedProvider::Vibix,
        EmbedProvider::Turbo,
        EmbedProvider::Collaps,
        EmbedProvider::Alloha,
        EmbedProvider::Hdvb,
        EmbedProvider::Videocdn,
        EmbedProvider::Torrents,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EmbedProvider::Vibix => "vibix",
            EmbedProvider::Turbo => "turbo",
            EmbedProvider::Collaps => "collaps",
            EmbedProvider::Alloha => "alloha",
            EmbedProvider::Hdvb => "hdvb",
            EmbedProvider::Videocdn => "videocdn",
            EmbedProvider::Torrents => "torrents",
        }
    }

    pub fn support_status(&self) -> SupportStatus {
        match self {
            // PlayerJS postMessage API, no playlist control
            EmbedProvider::Vibix => SupportStatus::Native,
            EmbedProvider::Turbo => SupportStatus::Proxy,
            // VenomPlayer
            EmbedProvider::Collaps => SupportStatus::Proxy,
            // PlayerJS v19 with the message API switched off
            EmbedProvider::Hdvb => SupportStatus::Proxy,
            // broken asset paths and CORS
            EmbedProvider::Alloha | EmbedProvider::Videocdn => SupportStatus::NotSupported,
            EmbedProvider::Torrents => SupportStatus::Unknown,
        }
    }

    pub fn backend(&self) -> PlayerBackend {
        match self {
            EmbedProvider::Vibix => PlayerBackend::PlayerJs,
            _ => PlayerBackend::Iframe,
        }
    }
}

impl std::fmt::Display for EmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EmbedProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        EmbedProvider::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| format!("unknown embed provider '{s}'"))
    }
}

impl std::fmt::Display for SupportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupportStatus::Unknown => write!(f, "unknown"),
            SupportStatus::NotSupported => write!(f, "not supported"),
            SupportStatus::Native => write!(f, "native"),
            SupportStatus::Proxy => write!(f, "proxy"),
        }
    }
}
