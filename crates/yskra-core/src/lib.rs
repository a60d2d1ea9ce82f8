//! Yskra Core - PlayerJS frame remote control for Yskra
//!
//! This crate turns a third-party PlayerJS player running inside a
//! cross-origin frame into media controls that behave like a native
//! media element:
//! - postMessage command/event protocol
//! - Request/response commands matched by name
//! - Two-way state mirroring without command echo
//! - Readiness gating with a coalescing command queue
//! - Source and playback error hooks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Yskra Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   caller / UI                                                   │
//! │      │ set_playing(true)             ▲ MediaControls (watch)    │
//! │      ▼                               │                          │
//! │  ┌────────────────────────────────────────────┐                 │
//! │  │              PlayerJsFrame                 │                 │
//! │  │  Origin::Local ──► Command ──► Outbox ─────┼──► FrameHost    │
//! │  │  Origin::Remote ◄── PeerEvent ◄────────────┼─── handle_message│
//! │  │          PendingCommands   EventHook       │                 │
//! │  └────────────────────────────────────────────┘                 │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yskra_core::{AdapterConfig, MemoryDom, MemoryFrameHost, PlayerJsFrame};
//!
//! # async fn run() -> yskra_core::Result<()> {
//! let dom = Arc::new(MemoryDom::new());
//! let video = dom.create_element(dom.root(), "video");
//! let player = PlayerJsFrame::new(MemoryFrameHost::new(dom, video), AdapterConfig::default());
//!
//! player.load("https://player.example/embed/1").await?;
//! player.set_playing(true);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod controls;
pub mod error;
pub mod frame;
pub mod hook;
pub mod host;
pub mod memory;
pub mod pending;
pub mod protocol;

pub use catalog::{EmbedProvider, PlayerBackend, SupportStatus};
pub use config::AdapterConfig;
pub use controls::{MediaControls, PlaybackError, Quality, SourceError, TextTrack, TimeRange};
pub use error::{Error, Result};
pub use frame::{AdapterId, PlayerJsFrame};
pub use hook::{EventHook, HookHandle};
pub use host::{FrameHost, MessageEnvelope, WindowId};
pub use memory::{MemoryDom, MemoryFrameHost, NodeId};
pub use protocol::{Command, InboundMessage, OutboundMessage, PeerEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Yskra Core initialized");
}
