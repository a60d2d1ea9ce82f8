//! Frame host abstraction
//!
//! The adapter never touches a document directly. A [`FrameHost`] is bound
//! to one media element and performs the DOM work on its behalf: swapping the
//! element for a frame, configuring and navigating that frame, posting
//! messages into it, and putting the element back.

use crate::{protocol::OutboundMessage, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Identity of a window that posted a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// A cross-document message as delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Posting window, if the host could identify it
    pub source: Option<WindowId>,
    /// Structured-clone payload
    pub payload: Option<Value>,
}

impl MessageEnvelope {
    pub fn new(source: WindowId, payload: Value) -> Self {
        Self {
            source: Some(source),
            payload: Some(payload),
        }
    }
}

/// DOM operations the adapter needs for one media element
pub trait FrameHost: Send + Sync + 'static {
    /// Whether cross-document messaging is available at all
    fn supports_messaging(&self) -> bool;

    /// Detach the bound element and insert a frame at its position
    fn mount_frame(&self) -> Result<()>;

    /// Set an attribute on the frame
    fn set_frame_attribute(&self, name: &str, value: &str) -> Result<()>;

    /// Point the frame at a new document
    fn navigate_frame(&self, url: &Url) -> Result<()>;

    /// Post a structured message to the frame's content window
    fn post_to_frame(&self, message: &OutboundMessage) -> Result<()>;

    /// Content window of the frame, if it has one
    fn frame_window(&self) -> Option<WindowId>;

    /// Reinsert the original element where the frame is and remove the frame
    fn unmount_frame(&self) -> Result<()>;
}

impl<T: FrameHost + ?Sized> FrameHost for Arc<T> {
    fn supports_messaging(&self) -> bool {
        (**self).supports_messaging()
    }

    fn mount_frame(&self) -> Result<()> {
        (**self).mount_frame()
    }

    fn set_frame_attribute(&self, name: &str, value: &str) -> Result<()> {
        (**self).set_frame_attribute(name, value)
    }

    fn navigate_frame(&self, url: &Url) -> Result<()> {
        (**self).navigate_frame(url)
    }

    fn post_to_frame(&self, message: &OutboundMessage) -> Result<()> {
        (**self).post_to_frame(message)
    }

    fn frame_window(&self) -> Option<WindowId> {
        (**self).frame_window()
    }

    fn unmount_frame(&self) -> Result<()> {
        (**self).unmount_frame()
    }
}
