//! In-memory DOM host
//!
//! A minimal node tree with just enough behaviour to stand in for a
//! document: ordered children, attributes, and element replacement.
//! [`MemoryFrameHost`] implements [`FrameHost`] on top of it and records
//! every message posted to the frame.

use crate::{
    host::{FrameHost, WindowId},
    protocol::OutboundMessage,
    Error, Result,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use url::Url;

/// Classes applied to every mounted frame
pub const FRAME_CLASSES: &str = "w-full h-full pointer-events-none";

static NEXT_WINDOW: AtomicU64 = AtomicU64::new(1);

/// Node handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug)]
struct Node {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Tree {
    next_id: u64,
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
}

impl Tree {
    fn insert(&mut self, tag: &str, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                tag: tag.to_string(),
                parent,
                children: Vec::new(),
                attributes: BTreeMap::new(),
            },
        );
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.push(id);
        }
        id
    }

    /// Put `new` where `old` is; `old` is left detached
    fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self
            .nodes
            .get(&old)
            .and_then(|n| n.parent)
            .ok_or_else(|| Error::host(format!("node {} has no parent", old.0)))?;

        self.detach(new);

        let siblings = &mut self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| Error::host("parent node vanished"))?
            .children;
        let position = siblings
            .iter()
            .position(|c| *c == old)
            .ok_or_else(|| Error::host("node missing from its parent"))?;
        siblings[position] = new;

        if let Some(node) = self.nodes.get_mut(&old) {
            node.parent = None;
        }
        if let Some(node) = self.nodes.get_mut(&new) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(&id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
    }

    fn remove(&mut self, id: NodeId) {
        self.detach(id);
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove(child);
            }
        }
    }
}

/// Thread-safe in-memory document
#[derive(Debug)]
pub struct MemoryDom {
    tree: Mutex<Tree>,
}

impl MemoryDom {
    /// Create a document holding an empty `body`
    pub fn new() -> Self {
        let mut tree = Tree {
            next_id: 0,
            root: NodeId(0),
            nodes: HashMap::new(),
        };
        tree.root = tree.insert("body", None);
        Self {
            tree: Mutex::new(tree),
        }
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> NodeId {
        self.tree().root
    }

    /// Append a new element to `parent`
    pub fn create_element(&self, parent: NodeId, tag: &str) -> NodeId {
        self.tree().insert(tag, Some(parent))
    }

    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.tree()
            .nodes
            .get(&parent)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree().nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.tree().nodes.get(&node).map(|n| n.tag.clone())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree()
            .nodes
            .get(&node)
            .and_then(|n| n.attributes.get(name).cloned())
    }

    /// Whether the node still exists in the document
    pub fn contains(&self, node: NodeId) -> bool {
        self.tree().nodes.contains_key(&node)
    }

    /// Whether the node is connected to the root
    pub fn is_attached(&self, node: NodeId) -> bool {
        let tree = self.tree();
        let mut current = node;
        loop {
            if current == tree.root {
                return true;
            }
            match tree.nodes.get(&current).and_then(|n| n.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        self.tree()
            .nodes
            .get_mut(&node)
            .ok_or_else(|| Error::host(format!("node {} does not exist", node.0)))?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct FrameSlot {
    frame: Option<NodeId>,
    window: Option<WindowId>,
}

/// [`FrameHost`] bound to one element of a [`MemoryDom`]
#[derive(Debug)]
pub struct MemoryFrameHost {
    dom: Arc<MemoryDom>,
    element: NodeId,
    messaging: bool,
    slot: Mutex<FrameSlot>,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MemoryFrameHost {
    pub fn new(dom: Arc<MemoryDom>, element: NodeId) -> Self {
        Self {
            dom,
            element,
            messaging: true,
            slot: Mutex::new(FrameSlot::default()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Host whose capability probe reports no messaging support
    pub fn without_messaging(dom: Arc<MemoryDom>, element: NodeId) -> Self {
        Self {
            messaging: false,
            ..Self::new(dom, element)
        }
    }

    pub fn dom(&self) -> &Arc<MemoryDom> {
        &self.dom
    }

    /// The element the frame stands in for
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The mounted frame node
    pub fn frame(&self) -> Option<NodeId> {
        self.slot().frame
    }

    /// Messages posted so far
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Messages posted since the last call
    pub fn take_sent(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn slot(&self) -> MutexGuard<'_, FrameSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mounted_frame(&self) -> Result<NodeId> {
        self.slot()
            .frame
            .ok_or_else(|| Error::host("frame is not mounted"))
    }
}

impl FrameHost for MemoryFrameHost {
    fn supports_messaging(&self) -> bool {
        self.messaging
    }

    fn mount_frame(&self) -> Result<()> {
        let mut slot = self.slot();
        if slot.frame.is_some() {
            return Err(Error::host("frame already mounted"));
        }

        let mut tree = self.dom.tree();
        let frame = tree.insert("iframe", None);
        if let Err(err) = tree.replace_child(self.element, frame) {
            tree.remove(frame);
            return Err(err);
        }
        if let Some(node) = tree.nodes.get_mut(&frame) {
            node.attributes
                .insert("class".to_string(), FRAME_CLASSES.to_string());
        }

        slot.frame = Some(frame);
        slot.window = Some(WindowId(NEXT_WINDOW.fetch_add(1, Ordering::Relaxed)));
        Ok(())
    }

    fn set_frame_attribute(&self, name: &str, value: &str) -> Result<()> {
        let frame = self.mounted_frame()?;
        self.dom.set_attribute(frame, name, value)
    }

    fn navigate_frame(&self, url: &Url) -> Result<()> {
        let frame = self.mounted_frame()?;
        self.dom.set_attribute(frame, "src", url.as_str())
    }

    fn post_to_frame(&self, message: &OutboundMessage) -> Result<()> {
        if !self.messaging {
            return Err(Error::MessagingUnsupported);
        }
        self.mounted_frame()?;
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }

    fn frame_window(&self) -> Option<WindowId> {
        self.slot().window
    }

    fn unmount_frame(&self) -> Result<()> {
        let mut slot = self.slot();
        let Some(frame) = slot.frame.take() else {
            return Ok(());
        };
        slot.window = None;

        let mut tree = self.dom.tree();
        let restored = tree.replace_child(frame, self.element);
        tree.remove(frame);
        restored
    }
}
