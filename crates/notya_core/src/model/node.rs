//! Note/folder entity model.
//!
//! # Responsibility
//! - Define the shared `Node` identity (title + optional resolved path).
//! - Compose `Note` and `Folder` on top of `Node` instead of a type hierarchy.
//!
//! # Invariants
//! - `title` is non-empty for every stored entry; an empty title denotes the
//!   virtual root of a backend.
//! - When `path` is `Some`, backends use it verbatim and skip derivation.

use std::path::{Path, PathBuf};

/// Generic named, located entry (file or directory).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Display name / file name relative to the backend root.
    pub title: String,
    /// Already-resolved location. `None` means "derive as `root + title`".
    pub path: Option<PathBuf>,
}

impl Node {
    /// Creates a node that will be resolved against the backend root.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            path: None,
        }
    }

    /// Creates a node with an explicit, already-resolved path.
    pub fn with_path(title: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            title: title.into(),
            path: Some(path.into()),
        }
    }

    /// Resolves the on-disk location of this node under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => root.join(&self.title),
        }
    }

    /// Whether this node addresses the backend root itself.
    pub fn is_root(&self) -> bool {
        self.title.is_empty() && self.path.is_none()
    }
}

/// A node carrying text content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Note {
    pub node: Node,
    /// Raw text body.
    pub body: String,
}

impl Note {
    /// Creates a note with an empty body.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            node: Node::new(title),
            body: String::new(),
        }
    }

    /// Creates a note with a body.
    pub fn with_body(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            node: Node::new(title),
            body: body.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.node.title
    }

    pub fn path(&self) -> Option<&Path> {
        self.node.path.as_deref()
    }

    /// Drops the body and returns the shared node identity.
    pub fn to_node(&self) -> Node {
        self.node.clone()
    }

    /// JSON projection with `title`, `path` and `body` keys.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.node.title,
            "path": self
                .node
                .path
                .as_ref()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "body": self.body,
        })
    }
}

impl From<Node> for Note {
    fn from(node: Node) -> Self {
        Self {
            node,
            body: String::new(),
        }
    }
}

/// A node denoting a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Folder {
    pub node: Node,
}

impl Folder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            node: Node::new(title),
        }
    }

    pub fn title(&self) -> &str {
        &self.node.title
    }

    pub fn path(&self) -> Option<&Path> {
        self.node.path.as_deref()
    }

    pub fn to_node(&self) -> Node {
        self.node.clone()
    }
}

impl From<Node> for Folder {
    fn from(node: Node) -> Self {
        Self { node }
    }
}

/// Rename intent: move `current` to `new`.
///
/// `current` must exist, `new` must not, and the titles must differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditNode {
    pub current: Node,
    pub new: Node,
}

impl EditNode {
    pub fn new(current: Node, new: Node) -> Self {
        Self { current, new }
    }

    /// Shorthand for renaming one root-relative title to another.
    pub fn titles(current: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            current: Node::new(current),
            new: Node::new(new),
        }
    }

    pub fn has_same_titles(&self) -> bool {
        self.current.title == self.new.title
    }
}
