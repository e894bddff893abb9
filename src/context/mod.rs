//! Path-tracking contexts for load and dump traversals.
//!
//! Every [`Context`] is a handle to a node in an arena shared by one
//! traversal. A node stays in the arena while a handle to it or to one of its
//! descendants exists. A node's key may only change while none of its
//! children are reachable, since their cached paths depend on it.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use crate::handler::{root_collection, HandlerCollection};
use crate::schema::LoadContext;
use crate::value::Key;
use crate::Error;

/// Overrides applied when creating a root or child context.
///
/// Unset options are inherited from the parent. For a root, `avoid_copy`
/// defaults to `false` and the handler collection is mandatory.
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct ContextOptions {
    filename: Option<PathBuf>,
    handlers: Option<Arc<HandlerCollection>>,
    avoid_copy: Option<bool>,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl AsRef<Path>) -> Self {
        self.filename = Some(filename.as_ref().to_path_buf());
        self
    }

    pub fn with_handlers(mut self, handlers: Arc<HandlerCollection>) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// When set, basic handlers share container storage with the input
    /// instead of deep-copying it.
    pub fn avoid_copy(mut self, avoid_copy: bool) -> Self {
        self.avoid_copy = Some(avoid_copy);
        self
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<usize>,
    key: Option<Key>,
    filename: Option<PathBuf>,
    handlers: Arc<HandlerCollection>,
    avoid_copy: bool,
    path: Option<Vec<Key>>,
    handles: usize,
    live_children: usize,
}

impl Node {
    fn is_reachable(&self) -> bool {
        self.handles > 0 || self.live_children > 0
    }
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl Arena {
    fn insert(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn node(&self, id: usize) -> &Node {
        self.nodes[id]
            .as_ref()
            .unwrap_or_else(|| unreachable!("context node {id} released while referenced"))
    }

    fn node_mut(&mut self, id: usize) -> &mut Node {
        self.nodes[id]
            .as_mut()
            .unwrap_or_else(|| unreachable!("context node {id} released while referenced"))
    }

    /// Drops one handle and frees every node that becomes unreachable.
    fn release(&mut self, id: usize) {
        self.node_mut(id).handles -= 1;
        let mut current = id;
        while !self.node(current).is_reachable() {
            let parent = self.node(current).parent;
            self.nodes[current] = None;
            self.free.push(current);
            match parent {
                Some(parent) => {
                    self.node_mut(parent).live_children -= 1;
                    current = parent;
                }
                None => break,
            }
        }
    }

    fn path(&mut self, id: usize) -> Vec<Key> {
        if let Some(path) = &self.node(id).path {
            return path.clone();
        }
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if let Some(key) = &node.key {
                path.push(key.clone());
            }
            current = node.parent;
        }
        path.reverse();
        self.node_mut(id).path = Some(path.clone());
        path
    }
}

/// A node in the data tree currently being loaded or dumped.
pub struct Context {
    arena: Rc<RefCell<Arena>>,
    id: usize,
}

impl Context {
    /// Creates a root context. Fails if no handler collection is supplied.
    pub fn root(key: Option<Key>, options: ContextOptions) -> Result<Self, Error> {
        let handlers = options.handlers.ok_or(Error::MissingHandlers)?;
        let mut arena = Arena::default();
        let id = arena.insert(Node {
            parent: None,
            key,
            filename: options.filename,
            handlers,
            avoid_copy: options.avoid_copy.unwrap_or(false),
            path: None,
            handles: 1,
            live_children: 0,
        });
        Ok(Self {
            arena: Rc::new(RefCell::new(arena)),
            id,
        })
    }

    /// Creates a keyless root context, defaulting to the process-wide
    /// handler collection.
    pub fn mkroot(options: ContextOptions) -> Self {
        let handlers = options.handlers.clone().unwrap_or_else(root_collection);
        let options = options.with_handlers(handlers);
        match Self::root(None, options) {
            Ok(context) => context,
            Err(_) => unreachable!("handler collection is always set"),
        }
    }

    /// Creates a child context inheriting every setting from `self`.
    pub fn child(&self, key: impl Into<Key>) -> Context {
        self.child_with(key, ContextOptions::default())
    }

    /// Creates a child context, overriding the given settings.
    pub fn child_with(&self, key: impl Into<Key>, options: ContextOptions) -> Context {
        let mut arena = self.arena.borrow_mut();
        let parent = arena.node_mut(self.id);
        parent.live_children += 1;
        let node = Node {
            parent: Some(self.id),
            key: Some(key.into()),
            filename: options.filename.or_else(|| parent.filename.clone()),
            handlers: options
                .handlers
                .unwrap_or_else(|| Arc::clone(&parent.handlers)),
            avoid_copy: options.avoid_copy.unwrap_or(parent.avoid_copy),
            path: None,
            handles: 1,
            live_children: 0,
        };
        let id = arena.insert(node);
        Context {
            arena: Rc::clone(&self.arena),
            id,
        }
    }

    /// Returns a handle to the parent context, if any.
    pub fn parent(&self) -> Option<Context> {
        let mut arena = self.arena.borrow_mut();
        let parent = arena.node(self.id).parent?;
        arena.node_mut(parent).handles += 1;
        Some(Context {
            arena: Rc::clone(&self.arena),
            id: parent,
        })
    }

    pub fn key(&self) -> Option<Key> {
        self.arena.borrow().node(self.id).key.clone()
    }

    /// Changes this context's key.
    ///
    /// Fails with [`Error::ContextBusy`] while a child context is reachable.
    pub fn set_key(&self, key: Option<Key>) -> Result<(), Error> {
        let mut arena = self.arena.borrow_mut();
        let node = arena.node_mut(self.id);
        if node.live_children > 0 {
            return Err(Error::ContextBusy);
        }
        node.key = key;
        node.path = None;
        Ok(())
    }

    pub fn filename(&self) -> Option<PathBuf> {
        self.arena.borrow().node(self.id).filename.clone()
    }

    pub fn handlers(&self) -> Arc<HandlerCollection> {
        Arc::clone(&self.arena.borrow().node(self.id).handlers)
    }

    pub fn avoid_copy(&self) -> bool {
        self.arena.borrow().node(self.id).avoid_copy
    }

    /// Keys from the root down to this context.
    pub fn path(&self) -> Vec<Key> {
        self.arena.borrow_mut().path(self.id)
    }

    /// The path joined by dots, or `<root>` when empty. Segments containing
    /// a dot are quoted.
    pub fn readable_path(&self) -> String {
        let path = self
            .path()
            .iter()
            .map(|key| {
                let segment = key.to_string();
                if segment.contains('.') {
                    format!("'{segment}'")
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join(".");
        if path.is_empty() {
            "<root>".to_owned()
        } else {
            path
        }
    }

    pub fn type_error(&self, got: impl fmt::Display, expected: impl fmt::Display) -> Error {
        Error::Type {
            path: self.readable_path(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub fn value_error(&self, message: impl fmt::Display) -> Error {
        Error::Value {
            path: self.readable_path(),
            message: message.to_string(),
        }
    }

    /// Detached copy of the location, for recording on loaded instances.
    pub fn snapshot(&self) -> LoadContext {
        LoadContext {
            path: self.path(),
            filename: self.filename(),
        }
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        self.arena.borrow_mut().node_mut(self.id).handles += 1;
        Context {
            arena: Rc::clone(&self.arena),
            id: self.id,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.arena.borrow_mut().release(self.id);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.path())
            .field("filename", &self.filename())
            .finish()
    }
}
