//! Object graph traversal.
//!
//! Types opt in by implementing [`Sanitize`]: an implementation hands each of
//! its string fields, nested composites and collections of composites to the
//! [`GraphWalker`]. Fields that are never handed over (numbers, booleans,
//! dates, enums) are never touched.
//!
//! Owned values (`T`, `Box<T>`, `Vec<T>`, ...) have exactly one owner, so they
//! are walked in place as they are reached. Shared handles (`Rc<RefCell<T>>`,
//! `Arc<Mutex<T>>`, `Arc<RwLock<T>>`, `Weak<RefCell<T>>`) are where cycles and
//! multiple reference paths live. They are checked against the visited set
//! by allocation address and, when new, queued on an explicit work-list that
//! the top-level call drains. A node is therefore never borrowed twice and a
//! cycle never deepens the native stack.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex, RwLock, TryLockError};

use super::html::TextSanitizer;

/// A type whose reachable strings can be sanitized in place.
pub trait Sanitize {
    fn sanitize_with(&mut self, walker: &mut GraphWalker<'_>);

    /// Name used when reporting a node that could not be borrowed.
    fn node_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeError {
    /// A shared node was already borrowed or locked elsewhere while the graph
    /// was being walked.
    NodeBusy(&'static str),
}

impl fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanitizeError::NodeBusy(name) => {
                write!(f, "shared node `{name}` is borrowed elsewhere during sanitization")
            }
        }
    }
}

impl std::error::Error for SanitizeError {}

/// Counters collected during one traversal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkReport {
    /// Non-empty strings passed through the text sanitizer.
    pub strings_visited: usize,
    /// Strings whose content was altered.
    pub strings_changed: usize,
    /// Distinct shared nodes walked.
    pub shared_nodes: usize,
}

/// Identity of a shared allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(usize);

impl NodeId {
    fn of<T: ?Sized>(ptr: *const T) -> Self {
        NodeId(ptr.cast::<()>() as usize)
    }
}

enum PendingNode {
    Local(Rc<RefCell<dyn Sanitize>>),
    Locked(Arc<Mutex<dyn Sanitize>>),
    ReadWrite(Arc<RwLock<dyn Sanitize>>),
}

/// Per-call traversal state: the text sanitizer, the visited set and the
/// work-list of shared nodes still to walk.
pub struct GraphWalker<'s> {
    text: &'s dyn TextSanitizer,
    visited: HashSet<NodeId>,
    pending: Vec<PendingNode>,
    report: WalkReport,
    /// Address of the value handed to [`walk`].
    root: Option<NodeId>,
}

impl<'s> GraphWalker<'s> {
    fn new(text: &'s dyn TextSanitizer) -> Self {
        GraphWalker {
            text,
            visited: HashSet::new(),
            pending: Vec::new(),
            report: WalkReport::default(),
            root: None,
        }
    }

    /// Sanitizes a string field in place. Empty strings are left alone.
    pub fn text(&mut self, value: &mut String) {
        if value.is_empty() {
            return;
        }

        self.report.strings_visited += 1;
        let cleaned = self.text.sanitize_text(value);
        if cleaned != *value {
            *value = cleaned;
            self.report.strings_changed += 1;
        }
    }

    pub fn optional_text(&mut self, value: &mut Option<String>) {
        if let Some(value) = value {
            self.text(value);
        }
    }

    /// Walks a nested composite field.
    pub fn node<T: Sanitize + ?Sized>(&mut self, value: &mut T) {
        value.sanitize_with(self);
    }

    /// Walks every element of a collection of composites. The collection
    /// itself is not replaced.
    pub fn each<'a, T, I>(&mut self, items: I)
    where
        T: Sanitize + 'a,
        I: IntoIterator<Item = &'a mut T>,
    {
        for item in items {
            item.sanitize_with(self);
        }
    }

    pub(super) fn schedule_local(&mut self, node: Rc<RefCell<dyn Sanitize>>) {
        if self.first_visit(NodeId::of(Rc::as_ptr(&node))) {
            self.pending.push(PendingNode::Local(node));
        }
    }

    pub(super) fn schedule_locked(&mut self, node: Arc<Mutex<dyn Sanitize>>) {
        if self.first_visit(NodeId::of(Arc::as_ptr(&node))) {
            self.pending.push(PendingNode::Locked(node));
        }
    }

    pub(super) fn schedule_read_write(&mut self, node: Arc<RwLock<dyn Sanitize>>) {
        if self.first_visit(NodeId::of(Arc::as_ptr(&node))) {
            self.pending.push(PendingNode::ReadWrite(node));
        }
    }

    fn first_visit(&mut self, id: NodeId) -> bool {
        self.visited.insert(id)
    }

    /// Walks queued shared nodes until the work-list is empty. Each node's
    /// borrow is released before the next one is taken.
    fn drain(&mut self) -> Result<(), SanitizeError> {
        while let Some(node) = self.pending.pop() {
            match node {
                PendingNode::Local(cell) => {
                    let mut inner = match cell.try_borrow_mut() {
                        Ok(inner) => inner,
                        // borrowed by the caller as the root, already walked
                        Err(_) if self.is_root(&cell) => {
                            tracing::debug!(
                                target: "sanitize",
                                "skipping shared node that holds the root"
                            );
                            continue;
                        }
                        Err(_) => return Err(SanitizeError::NodeBusy(busy_name(&cell))),
                    };
                    self.report.shared_nodes += 1;
                    inner.sanitize_with(self);
                }
                PendingNode::Locked(mutex) => {
                    let mut inner = match mutex.try_lock() {
                        Ok(inner) => inner,
                        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                        Err(TryLockError::WouldBlock) => {
                            return Err(SanitizeError::NodeBusy("locked shared node"));
                        }
                    };
                    self.report.shared_nodes += 1;
                    inner.sanitize_with(self);
                }
                PendingNode::ReadWrite(lock) => {
                    let mut inner = match lock.try_write() {
                        Ok(inner) => inner,
                        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                        Err(TryLockError::WouldBlock) => {
                            return Err(SanitizeError::NodeBusy("locked shared node"));
                        }
                    };
                    self.report.shared_nodes += 1;
                    inner.sanitize_with(self);
                }
            }
        }
        Ok(())
    }

    fn is_root(&self, cell: &RefCell<dyn Sanitize>) -> bool {
        self.root == Some(NodeId::of(cell.as_ptr().cast_const()))
    }
}

fn busy_name(cell: &RefCell<dyn Sanitize>) -> &'static str {
    cell.try_borrow()
        .map(|node| node.node_name())
        .unwrap_or("mutably borrowed shared node")
}

/// Sanitizes every string reachable from `root`, visiting each shared node at
/// most once.
pub fn walk<T: Sanitize + ?Sized>(
    text: &dyn TextSanitizer,
    root: &mut T,
) -> Result<WalkReport, SanitizeError> {
    let mut walker = GraphWalker::new(text);
    walker.root = Some(NodeId::of(&*root as *const T));
    root.sanitize_with(&mut walker);
    walker.drain()?;
    Ok(walker.report)
}
