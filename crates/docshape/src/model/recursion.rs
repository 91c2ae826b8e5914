//! Self-referential model nodes.
//!
//! A [`Recursion`] is the only way a cycle can enter a model. Nodes are
//! shared through `Rc` and compared by identity. The inner model is written
//! exactly once: a node is created empty, handed out so that the inner
//! model can point back at it, then closed.
//!
//! Cyclic models are `Rc` cycles and are never freed. Schemas live for the
//! lifetime of the process that loaded them, so this is accepted.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::model::Model;

/// A labelled node whose inner model may refer back to the node itself.
pub struct Recursion {
    label: String,
    inner: OnceCell<Model>,
}

impl Recursion {
    /// Creates an unclosed node. Only the decoder and the merge operator
    /// need the two-phase form; everyone else uses [`Recursion::build`].
    pub(crate) fn placeholder(label: impl Into<String>) -> Rc<Recursion> {
        Rc::new(Recursion {
            label: label.into(),
            inner: OnceCell::new(),
        })
    }

    /// Writes the inner model. Returns false if the node was already closed.
    pub(crate) fn close(&self, inner: Model) -> bool {
        self.inner.set(inner).is_ok()
    }

    /// Builds a closed recursive node.
    ///
    /// `body` receives a handle to the node under construction and returns
    /// its inner model, which may contain `Model::Recursion(handle.clone())`.
    ///
    /// # Panics
    ///
    /// Panics if the node reaches itself without passing through a value
    /// constructor, as in `rec t = string | ^t`. Such a model describes no
    /// additional values and cannot be encoded.
    ///
    /// ```
    /// use docshape::{Model, Recursion};
    ///
    /// // A tree of string-labelled nodes.
    /// let tree = Recursion::build("tree", |this| {
    ///     Model::structure([
    ///         ("label", Model::String),
    ///         ("children", Model::list(Model::Recursion(this.clone()))),
    ///     ])
    /// });
    /// assert!(tree.is_closed());
    /// ```
    pub fn build<F>(label: impl Into<String>, body: F) -> Rc<Recursion>
    where
        F: FnOnce(&Rc<Recursion>) -> Model,
    {
        let node = Recursion::placeholder(label);
        let inner = body(&node);
        node.close(inner);
        assert_productive(&node);
        node
    }

    /// Builds a group of mutually recursive nodes.
    ///
    /// `body` receives one handle per label, in order, and must return one
    /// inner model per label.
    ///
    /// # Panics
    ///
    /// Panics if `body` returns a different number of models than labels, or
    /// if any node reaches itself without passing through a value
    /// constructor.
    pub fn build_group<S, F>(labels: &[S], body: F) -> Vec<Rc<Recursion>>
    where
        S: AsRef<str>,
        F: FnOnce(&[Rc<Recursion>]) -> Vec<Model>,
    {
        let nodes: Vec<Rc<Recursion>> = labels
            .iter()
            .map(|l| Recursion::placeholder(l.as_ref()))
            .collect();
        let inners = body(&nodes);
        assert_eq!(
            inners.len(),
            nodes.len(),
            "build_group body returned {} models for {} labels",
            inners.len(),
            nodes.len()
        );
        for (node, inner) in nodes.iter().zip(inners) {
            node.close(inner);
        }
        for node in &nodes {
            assert_productive(node);
        }
        nodes
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.inner.get().is_some()
    }

    /// Returns the inner model, or `None` while the node is being built.
    pub fn try_inner(&self) -> Option<&Model> {
        self.inner.get()
    }

    /// Returns the inner model.
    ///
    /// # Panics
    ///
    /// Panics if the node has not been closed. Public constructors only
    /// return closed nodes, so this indicates a bug in this crate.
    pub fn inner(&self) -> &Model {
        match self.inner.get() {
            Some(m) => m,
            None => panic!("recursion {:?} used before it was closed", self.label),
        }
    }

    /// Identity of this node, stable for its lifetime.
    pub fn id(&self) -> usize {
        self as *const Recursion as usize
    }
}

fn assert_productive(node: &Rc<Recursion>) {
    if reaches_itself(node) {
        panic!(
            "recursion {:?} reaches itself without a value constructor",
            node.label()
        );
    }
}

/// Returns true if `node` can reach itself through wrappers, alternatives
/// and other recursion nodes alone, without passing a value constructor.
pub(crate) fn reaches_itself(node: &Rc<Recursion>) -> bool {
    let mut visited = FxHashSet::default();
    let mut stack = match node.try_inner() {
        Some(inner) => vec![inner],
        None => return false,
    };
    while let Some(m) = stack.pop() {
        match m {
            Model::Unique(inner) | Model::Annotation(_, inner) => stack.push(inner),
            Model::Or(l, r) => {
                stack.push(l);
                stack.push(r);
            }
            Model::Recursion(other) => {
                if Rc::ptr_eq(other, node) {
                    return true;
                }
                if visited.insert(other.id()) {
                    if let Some(inner) = other.try_inner() {
                        stack.push(inner);
                    }
                }
            }
            _ => {}
        }
    }
    false
}

impl fmt::Debug for Recursion {
    // The inner model may point back here; print the identity only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recursion")
            .field("label", &self.label)
            .field("id", &format_args!("{:#x}", self.id()))
            .field("closed", &self.is_closed())
            .finish()
    }
}
