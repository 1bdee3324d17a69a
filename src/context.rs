//! Request contexts: the execution units connections are scoped to.
//!
//! A [`RequestContext`] stands for one logical unit of work (an incoming
//! request, a job, a task). It is passed explicitly to managers, carries a
//! process-unique identity, and runs registered teardown callbacks exactly once
//! when the work ends.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{ConnError, ConnResult};
use crate::internal::TeardownBag;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TEARDOWN_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Handle to a registered teardown callback, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeardownKey(pub(crate) u64);

/// An explicit execution context with teardown hooks.
///
/// Clones share the same context. The context ends when [`end`](Self::end) is
/// called or when the last clone is dropped, whichever happens first; pending
/// teardown callbacks then run once, most recently registered first.
///
/// Nested work gets its own identity through [`child`](Self::child), so a
/// context-scoped manager hands it a separate connection.
///
/// # Examples
///
/// ```
/// use ferrous_conn::RequestContext;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let ended = Arc::new(AtomicUsize::new(0));
/// let request = RequestContext::new("request");
/// let job = request.child("job");
/// assert_eq!(job.full_path(), "request/job");
/// assert_ne!(request.id(), job.id());
///
/// let counter = ended.clone();
/// job.register_teardown(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }).unwrap();
///
/// job.end();
/// job.end(); // idempotent
/// assert_eq!(ended.load(Ordering::SeqCst), 1);
/// assert!(job.is_ended());
/// assert!(!request.is_ended());
/// ```
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

pub(crate) struct ContextInner {
    id: ContextId,
    label: String,
    parent: Option<RequestContext>,
    depth: usize,
    ended: AtomicBool,
    hooks: Mutex<TeardownBag>,
}

impl ContextInner {
    fn run_teardown(&self) {
        // Hooks run outside the lock; they may call back into this context
        let hooks = self.hooks.lock().drain_reverse();
        for hook in hooks {
            hook();
        }
    }
}

impl RequestContext {
    /// Starts a new top-level context.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_parent(label.into(), None)
    }

    /// Starts a nested context with its own identity and teardown hooks.
    ///
    /// Ending the child does not end the parent, and ending the parent does
    /// not end the child.
    pub fn child(&self, label: impl Into<String>) -> Self {
        Self::with_parent(label.into(), Some(self.clone()))
    }

    fn with_parent(label: String, parent: Option<RequestContext>) -> Self {
        let depth = parent.as_ref().map(|p| p.depth() + 1).unwrap_or(0);
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
                label,
                parent,
                depth,
                ended: AtomicBool::new(false),
                hooks: Mutex::new(TeardownBag::default()),
            }),
        }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// 0 for a top-level context, parent depth + 1 for a child.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn parent(&self) -> Option<&RequestContext> {
        self.inner.parent.as_ref()
    }

    /// Labels from the outermost context down to this one, joined by `/`.
    pub fn full_path(&self) -> String {
        let mut parts = Vec::with_capacity(self.depth() + 1);
        let mut current = Some(self);
        while let Some(ctx) = current {
            parts.push(ctx.label());
            current = ctx.parent();
        }
        parts.reverse();
        parts.join("/")
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    /// Number of teardown callbacks still pending.
    pub fn pending_teardowns(&self) -> usize {
        self.inner.hooks.lock().len()
    }

    /// Registers a callback to run once when this context ends.
    ///
    /// Fails with [`ConnError::ContextEnded`] if the context already ended.
    pub fn register_teardown<F>(&self, f: F) -> ConnResult<TeardownKey>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut hooks = self.inner.hooks.lock();
        // Checked under the hook lock so a concurrent end() cannot miss it
        if self.is_ended() {
            return Err(ConnError::ContextEnded);
        }
        let key = TeardownKey(NEXT_TEARDOWN_KEY.fetch_add(1, Ordering::Relaxed));
        hooks.push(key, Box::new(f));
        Ok(key)
    }

    /// Removes a pending callback. Returns false if it already ran or was cancelled.
    pub fn cancel_teardown(&self, key: TeardownKey) -> bool {
        self.inner.hooks.lock().cancel(key)
    }

    /// Ends the context, running pending teardown callbacks. Later calls do nothing.
    pub fn end(&self) {
        let first = {
            let _hooks = self.inner.hooks.lock();
            !self.inner.ended.swap(true, Ordering::SeqCst)
        };
        if first {
            tracing::debug!(context = %self.id(), path = %self.full_path(), "request context ended");
            self.inner.run_teardown();
        }
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Arc::downgrade(&self.inner))
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("depth", &self.inner.depth)
            .field("ended", &self.is_ended())
            .finish()
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.run_teardown();
        }
    }
}

/// Non-owning reference a connection keeps to the context it is bound to.
#[derive(Clone)]
pub(crate) struct WeakContext(Weak<ContextInner>);

impl WeakContext {
    /// Cancels a teardown callback if the context is still alive.
    pub(crate) fn cancel(&self, key: TeardownKey) -> bool {
        match self.0.upgrade() {
            Some(inner) => inner.hooks.lock().cancel(key),
            None => false,
        }
    }
}
