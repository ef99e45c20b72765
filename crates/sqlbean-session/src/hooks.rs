//! Session-level before/after closures.

use sqlbean_core::{Bean, Error};
use std::any::Any;
use std::fmt;

/// A closure run against each bean a write touches.
///
/// It receives the bean as `&mut dyn Any`; downcast to the concrete type to
/// inspect or change it. Returning `Err` aborts the operation.
pub type HookFn = Box<dyn FnMut(&mut dyn Any) -> Result<(), Error> + Send>;

/// Work postponed until the open transaction commits.
pub(crate) type Deferred = Box<dyn FnOnce() -> Result<(), Error> + Send>;

/// Which bean hook method an after-step calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Insert,
    Update,
    Delete,
}

/// Closures registered for the next terminal operation.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) before: Vec<HookFn>,
    pub(crate) after: Vec<HookFn>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

impl Hooks {
    pub(crate) fn clear(&mut self) {
        self.before.clear();
        self.after.clear();
    }

    /// Session closures, then the bean's own before-hook.
    #[allow(clippy::result_large_err)]
    pub(crate) fn run_before<B: Bean>(&mut self, bean: &mut B, phase: Phase) -> Result<(), Error> {
        for hook in &mut self.before {
            hook(bean as &mut dyn Any)?;
        }
        match phase {
            Phase::Insert => bean.before_insert(),
            Phase::Update => bean.before_update(),
            Phase::Delete => bean.before_delete(),
        }
    }
}

/// Session closures, then the bean's own after-hook.
#[allow(clippy::result_large_err)]
pub(crate) fn run_after<B: Bean>(
    hooks: &mut [HookFn],
    bean: &mut B,
    phase: Phase,
) -> Result<(), Error> {
    for hook in hooks.iter_mut() {
        hook(bean as &mut dyn Any)?;
    }
    match phase {
        Phase::Insert => bean.after_insert(),
        Phase::Update => bean.after_update(),
        Phase::Delete => bean.after_delete(),
    }
}

/// Package the after-steps for `beans` to run at commit, on snapshots taken
/// now.
pub(crate) fn defer_after<B: Bean>(mut hooks: Vec<HookFn>, beans: &[B], phase: Phase) -> Deferred {
    let mut snapshots = beans.to_vec();
    Box::new(move || {
        for bean in &mut snapshots {
            run_after(&mut hooks, bean, phase)?;
        }
        Ok(())
    })
}
