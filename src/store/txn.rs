//! Explicit transaction context
//!
//! The thread that performs a mutation carries a [`TxnContext`] as an
//! explicit parameter through the capture -> dispatch -> record call chain.
//! The context tracks at most one active transaction token; the audit store
//! suspends it while an isolated audit transaction runs and restores it on
//! every exit path.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a transaction registered in a [`TxnContext`]
///
/// Tokens identify a transaction without granting access to its staged
/// writes; suspending and restoring a token never touches the transaction
/// it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxnToken(u64);

impl TxnToken {
    /// Mint a process-unique token
    pub fn fresh() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-thread transaction context, threaded as an explicit parameter
///
/// Holds the token of the transaction currently active on the calling
/// thread, if any. There is no nesting: entering while a transaction is
/// already active replaces it, which callers avoid by suspending first.
#[derive(Debug, Default)]
pub struct TxnContext {
    active: Option<TxnToken>,
}

impl TxnContext {
    /// Create a context with no active transaction
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a transaction is active on this context
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The active transaction's token, if any
    pub fn active(&self) -> Option<TxnToken> {
        self.active
    }

    /// Mark a transaction as active
    pub fn enter(&mut self, token: TxnToken) {
        self.active = Some(token);
    }

    /// Clear the active transaction
    pub fn exit(&mut self) {
        self.active = None;
    }

    /// Take the active token, leaving the context empty
    ///
    /// Pair with [`TxnRestoreGuard`] so the caller's transaction comes back
    /// no matter how the isolated work exits.
    pub fn suspend(&mut self) -> Option<TxnToken> {
        self.active.take()
    }
}

/// Guard that restores a suspended transaction token on drop
///
/// Restoration happens on all exit paths, including early returns and
/// panics, which is what makes the suspend/run/restore contract safe to
/// compose with fallible bodies.
pub struct TxnRestoreGuard<'a> {
    ctx: &'a mut TxnContext,
    saved: Option<TxnToken>,
}

impl<'a> TxnRestoreGuard<'a> {
    /// Suspend whatever is active on `ctx` and arm restoration
    pub fn suspend(ctx: &'a mut TxnContext) -> Self {
        let saved = ctx.suspend();
        Self { ctx, saved }
    }

    /// The token that was suspended, if any
    pub fn suspended(&self) -> Option<TxnToken> {
        self.saved
    }
}

impl Drop for TxnRestoreGuard<'_> {
    fn drop(&mut self) {
        self.ctx.active = self.saved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        let a = TxnToken::fresh();
        let b = TxnToken::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn test_enter_and_exit() {
        let mut ctx = TxnContext::new();
        assert!(!ctx.is_active());

        let token = TxnToken::fresh();
        ctx.enter(token);
        assert!(ctx.is_active());
        assert_eq!(ctx.active(), Some(token));

        ctx.exit();
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut ctx = TxnContext::new();
        let outer = TxnToken::fresh();
        ctx.enter(outer);

        {
            let guard = TxnRestoreGuard::suspend(&mut ctx);
            assert_eq!(guard.suspended(), Some(outer));
        }

        assert_eq!(ctx.active(), Some(outer));
    }

    #[test]
    fn test_guard_restores_empty_context() {
        let mut ctx = TxnContext::new();
        {
            let guard = TxnRestoreGuard::suspend(&mut ctx);
            assert_eq!(guard.suspended(), None);
        }
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_guard_restores_across_panic() {
        let outer = TxnToken::fresh();
        let mut ctx = TxnContext::new();
        ctx.enter(outer);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = TxnRestoreGuard::suspend(&mut ctx);
            panic!("isolated body failed");
        }));
        assert!(result.is_err());
        assert_eq!(ctx.active(), Some(outer));
    }
}
