//! Task-local storage for the "current session" of each gateway.
//!
//! The map is keyed by gateway slot id, so gateways for different backing
//! stores keep independent ambient state within one task, and it lives in a
//! `task_local!`, so concurrent logical tasks never observe each other's
//! bindings even when multiplexed on a single thread.

use crate::core::{DbError, Result};
use crate::session::SessionHandle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;

tokio::task_local! {
    static ACTIVE_SESSIONS: RefCell<HashMap<u64, SessionHandle>>;
}

/// Restores the binding captured by the matching [`set`] call. Pairing a
/// reset with its own set (instead of blindly clearing) keeps sequential
/// scopes from corrupting each other's view of the slot.
pub(crate) struct ContextToken {
    slot: u64,
    previous: Option<SessionHandle>,
}

/// Publishes `session` as current for `slot`, capturing the prior binding.
pub(crate) fn set(slot: u64, session: SessionHandle) -> Result<ContextToken> {
    ACTIVE_SESSIONS
        .try_with(|cell| {
            let previous = cell.borrow_mut().insert(slot, session);
            ContextToken { slot, previous }
        })
        .map_err(|_| DbError::ExecutionError("no ambient scope on this task".into()))
}

/// Restores the binding captured by `token`.
pub(crate) fn reset(token: ContextToken) {
    let _ = ACTIVE_SESSIONS.try_with(|cell| {
        let mut sessions = cell.borrow_mut();
        match token.previous {
            Some(previous) => sessions.insert(token.slot, previous),
            None => sessions.remove(&token.slot),
        }
    });
}

/// Current session for `slot`; fails fast when none is bound.
pub(crate) fn current(slot: u64) -> Result<SessionHandle> {
    ACTIVE_SESSIONS
        .try_with(|cell| cell.borrow().get(&slot).cloned())
        .ok()
        .flatten()
        .ok_or(DbError::NoCurrentSession)
}

pub(crate) fn is_bound(slot: u64) -> bool {
    ACTIVE_SESSIONS
        .try_with(|cell| cell.borrow().contains_key(&slot))
        .unwrap_or(false)
}

/// Runs `future` with the task-local session map in place, reusing the
/// existing map when the task is already inside an ambient scope.
pub(crate) async fn in_scope<F: Future>(future: F) -> F::Output {
    if ACTIVE_SESSIONS.try_with(|_| ()).is_ok() {
        future.await
    } else {
        ACTIVE_SESSIONS
            .scope(RefCell::new(HashMap::new()), future)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::config::EngineConfig;
    use crate::connection::pool::ConnectionPool;
    use crate::session::SessionInner;
    use crate::storage::InMemoryStorage;
    use std::sync::Arc;

    async fn handle() -> SessionHandle {
        let pool =
            ConnectionPool::new(EngineConfig::default(), Arc::new(InMemoryStorage::new())).unwrap();
        Arc::new(SessionInner::new(pool.acquire().await.unwrap()))
    }

    #[tokio::test]
    async fn get_without_scope_fails() {
        assert!(matches!(current(1), Err(DbError::NoCurrentSession)));
    }

    #[tokio::test]
    async fn set_reset_restores_previous_binding() {
        let first = handle().await;
        let second = handle().await;
        in_scope(async move {
            let outer = set(1, first.clone()).unwrap();
            assert!(Arc::ptr_eq(&current(1).unwrap(), &first));

            let inner = set(1, second.clone()).unwrap();
            assert!(Arc::ptr_eq(&current(1).unwrap(), &second));

            reset(inner);
            assert!(Arc::ptr_eq(&current(1).unwrap(), &first));

            reset(outer);
            assert!(matches!(current(1), Err(DbError::NoCurrentSession)));
        })
        .await;
    }

    #[tokio::test]
    async fn slots_are_independent() {
        let first = handle().await;
        in_scope(async move {
            let token = set(1, first).unwrap();
            assert!(current(1).is_ok());
            assert!(matches!(current(2), Err(DbError::NoCurrentSession)));
            reset(token);
        })
        .await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn tasks_never_observe_each_other() {
        // both tasks share one thread; isolation must come from the
        // task-local map, not from thread identity
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                tokio::spawn(async {
                    let own = handle().await;
                    in_scope(async move {
                        let token = set(1, own.clone()).unwrap();
                        tokio::task::yield_now().await;
                        assert!(Arc::ptr_eq(&current(1).unwrap(), &own));
                        tokio::task::yield_now().await;
                        reset(token);
                        assert!(matches!(current(1), Err(DbError::NoCurrentSession)));
                    })
                    .await;
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
    }
}
