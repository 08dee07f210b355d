//! Local Executor
//!
//! Async values spawn their futures onto a single-threaded
//! [`LocalPool`](futures::executor::LocalPool) owned by the current thread.
//! Nothing polls the pool on its own: the host drives it with
//! [`run_until_stalled`] from its event loop, or with [`block_on`].

use std::cell::RefCell;
use std::future::Future;

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;

struct Executor {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

impl Executor {
    fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        Self {
            pool: RefCell::new(pool),
            spawner,
        }
    }
}

thread_local! {
    static EXECUTOR: Executor = Executor::new();
}

/// Spawn a task on the current thread's pool.
pub(crate) fn spawn_local(task: impl Future<Output = ()> + 'static) {
    EXECUTOR.with(|executor| {
        if let Err(error) = executor.spawner.spawn_local(task) {
            tracing::warn!(%error, "failed to spawn async task");
        }
    });
}

/// Poll every pending async task until none can make progress.
///
/// Calling this from inside a running task does nothing.
pub fn run_until_stalled() {
    EXECUTOR.with(|executor| match executor.pool.try_borrow_mut() {
        Ok(mut pool) => pool.run_until_stalled(),
        Err(_) => tracing::warn!("run_until_stalled called re-entrantly; ignoring"),
    });
}

/// Run `future` to completion, driving async tasks while it is pending.
///
/// Called from inside a running task, `future` is still completed but other
/// tasks are not driven in the meantime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    EXECUTOR.with(|executor| match executor.pool.try_borrow_mut() {
        Ok(mut pool) => pool.run_until(future),
        Err(_) => {
            tracing::warn!("block_on called re-entrantly; other tasks will not be driven");
            futures::executor::block_on(future)
        }
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
