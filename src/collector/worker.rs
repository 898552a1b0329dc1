//! Background assembly worker.
//!
//! Exactly one worker task runs per collector: it drains the synchronizer,
//! assembles target instances, routes results to the caller's callback, and
//! enforces the collection-limit and fail-fast policies. State shared
//! between the worker and the handle is limited to the registry, the
//! lifecycle flag, and a slot for a fault raised on the emit path.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::collector::CollectError;
use crate::collector::registry::FieldRegistry;
use crate::collector::sync::Synchronizer;
use crate::schema::{Record, Snapshot};

/// Result callback: exactly one of instance or error per invocation.
pub(crate) type ResultCallback<R> = Box<dyn FnMut(Result<R, CollectError>) + Send>;

const ACTIVE: u8 = 0;
const CANCELLED: u8 = 1;

/// State shared between a collector handle and its worker task.
pub(crate) struct Shared {
    registry: Arc<FieldRegistry>,
    state: AtomicU8,
    fault: Mutex<Option<CollectError>>,
}

impl Shared {
    pub(crate) fn new(registry: FieldRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            state: AtomicU8::new(ACTIVE),
            fault: Mutex::new(None),
        }
    }

    /// Shared state for a handle whose construction already failed.
    pub(crate) fn new_cancelled() -> Self {
        let shared = Self::new(FieldRegistry::empty());
        shared.state.store(CANCELLED, Ordering::Release);
        shared
    }

    pub(crate) fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Transition to cancelled and release the channels. Returns `true`
    /// for the call that won the transition; later calls are no-ops.
    pub(crate) fn cancel(&self) -> bool {
        let won = self
            .state
            .compare_exchange(ACTIVE, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            self.registry.close_all();
        }
        won
    }

    /// Cancel with a fault to be delivered through the result callback.
    /// Only the fault that wins the cancellation is kept; the fault is
    /// stored before the channels close so the worker always finds it.
    pub(crate) fn fail(&self, error: CollectError) -> bool {
        let mut fault = self.lock_fault();
        let won = self
            .state
            .compare_exchange(ACTIVE, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            *fault = Some(error);
            drop(fault);
            self.registry.close_all();
        }
        won
    }

    pub(crate) fn take_fault(&self) -> Option<CollectError> {
        self.lock_fault().take()
    }

    fn lock_fault(&self) -> std::sync::MutexGuard<'_, Option<CollectError>> {
        self.fault
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Drive the synchronize → assemble → deliver loop until cancellation.
pub(crate) async fn run<R: Record>(
    shared: Arc<Shared>,
    mut on_result: ResultCallback<R>,
    limit: Option<u64>,
) {
    tracing::debug!(
        shape = std::any::type_name::<R>(),
        "collector worker started"
    );
    let synchronizer = Synchronizer::new(Arc::clone(shared.registry()));
    let mut assembled: u64 = 0;

    loop {
        let Some(mut snapshot) = synchronizer.next().await else {
            break;
        };
        match assemble_guarded::<R>(&mut snapshot) {
            Ok(instance) => {
                if shared.is_cancelled() {
                    break;
                }
                on_result(Ok(instance));
                assembled += 1;
                tracing::debug!(assembled, "instance assembled");
                if limit.is_some_and(|limit| assembled >= limit) {
                    tracing::debug!(assembled, "collection limit reached");
                    shared.cancel();
                    break;
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "assembly failed");
                if !shared.is_cancelled() {
                    on_result(Err(error));
                }
                shared.cancel();
                break;
            }
        }
    }

    // A fault raised on the emit path closed the channels; deliver it.
    if let Some(error) = shared.take_fault() {
        tracing::warn!(error = %error, "collection failed");
        on_result(Err(error));
    }
    tracing::debug!(assembled, "collector worker stopped");
}

/// Assemble one instance, normalizing a panic in a hand-written
/// [`Record::assemble`] to an execution error instead of killing the task.
fn assemble_guarded<R: Record>(snapshot: &mut Snapshot) -> Result<R, CollectError> {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    catch_unwind(AssertUnwindSafe(|| R::assemble(snapshot))).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "target assembly panicked".to_string());
        Err(CollectError::Execution(message))
    })
}
