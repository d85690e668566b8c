use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::domain::record::{Record, RecordId, ScopeId};

use super::notify::Notifier;
use super::snapshot::{ApplyError, LocalChange, Snapshot};

pub type RemoteFuture = Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send>>;

/// The remote half of an intent, deferred until after the local apply.
pub type RemoteOp = Box<dyn FnOnce() -> RemoteFuture + Send>;

/// One user-initiated change against one record: the local transform, the
/// remote call that makes it durable, and a verb for logs and notifications.
pub struct MutationIntent<R> {
    pub target: RecordId,
    pub verb: &'static str,
    pub change: LocalChange<R>,
    pub remote: RemoteOp,
}

impl<R: Record> MutationIntent<R> {
    pub fn update<F, Op, Fut>(target: RecordId, verb: &'static str, transform: F, remote: Op) -> Self
    where
        F: FnOnce(&mut R) + Send + 'static,
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        Self {
            target,
            verb,
            change: LocalChange::Update(Box::new(transform)),
            remote: Box::new(move || -> RemoteFuture { Box::pin(remote()) }),
        }
    }

    pub fn remove<Op, Fut>(target: RecordId, verb: &'static str, remote: Op) -> Self
    where
        Op: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
    {
        Self {
            target,
            verb,
            change: LocalChange::Remove,
            remote: Box::new(move || -> RemoteFuture { Box::pin(remote()) }),
        }
    }
}

/// How the controller pulls a scope's authoritative list.
#[async_trait]
pub trait RecordFetcher<R: Record>: Send + Sync {
    async fn fetch(&self, scope: &ScopeId) -> Result<Vec<R>, ApiError>;
}

/// Terminal state of a submitted intent. Both are ordinary outcomes, not
/// errors: a rollback leaves the cache consistent again.
#[derive(Debug)]
pub enum MutationOutcome {
    Committed,
    RolledBack { reason: ApiError },
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, MutationOutcome::Committed)
    }
}

/// Refusals decided before the remote call starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("another change for record {target} is still in flight")]
    ConflictInFlight { target: RecordId },
    #[error("record {target} is not in the current snapshot")]
    RecordNotFound { target: RecordId },
}

/// Optimistic mutation controller for one scope: applies changes locally
/// first, then settles them against the record store.
///
/// The snapshot lock is only ever held for synchronous sections; every
/// remote call happens with the lock released, so reads stay responsive
/// while a mutation is in flight.
pub struct MutationController<R: Record> {
    scope: ScopeId,
    fetcher: Arc<dyn RecordFetcher<R>>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<Snapshot<R>>,
}

impl<R: Record> MutationController<R> {
    pub fn new(scope: ScopeId, fetcher: Arc<dyn RecordFetcher<R>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            scope,
            fetcher,
            notifier,
            state: Mutex::new(Snapshot::new()),
        }
    }

    /// Replaces the snapshot with the server's list. In-flight markers
    /// survive a load: a marker drops only when its intent settles. On
    /// fetch failure the cached list stays as it was.
    pub async fn load(&self) -> Result<(), ApiError> {
        let records = self.fetcher.fetch(&self.scope).await?;
        info!(scope = %self.scope, count = records.len(), "snapshot loaded");
        self.state.lock().replace(records);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<R> {
        self.state.lock().records()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().is_loaded()
    }

    pub fn is_locked(&self, id: &RecordId) -> bool {
        self.state.lock().is_locked(id)
    }

    /// Runs one intent through apply, settle, and commit or rollback.
    ///
    /// A conflict or a missing target refuses the intent synchronously with
    /// zero remote calls; a missing target additionally refreshes the
    /// snapshot so the caller sees current rows. Once the remote call has
    /// settled, a success commits (updates refetch the scope, removals
    /// discard the row without one) and a failure reinstates the list
    /// captured at apply time.
    pub async fn submit(&self, intent: MutationIntent<R>) -> Result<MutationOutcome, SubmitError> {
        let MutationIntent {
            target,
            verb,
            change,
            remote,
        } = intent;
        let removal = matches!(change, LocalChange::Remove);

        let applied = self.state.lock().apply(&target, change);
        let prior = match applied {
            Ok(prior) => prior,
            Err(ApplyError::ConflictInFlight { target }) => {
                debug!(%target, verb, "duplicate submission refused");
                return Err(SubmitError::ConflictInFlight { target });
            }
            Err(ApplyError::RecordNotFound { target }) => {
                warn!(%target, verb, "target missing from snapshot, refreshing");
                if let Err(err) = self.load().await {
                    warn!(scope = %self.scope, error = %err, "refresh after missing target failed");
                }
                return Err(SubmitError::RecordNotFound { target });
            }
        };
        debug!(%target, verb, "applied locally");

        match remote().await {
            Ok(()) => {
                if removal {
                    // No refetch for removals: discarding the row is the
                    // whole commit, even when a refresh raced the removal
                    // and reinstated it.
                    let mut state = self.state.lock();
                    state.discard(&target);
                    state.release(&target);
                } else {
                    let refreshed = self.fetcher.fetch(&self.scope).await;
                    let mut state = self.state.lock();
                    match refreshed {
                        Ok(records) => state.replace(records),
                        Err(err) => {
                            warn!(scope = %self.scope, error = %err, "refetch after commit failed, keeping local state")
                        }
                    }
                    state.release(&target);
                }
                info!(%target, verb, "mutation committed");
                self.notifier.success(verb);
                Ok(MutationOutcome::Committed)
            }
            Err(reason) => {
                {
                    let mut state = self.state.lock();
                    state.rollback(prior);
                    state.release(&target);
                }
                warn!(%target, verb, error = %reason, "mutation rolled back");
                self.notifier.failure(verb, &reason.to_string());
                Ok(MutationOutcome::RolledBack { reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use crate::services::notify::MockNotifier;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: RecordId,
        level: u32,
        note: String,
    }

    impl Record for Row {
        fn record_id(&self) -> &RecordId {
            &self.id
        }
    }

    fn row(id: &str, level: u32, note: &str) -> Row {
        Row {
            id: RecordId::new(id),
            level,
            note: note.to_string(),
        }
    }

    /// Stand-in server: the rows it would answer with, plus a call counter.
    struct FakeStore {
        rows: Mutex<Vec<Row>>,
        fetch_calls: AtomicUsize,
        fail_fetch: Mutex<bool>,
    }

    impl FakeStore {
        fn new(rows: Vec<Row>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                fetch_calls: AtomicUsize::new(0),
                fail_fetch: Mutex::new(false),
            })
        }

        fn set_rows(&self, rows: Vec<Row>) {
            *self.rows.lock() = rows;
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordFetcher<Row> for FakeStore {
        async fn fetch(&self, _scope: &ScopeId) -> Result<Vec<Row>, ApiError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_fetch.lock() {
                return Err(ApiError::Http { status: 500 });
            }
            Ok(self.rows.lock().clone())
        }
    }

    fn quiet_notifier() -> Arc<MockNotifier> {
        let mut mock = MockNotifier::new();
        mock.expect_success().return_const(());
        mock.expect_failure().return_const(());
        Arc::new(mock)
    }

    async fn controller(store: Arc<FakeStore>) -> MutationController<Row> {
        let ctrl = MutationController::new(ScopeId::new("g1"), store, quiet_notifier());
        ctrl.load().await.unwrap();
        ctrl
    }

    #[tokio::test]
    async fn test_commit_replaces_the_snapshot_with_the_servers_list() {
        let store = FakeStore::new(vec![row("a", 1, "old"), row("b", 1, "old")]);
        let ctrl = controller(store.clone()).await;

        // The server applies the change and derives a field the local
        // transform knows nothing about.
        let server = store.clone();
        let intent = MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 2,
            move || async move {
                server.set_rows(vec![row("a", 2, "touched"), row("b", 1, "old")]);
                Ok(())
            },
        );

        let outcome = ctrl.submit(intent).await.unwrap();
        assert!(outcome.is_committed());
        // Snapshot carries the server-derived field, not just the local edit.
        assert_eq!(ctrl.snapshot(), vec![row("a", 2, "touched"), row("b", 1, "old")]);
        // One fetch for load, one for the commit refetch.
        assert_eq!(store.fetches(), 2);
        assert!(!ctrl.is_locked(&RecordId::new("a")));
    }

    #[tokio::test]
    async fn test_failed_remote_rolls_back_to_the_apply_time_list() {
        let store = FakeStore::new(vec![row("a", 1, ""), row("b", 1, "")]);
        let ctrl = controller(store.clone()).await;
        let before = ctrl.snapshot();

        let intent = MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 9,
            || async { Err(ApiError::Http { status: 500 }) },
        );

        let outcome = ctrl.submit(intent).await.unwrap();
        match outcome {
            MutationOutcome::RolledBack { reason: ApiError::Http { status } } => {
                assert_eq!(status, 500)
            }
            other => panic!("expected rollback, got {:?}", other),
        }
        assert_eq!(ctrl.snapshot(), before);
        // No refetch on the rollback path.
        assert_eq!(store.fetches(), 1);
        assert!(!ctrl.is_locked(&RecordId::new("a")));
    }

    #[tokio::test]
    async fn test_second_submit_while_in_flight_is_refused_with_one_remote_call() {
        let store = FakeStore::new(vec![row("a", 1, "")]);
        let ctrl = controller(store.clone()).await;
        let gate = Arc::new(Notify::new());
        let remote_calls = Arc::new(AtomicUsize::new(0));

        let slow_gate = gate.clone();
        let slow_calls = remote_calls.clone();
        let first = ctrl.submit(MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 2,
            move || async move {
                slow_calls.fetch_add(1, Ordering::SeqCst);
                slow_gate.notified().await;
                Ok(())
            },
        ));

        let fast_calls = remote_calls.clone();
        let second = async {
            tokio::task::yield_now().await;
            let result = ctrl
                .submit(MutationIntent::update(
                    RecordId::new("a"),
                    "promote",
                    |r: &mut Row| r.level = 3,
                    move || async move {
                        fast_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                ))
                .await;
            gate.notify_one();
            result
        };

        let (first_result, second_result) = futures::join!(first, second);
        assert!(first_result.unwrap().is_committed());
        assert!(matches!(
            second_result,
            Err(SubmitError::ConflictInFlight { target }) if target == RecordId::new("a")
        ));
        assert_eq!(remote_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_removal_commits_without_a_refetch() {
        let store = FakeStore::new(vec![row("a", 1, ""), row("b", 1, "")]);
        let ctrl = controller(store.clone()).await;

        let server = store.clone();
        let intent = MutationIntent::remove(RecordId::new("b"), "delete row", move || async move {
            server.set_rows(vec![row("a", 1, "")]);
            Ok(())
        });

        let outcome = ctrl.submit(intent).await.unwrap();
        assert!(outcome.is_committed());
        assert_eq!(ctrl.snapshot(), vec![row("a", 1, "")]);
        assert_eq!(store.fetches(), 1);
        assert!(!ctrl.is_locked(&RecordId::new("b")));
    }

    #[tokio::test]
    async fn test_missing_target_refuses_and_refreshes() {
        let store = FakeStore::new(vec![row("a", 1, "")]);
        let ctrl = controller(store.clone()).await;
        store.set_rows(vec![row("a", 1, ""), row("c", 1, "")]);

        let intent = MutationIntent::remove(RecordId::new("ghost"), "delete row", || async {
            panic!("remote must not run for a missing target")
        });

        let result = ctrl.submit(intent).await;
        assert!(matches!(
            result,
            Err(SubmitError::RecordNotFound { target }) if target == RecordId::new("ghost")
        ));
        // The refusal triggered a refresh, so the new server row shows up.
        assert_eq!(store.fetches(), 2);
        assert_eq!(ctrl.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_never_releases_another_intents_marker() {
        let store = FakeStore::new(vec![row("a", 1, "")]);
        let ctrl = controller(store.clone()).await;
        let gate = Arc::new(Notify::new());
        let remote_calls = Arc::new(AtomicUsize::new(0));

        let slow_gate = gate.clone();
        let slow_calls = remote_calls.clone();
        let parked = ctrl.submit(MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 2,
            move || async move {
                slow_calls.fetch_add(1, Ordering::SeqCst);
                slow_gate.notified().await;
                Ok(())
            },
        ));

        let duplicate_calls = remote_calls.clone();
        let meddling = async {
            tokio::task::yield_now().await;
            // A submit against a vanished record refreshes the snapshot
            // while the first intent is still waiting on its remote call.
            let missing = ctrl
                .submit(MutationIntent::remove(RecordId::new("ghost"), "delete row", || async {
                    panic!("remote must not run for a missing target")
                }))
                .await;
            assert!(matches!(missing, Err(SubmitError::RecordNotFound { .. })));

            // The refresh must not have freed the parked intent's lock.
            assert!(ctrl.is_locked(&RecordId::new("a")));
            let duplicate = ctrl
                .submit(MutationIntent::update(
                    RecordId::new("a"),
                    "promote",
                    |r: &mut Row| r.level = 3,
                    move || async move {
                        duplicate_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    },
                ))
                .await;
            assert!(matches!(
                duplicate,
                Err(SubmitError::ConflictInFlight { target }) if target == RecordId::new("a")
            ));
            gate.notify_one();
        };

        let (first_result, ()) = futures::join!(parked, meddling);
        assert!(first_result.unwrap().is_committed());
        assert_eq!(remote_calls.load(Ordering::SeqCst), 1);
        assert!(!ctrl.is_locked(&RecordId::new("a")));
    }

    #[tokio::test]
    async fn test_commit_refetch_failure_keeps_the_local_list() {
        let store = FakeStore::new(vec![row("a", 1, "")]);
        let ctrl = controller(store.clone()).await;
        *store.fail_fetch.lock() = true;

        let intent = MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 2,
            || async { Ok(()) },
        );

        let outcome = ctrl.submit(intent).await.unwrap();
        assert!(outcome.is_committed());
        // The optimistic edit stands until the next successful load.
        assert_eq!(ctrl.snapshot(), vec![row("a", 2, "")]);
        assert!(!ctrl.is_locked(&RecordId::new("a")));
    }

    #[tokio::test]
    async fn test_rollback_restores_the_apply_time_list_across_records() {
        // Two different records in flight at once. The first one fails and
        // reinstates the list captured when it applied, which predates the
        // second one's commit: by contract the later settle wins the list.
        let store = FakeStore::new(vec![row("a", 1, ""), row("b", 1, "")]);
        let ctrl = controller(store.clone()).await;
        let gate = Arc::new(Notify::new());

        let failing_gate = gate.clone();
        let failing = ctrl.submit(MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 9,
            move || async move {
                failing_gate.notified().await;
                Err(ApiError::Http { status: 500 })
            },
        ));

        let server = store.clone();
        let succeeding = async {
            tokio::task::yield_now().await;
            let outcome = ctrl
                .submit(MutationIntent::update(
                    RecordId::new("b"),
                    "promote",
                    |r: &mut Row| r.level = 2,
                    move || async move {
                        server.set_rows(vec![row("a", 1, ""), row("b", 2, "")]);
                        Ok(())
                    },
                ))
                .await;
            gate.notify_one();
            outcome
        };

        let (failed, committed) = futures::join!(failing, succeeding);
        assert!(committed.unwrap().is_committed());
        assert!(matches!(
            failed.unwrap(),
            MutationOutcome::RolledBack { .. }
        ));
        // The rollback reinstated the pre-apply list wholesale.
        assert_eq!(ctrl.snapshot(), vec![row("a", 1, ""), row("b", 1, "")]);
        assert!(!ctrl.is_locked(&RecordId::new("a")));
        assert!(!ctrl.is_locked(&RecordId::new("b")));
    }

    #[tokio::test]
    async fn test_load_failure_leaves_the_cache_untouched() {
        let store = FakeStore::new(vec![row("a", 1, "")]);
        let ctrl = controller(store.clone()).await;
        *store.fail_fetch.lock() = true;

        let result = ctrl.load().await;
        assert!(matches!(result, Err(ApiError::Http { status: 500 })));
        assert_eq!(ctrl.snapshot(), vec![row("a", 1, "")]);
        assert!(ctrl.is_loaded());
    }

    #[tokio::test]
    async fn test_exactly_one_notification_per_terminal_state() {
        let store = FakeStore::new(vec![row("a", 1, "")]);
        let mut mock = MockNotifier::new();
        mock.expect_success()
            .withf(|verb| verb == "promote")
            .times(1)
            .return_const(());
        mock.expect_failure()
            .withf(|verb, _detail| verb == "promote")
            .times(1)
            .return_const(());

        let ctrl = MutationController::new(ScopeId::new("g1"), store, Arc::new(mock));
        ctrl.load().await.unwrap();

        ctrl.submit(MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 2,
            || async { Ok(()) },
        ))
        .await
        .unwrap();

        ctrl.submit(MutationIntent::update(
            RecordId::new("a"),
            "promote",
            |r: &mut Row| r.level = 3,
            || async { Err(ApiError::Forbidden) },
        ))
        .await
        .unwrap();
    }
}
