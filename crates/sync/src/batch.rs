use crate::SyncOrchestrator;
use crate::error::{ErrorKind, Result};
use async_stream::stream;
use futures::Stream;
use tether_db::{BatchRepository, BatchState, BatchStatus, ItemState};

/// Progress events emitted by [`run_batch`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Discovered`](Self::Discovered), exactly once, with the item count.
/// 3. [`Item`](Self::Item), once per processed id, in queue order.
/// 4. [`Complete`](Self::Complete) or [`Aborted`](Self::Aborted), exactly once.
///
/// A batch store failure terminates the stream early with an `Err`, in which
/// case neither terminal event is emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchEvent {
    Started,
    Discovered(u64),
    /// One id was synced (or failed to).
    Item {
        remote_id: String,
        local_content_id: Option<i64>,
        error: Option<String>,
    },
    Complete(BatchStatus),
    /// The batch was marked failed by someone else while running.
    Aborted(Option<String>),
}

fn batch_error(e: tether_db::error::Error) -> crate::error::Error {
    exn::Exn::from(ErrorKind::Batch((*e).to_string()))
}

/// Runs a queued batch one id at a time, recording each outcome before
/// moving on to the next id.
///
/// Item failures are recorded and reported but do not stop the batch. If the
/// batch is marked failed externally, the worker stops before its next item
/// and leaves already recorded items untouched.
pub fn run_batch<'a>(
    orchestrator: &'a SyncOrchestrator,
    batches: &'a BatchRepository,
    batch_id: &'a str,
) -> impl Stream<Item = Result<BatchEvent>> + 'a {
    stream!({
        let batch = match batches.require(batch_id).await.map_err(batch_error) {
            Ok(batch) => batch,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        match batches.start(batch_id).await.map_err(batch_error) {
            Ok(true) => {},
            Ok(false) => {
                yield Err(exn::Exn::from(ErrorKind::Batch(format!(
                    "batch {batch_id} is {}, not queued",
                    batch.status.as_str()
                ))));
                return;
            },
            Err(e) => {
                yield Err(e);
                return;
            },
        }
        yield Ok(BatchEvent::Started);
        yield Ok(BatchEvent::Discovered(batch.total));

        for item_id in &batch.item_ids {
            match batches.require(batch_id).await.map_err(batch_error) {
                Ok(current) if current.status == BatchState::Failed => {
                    tracing::info!(batch_id, "batch failed externally, stopping");
                    yield Ok(BatchEvent::Aborted(current.error));
                    return;
                },
                Ok(_) => {},
                Err(e) => {
                    yield Err(e);
                    return;
                },
            }
            if let Err(e) = batches.set_current(batch_id, item_id).await.map_err(batch_error) {
                yield Err(e);
                return;
            }

            let (state, event) = match orchestrator.sync(item_id).await {
                Ok(report) => (ItemState::Success, BatchEvent::Item {
                    remote_id: item_id.clone(),
                    local_content_id: Some(report.local_content_id),
                    error: None,
                }),
                Err(e) => (ItemState::Failed, BatchEvent::Item {
                    remote_id: item_id.clone(),
                    local_content_id: e.local_content_id(),
                    error: Some((*e).to_string()),
                }),
            };
            if let Err(e) = batches.record_item(batch_id, item_id, state).await.map_err(batch_error) {
                yield Err(e);
                return;
            }
            yield Ok(event);
        }

        match batches.complete(batch_id).await.map_err(batch_error) {
            Ok(true) => match batches.require(batch_id).await.map_err(batch_error) {
                Ok(done) => {
                    tracing::info!(batch_id, successful = done.successful, failed = done.failed, "batch complete");
                    yield Ok(BatchEvent::Complete(done));
                },
                Err(e) => {
                    yield Err(e);
                },
            },
            Ok(false) => {
                let reason = batches.get(batch_id).await.ok().flatten().and_then(|b| b.error);
                yield Ok(BatchEvent::Aborted(reason));
            },
            Err(e) => {
                yield Err(e);
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncSettings;
    use futures::{StreamExt, TryStreamExt};
    use std::sync::Arc;
    use tether_content::MemoryStore;
    use tether_db::{Database, LinkRegistry};
    use tether_remote::MockRemote;
    use tether_remote::models::PageProperties;
    use time::UtcDateTime;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const MISSING: &str = "cccccccccccccccccccccccccccccccc";

    async fn setup() -> (SyncOrchestrator, BatchRepository) {
        let db = Database::connect_in_memory().await.unwrap();
        let remote = MockRemote::default()
            .with_page(PageProperties::page(A, "Alpha", UtcDateTime::now()), vec![])
            .with_page(PageProperties::page(B, "Beta", UtcDateTime::now()), vec![]);
        let orchestrator = SyncOrchestrator::new(
            Arc::new(remote),
            Arc::new(MemoryStore::default()),
            LinkRegistry::from(&db),
            SyncSettings::default(),
        );
        (orchestrator, BatchRepository::from(&db))
    }

    #[tokio::test]
    async fn test_runs_every_item_in_order() {
        let (orchestrator, batches) = setup().await;
        let id = batches.create([A, MISSING, B]).await.unwrap().batch_id;
        let events: Vec<BatchEvent> = run_batch(&orchestrator, &batches, &id).try_collect().await.unwrap();

        assert_eq!(events.len(), 6);
        assert_eq!(events[0], BatchEvent::Started);
        assert_eq!(events[1], BatchEvent::Discovered(3));
        assert!(matches!(&events[2], BatchEvent::Item { remote_id, error: None, .. } if remote_id == A));
        assert!(matches!(&events[3], BatchEvent::Item { remote_id, error: Some(_), .. } if remote_id == MISSING));
        let BatchEvent::Complete(done) = &events[5] else { panic!("expected completion, got {:?}", events[5]) };
        assert_eq!(done.status, BatchState::Completed);
        assert_eq!((done.processed, done.successful, done.failed), (3, 2, 1));
        assert_eq!(done.item(MISSING), Some(ItemState::Failed));
    }

    #[tokio::test]
    async fn test_stops_when_failed_externally() {
        let (orchestrator, batches) = setup().await;
        let id = batches.create([A, B]).await.unwrap().batch_id;
        let mut events = Box::pin(run_batch(&orchestrator, &batches, &id));
        assert_eq!(events.next().await.unwrap().unwrap(), BatchEvent::Started);
        assert_eq!(events.next().await.unwrap().unwrap(), BatchEvent::Discovered(2));
        assert!(matches!(events.next().await.unwrap().unwrap(), BatchEvent::Item { .. }));

        batches.fail(&id, "operator abort").await.unwrap();
        assert_eq!(events.next().await.unwrap().unwrap(), BatchEvent::Aborted(Some("operator abort".into())));
        assert!(events.next().await.is_none());

        let batch = batches.require(&id).await.unwrap();
        assert_eq!(batch.status, BatchState::Failed);
        assert_eq!(batch.item(A), Some(ItemState::Success));
        assert_eq!(batch.item(B), Some(ItemState::Queued));
    }

    #[tokio::test]
    async fn test_refuses_to_rerun() {
        let (orchestrator, batches) = setup().await;
        let id = batches.create([A]).await.unwrap().batch_id;
        let _: Vec<BatchEvent> = run_batch(&orchestrator, &batches, &id).try_collect().await.unwrap();
        let err = run_batch(&orchestrator, &batches, &id).try_collect::<Vec<_>>().await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Batch(_)));
        let err = run_batch(&orchestrator, &batches, "nope").try_collect::<Vec<_>>().await.unwrap_err();
        assert!(matches!(*err, ErrorKind::Batch(_)));
    }
}
