//! Sequential intent processing.
//!
//! Local and remote intents share one queue and reach the store strictly one
//! at a time, so the store only ever has a single writer. Conflicting edits
//! from different replicas resolve as last-committed-wins on each replica;
//! replicas are not guaranteed to converge.

use crate::config::RemoteConfig;
use crate::error::{TreeError, WorkspaceError};
use crate::intent::{MutationIntent, Operation};
use crate::store::{Applied, Mutation, TreeStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Outbound side of the collaboration transport
pub trait RemoteChannel: Send {
    fn send(&self, intent: &MutationIntent) -> Result<(), WorkspaceError>;
}

impl RemoteChannel for mpsc::UnboundedSender<MutationIntent> {
    fn send(&self, intent: &MutationIntent) -> Result<(), WorkspaceError> {
        mpsc::UnboundedSender::send(self, intent.clone())
            .map_err(|e| WorkspaceError::Channel(e.to_string()))
    }
}

/// What happened to one intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    Committed { revision: u64, mutation: Mutation },
    Unchanged { intent: MutationIntent },
    Rejected { intent: MutationIntent, error: TreeError },
    /// A remote intent referring to a node that no longer exists here
    Skipped { intent: MutationIntent, error: TreeError },
}

impl IntentOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, IntentOutcome::Committed { .. })
    }

    pub fn error(&self) -> Option<&TreeError> {
        match self {
            IntentOutcome::Rejected { error, .. } | IntentOutcome::Skipped { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}

/// Cloneable handle for submitting intents to a worker
#[derive(Debug, Clone)]
pub struct IntentQueue {
    sender: mpsc::Sender<MutationIntent>,
}

impl IntentQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MutationIntent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub async fn enqueue(&self, intent: MutationIntent) -> Result<(), WorkspaceError> {
        self.sender
            .send(intent)
            .await
            .map_err(|e| WorkspaceError::Channel(format!("queue closed: {}", e)))
    }

    /// Submit an operation originating from this replica
    pub async fn submit(&self, operation: Operation) -> Result<(), WorkspaceError> {
        self.enqueue(MutationIntent::local(operation)).await
    }

    /// Enqueue an operation received from a collaborator
    pub async fn enqueue_remote(&self, operation: Operation) -> Result<(), WorkspaceError> {
        self.enqueue(MutationIntent::remote(operation)).await
    }
}

/// Apply one intent and decide how to report it. Committed local mutations
/// are forwarded to `remote`; remote ones are never echoed back.
pub fn process_intent(
    store: &mut TreeStore,
    intent: MutationIntent,
    remote: Option<&dyn RemoteChannel>,
    config: &RemoteConfig,
) -> IntentOutcome {
    match store.apply(&intent) {
        Ok(Applied::Committed(mutation)) => {
            if !intent.is_remote() && config.forward_local {
                if let Some(remote) = remote {
                    let outbound = MutationIntent::local(mutation.to_operation());
                    if let Err(e) = remote.send(&outbound) {
                        log::warn!("sync: failed to forward {}: {}", outbound, e);
                    }
                }
            }
            IntentOutcome::Committed {
                revision: store.revision(),
                mutation,
            }
        }
        Ok(Applied::Unchanged) => IntentOutcome::Unchanged { intent },
        Err(error @ TreeError::NotFound { .. }) if intent.is_remote() && config.skip_stale => {
            log::warn!("sync: skipping stale remote intent {}: {}", intent, error);
            IntentOutcome::Skipped { intent, error }
        }
        Err(error) => {
            log::debug!("sync: rejected {}: {}", intent, error);
            IntentOutcome::Rejected { intent, error }
        }
    }
}

/// Own `store` and apply queued intents one by one until the queue closes
/// or `cancel` fires. Returns the store.
///
/// Cancellation closes the queue to new intents; intents it already
/// accepted are still applied and reported. If the outcome receiver goes
/// away the worker keeps applying without reporting.
pub async fn run_worker(
    mut store: TreeStore,
    mut intents: mpsc::Receiver<MutationIntent>,
    outcomes: mpsc::Sender<IntentOutcome>,
    remote: Option<Box<dyn RemoteChannel>>,
    config: RemoteConfig,
    cancel: CancellationToken,
) -> TreeStore {
    log::info!("sync: worker started with {} nodes", store.len());
    let mut listening = true;
    loop {
        let intent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::info!("sync: worker cancelled");
                break;
            }
            intent = intents.recv() => match intent {
                Some(intent) => intent,
                None => break,
            },
        };

        let outcome = process_intent(&mut store, intent, remote.as_deref(), &config);
        report(&outcomes, outcome, &mut listening).await;
    }

    intents.close();
    let mut drained = 0;
    while let Ok(intent) = intents.try_recv() {
        let outcome = process_intent(&mut store, intent, remote.as_deref(), &config);
        report(&outcomes, outcome, &mut listening).await;
        drained += 1;
    }
    if drained > 0 {
        log::info!("sync: applied {} intents queued before shutdown", drained);
    }

    log::info!("sync: worker stopped at revision {}", store.revision());
    store
}

async fn report(outcomes: &mpsc::Sender<IntentOutcome>, outcome: IntentOutcome, listening: &mut bool) {
    if *listening && outcomes.send(outcome).await.is_err() {
        log::warn!("sync: outcome receiver dropped, later outcomes are not reported");
        *listening = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Kind, NodeId};

    #[test]
    fn test_process_local_commit_is_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = TreeStore::new();
        let intent = MutationIntent::local("create:folder:/:src".parse().unwrap());

        let outcome = process_intent(&mut store, intent, Some(&tx), &RemoteConfig::default());

        assert!(outcome.is_committed());
        let forwarded = rx.try_recv().unwrap();
        match forwarded.operation {
            Operation::Create { id, name, .. } => {
                assert_eq!(id, Some(store.forest().roots()[0].id));
                assert_eq!(name.as_deref(), Some("src"));
            }
            other => panic!("unexpected forwarded operation: {:?}", other),
        }
    }

    #[test]
    fn test_process_remote_commit_is_not_echoed() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = TreeStore::new();
        let intent = MutationIntent::remote("create:file:/:a".parse().unwrap());

        let outcome = process_intent(&mut store, intent, Some(&tx), &RemoteConfig::default());

        assert!(outcome.is_committed());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_remote_intent_is_skipped() {
        let mut store = TreeStore::new();
        let missing = NodeId::generate();
        let intent = MutationIntent::remote(Operation::Remove { target_id: missing });

        let outcome = process_intent(&mut store, intent.clone(), None, &RemoteConfig::default());
        assert_eq!(
            outcome,
            IntentOutcome::Skipped {
                intent,
                error: TreeError::NotFound { id: missing }
            }
        );
    }

    #[test]
    fn test_stale_local_intent_is_rejected() {
        let mut store = TreeStore::new();
        let missing = NodeId::generate();
        let intent = MutationIntent::local(Operation::Remove { target_id: missing });

        let outcome = process_intent(&mut store, intent, None, &RemoteConfig::default());
        assert!(matches!(outcome, IntentOutcome::Rejected { .. }));
    }

    #[test]
    fn test_stale_remote_rejected_when_skipping_disabled() {
        let mut store = TreeStore::new();
        let config = RemoteConfig {
            skip_stale: false,
            ..RemoteConfig::default()
        };
        let intent = MutationIntent::remote(Operation::Remove {
            target_id: NodeId::generate(),
        });
        let outcome = process_intent(&mut store, intent, None, &config);
        assert!(matches!(outcome, IntentOutcome::Rejected { .. }));
    }

    #[test]
    fn test_unchanged_outcome() {
        let mut store = TreeStore::new();
        let id = store.create_named(None, Kind::File, "a").unwrap();
        let intent = MutationIntent::local(Operation::Rename {
            target_id: id,
            name: String::new(),
        });
        let outcome = process_intent(&mut store, intent, None, &RemoteConfig::default());
        assert!(matches!(outcome, IntentOutcome::Unchanged { .. }));
        assert!(outcome.error().is_none());
    }
}
