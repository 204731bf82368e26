//! Live subscription handle and the listener that feeds it

use super::{Subject, SubscriptionState};
use crate::error::BoardError;
use crate::model::FromSnapshot;
use crate::store::{Snapshot, SnapshotListener, Unsubscribe};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// One delivery to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectUpdate<T> {
    /// Normalized state of the subject; replaces the consumer's prior view
    Snapshot(T),
    /// This delivery could not be normalized. The feed stays live and a
    /// later snapshot may correct it.
    Invalid(BoardError),
    /// The feed failed. Nothing follows.
    Failed(BoardError),
}

pub(super) struct Shared {
    pub(super) subject: Subject,
    pub(super) state: Mutex<SubscriptionState>,
}

impl Shared {
    pub(super) fn new(subject: Subject) -> Arc<Self> {
        Arc::new(Self {
            subject,
            state: Mutex::new(SubscriptionState::Idle),
        })
    }

    pub(super) fn state(&self) -> SubscriptionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SubscriptionState::Closed)
    }

    pub(super) fn transition(&self, next: SubscriptionState) {
        if let Ok(mut state) = self.state.lock() {
            trace!(subject = %self.subject, from = ?*state, to = ?next, "Subscription transition");
            *state = next;
        }
    }
}

/// Adapter-facing listener; normalizes and forwards while the subject is open
pub(super) struct Relay<T> {
    shared: Arc<Shared>,
    updates: mpsc::UnboundedSender<SubjectUpdate<T>>,
    /// Longest append-only sequence lengths delivered so far
    seen: Mutex<HashMap<String, usize>>,
}

impl<T: FromSnapshot> Relay<T> {
    pub(super) fn new(
        shared: Arc<Shared>,
        updates: mpsc::UnboundedSender<SubjectUpdate<T>>,
    ) -> Self {
        Self {
            shared,
            updates,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Refuses a value that would shorten votes or comments already shown;
    /// otherwise records its lengths as the new floor.
    fn check_append_only(&self, value: &T) -> Result<(), BoardError> {
        let lengths = value.append_only_lengths();
        if lengths.is_empty() {
            return Ok(());
        }
        let Ok(mut seen) = self.seen.lock() else {
            return Ok(());
        };
        for (key, delivered) in &lengths {
            if let Some(&floor) = seen.get(key) {
                if *delivered < floor {
                    return Err(BoardError::StaleSnapshot {
                        key: key.clone(),
                        seen: floor,
                        delivered: *delivered,
                    });
                }
            }
        }
        seen.extend(lengths);
        Ok(())
    }
}

impl<T: FromSnapshot> SnapshotListener for Relay<T> {
    fn on_next(&self, snapshot: Snapshot) {
        // The state lock is held across the send so close() cannot slip in
        // between the check and the delivery.
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        if matches!(*state, SubscriptionState::Closed | SubscriptionState::Error) {
            trace!(subject = %self.shared.subject, state = ?*state, "Dropping late snapshot");
            return;
        }
        *state = SubscriptionState::Live;

        let update = match T::from_snapshot(snapshot) {
            Ok(value) => match self.check_append_only(&value) {
                Ok(()) => SubjectUpdate::Snapshot(value),
                Err(error) => {
                    warn!(subject = %self.shared.subject, error = %error, "Keeping prior view over a shrunken snapshot");
                    SubjectUpdate::Invalid(error)
                }
            },
            Err(error) => {
                warn!(subject = %self.shared.subject, error = %error, "Snapshot could not be normalized");
                SubjectUpdate::Invalid(error)
            }
        };
        let _ = self.updates.send(update);
    }

    fn on_error(&self, error: BoardError) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        if matches!(*state, SubscriptionState::Closed | SubscriptionState::Error) {
            trace!(subject = %self.shared.subject, "Dropping late feed error");
            return;
        }
        warn!(subject = %self.shared.subject, error = %error, "Live feed failed");
        *state = SubscriptionState::Error;
        let _ = self.updates.send(SubjectUpdate::Failed(error));
    }
}

/// Disarmed once the adapter handed back its unsubscribe handle. If the
/// opening future is dropped first, the subject is closed so a feed the
/// adapter may still attach delivers nowhere.
pub(super) struct SetupGuard {
    shared: Option<Arc<Shared>>,
}

impl SetupGuard {
    pub(super) fn arm(shared: Arc<Shared>) -> Self {
        Self {
            shared: Some(shared),
        }
    }

    pub(super) fn disarm(mut self) {
        self.shared = None;
    }
}

impl Drop for SetupGuard {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if shared.state() != SubscriptionState::Error {
                shared.transition(SubscriptionState::Closed);
            }
        }
    }
}

/// An open subscription to one subject
///
/// Owning the handle is owning the feed: [`close`](Self::close) or dropping
/// the handle detaches from the adapter and discards anything not yet
/// consumed, so no exit path of the owning view can leak deliveries.
pub struct LiveSubscription<T> {
    shared: Arc<Shared>,
    updates: mpsc::UnboundedReceiver<SubjectUpdate<T>>,
    unsubscribe: Option<Unsubscribe>,
    failed: bool,
}

impl<T> LiveSubscription<T> {
    pub(super) fn new(
        shared: Arc<Shared>,
        updates: mpsc::UnboundedReceiver<SubjectUpdate<T>>,
        unsubscribe: Unsubscribe,
    ) -> Self {
        Self {
            shared,
            updates,
            unsubscribe: Some(unsubscribe),
            failed: false,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.shared.subject
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    /// Next delivery in store order; `None` once closed or after `Failed`
    pub async fn next(&mut self) -> Option<SubjectUpdate<T>> {
        if self.failed || self.state() == SubscriptionState::Closed {
            return None;
        }
        let update = self.updates.recv().await?;
        self.failed = matches!(update, SubjectUpdate::Failed(_));
        Some(update)
    }

    /// Non-blocking variant of [`next`](Self::next)
    pub fn try_next(&mut self) -> Option<SubjectUpdate<T>> {
        if self.failed || self.state() == SubscriptionState::Closed {
            return None;
        }
        let update = self.updates.try_recv().ok()?;
        self.failed = matches!(update, SubjectUpdate::Failed(_));
        Some(update)
    }

    /// End the viewing context. Idempotent; the transition happens once.
    pub fn close(&mut self) {
        if self.state() == SubscriptionState::Closed && self.unsubscribe.is_none() {
            return;
        }
        self.shared.transition(SubscriptionState::Closed);

        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe.call();
        }

        self.updates.close();
        let mut discarded = 0usize;
        while self.updates.try_recv().is_ok() {
            discarded += 1;
        }

        debug!(subject = %self.shared.subject, discarded, "Subscription closed");
    }
}

impl<T> Drop for LiveSubscription<T> {
    fn drop(&mut self) {
        self.close();
    }
}
