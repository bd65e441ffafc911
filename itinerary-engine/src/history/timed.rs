//! Undo windows: changes that apply immediately but stay revocable for a
//! short time.
//!
//! Each scheduled change yields an [`UndoToken`] and an
//! [`UndoEvent::Opened`] on the broadcast channel. Whoever shows the
//! "undo?" prompt subscribes to the channel and calls
//! [`UndoWindows::cancel`] with the token. Elapsed windows are committed
//! by [`UndoWindows::commit_expired`], which also runs whenever a new window
//! is scheduled.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

use super::Snapshotting;

/// Default length of an undo window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 64;

/// Handle for one open undo window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UndoToken(u64);

impl fmt::Display for UndoToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "undo-{}", self.0)
    }
}

/// Lifecycle notifications for undo windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEvent {
    Opened {
        token: UndoToken,
        label: String,
        expires_at: Instant,
    },
    /// The change was taken back.
    Reverted { token: UndoToken, label: String },
    /// The window closed; the change is permanent.
    Committed { token: UndoToken, label: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UndoError {
    #[error("no open undo window for {0}")]
    UnknownToken(UndoToken),

    #[error("undo window {0} has elapsed")]
    WindowElapsed(UndoToken),

    /// The target diverged after the scheduled change
    #[error("undo window {0} was superseded by a later change")]
    Superseded(UndoToken),
}

struct Pending<S> {
    label: String,
    prev: S,
    next: S,
    expires_at: Instant,
}

/// Open undo windows over snapshots of type `S`.
pub struct UndoWindows<S> {
    window: Duration,
    pending: BTreeMap<UndoToken, Pending<S>>,
    next_token: u64,
    events: broadcast::Sender<UndoEvent>,
}

impl<S> fmt::Debug for UndoWindows<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndoWindows")
            .field("window", &self.window)
            .field("open", &self.pending.len())
            .finish()
    }
}

impl<S: Clone + PartialEq> Default for UndoWindows<S> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl<S: Clone + PartialEq> UndoWindows<S> {
    pub fn new(window: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            window,
            pending: BTreeMap::new(),
            next_token: 0,
            events,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Receive lifecycle events for every window opened from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UndoEvent> {
        self.events.subscribe()
    }

    /// Apply `mutate` to `target` now and open an undo window for it.
    ///
    /// Elapsed windows are committed first. If `mutate` fails nothing is
    /// scheduled and its error is returned.
    pub fn schedule<T, R, E>(
        &mut self,
        target: &mut T,
        label: impl Into<String>,
        mutate: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<(UndoToken, R), E>
    where
        T: Snapshotting<Snapshot = S>,
    {
        self.commit_expired();

        let prev = target.snapshot();
        let result = mutate(target)?;
        let next = target.snapshot();

        self.next_token += 1;
        let token = UndoToken(self.next_token);
        let label = label.into();
        let expires_at = Instant::now() + self.window;
        self.pending.insert(
            token,
            Pending {
                label: label.clone(),
                prev,
                next,
                expires_at,
            },
        );
        debug!(%token, %label, "undo window opened");
        self.emit(UndoEvent::Opened {
            token,
            label,
            expires_at,
        });
        Ok((token, result))
    }

    /// Take back a scheduled change if its window is still open.
    ///
    /// On success the target is restored to its state before the change and
    /// that state's snapshot-after (the one being discarded) is returned.
    pub fn cancel<T>(&mut self, token: UndoToken, target: &mut T) -> Result<S, UndoError>
    where
        T: Snapshotting<Snapshot = S>,
    {
        let pending = self
            .pending
            .remove(&token)
            .ok_or(UndoError::UnknownToken(token))?;

        if Instant::now() >= pending.expires_at {
            self.emit(UndoEvent::Committed {
                token,
                label: pending.label,
            });
            return Err(UndoError::WindowElapsed(token));
        }
        if T::diverged(&target.snapshot(), &pending.next) {
            debug!(%token, "undo window superseded");
            self.emit(UndoEvent::Committed {
                token,
                label: pending.label,
            });
            return Err(UndoError::Superseded(token));
        }

        target.restore(pending.prev);
        debug!(%token, label = %pending.label, "undo window reverted");
        self.emit(UndoEvent::Reverted {
            token,
            label: pending.label,
        });
        Ok(pending.next)
    }

    /// Close every elapsed window, returning their tokens.
    pub fn commit_expired(&mut self) -> Vec<UndoToken> {
        let now = Instant::now();
        let expired: Vec<UndoToken> = self
            .pending
            .iter()
            .filter(|(_, p)| p.expires_at <= now)
            .map(|(token, _)| *token)
            .collect();
        for token in &expired {
            if let Some(pending) = self.pending.remove(token) {
                self.emit(UndoEvent::Committed {
                    token: *token,
                    label: pending.label,
                });
            }
        }
        expired
    }

    pub fn is_open(&self, token: UndoToken) -> bool {
        self.pending
            .get(&token)
            .is_some_and(|p| Instant::now() < p.expires_at)
    }

    /// Earliest time an open window elapses, for callers that want to
    /// sleep until the next sweep.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.expires_at).min()
    }

    pub fn open_count(&self) -> usize {
        self.pending.len()
    }

    fn emit(&self, event: UndoEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
