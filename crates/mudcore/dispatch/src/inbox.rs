//! Per-session input queue
//!
//! A session's lines must run one at a time and in arrival order, since a
//! command may push or pop sets the next line depends on. Each
//! [`ActorInbox`] owns one worker task draining an mpsc queue; different
//! sessions' inboxes run concurrently and take turns on the shared world.

use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::error::{DispatchError, DispatchResult};
use crate::world::World;
use mudcore_types::SessionId;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Reply = oneshot::Sender<DispatchResult<DispatchOutcome>>;

struct Request {
    input: String,
    reply: Option<Reply>,
}

/// Serialized input processing for one session
pub struct ActorInbox {
    session: SessionId,
    sender: mpsc::Sender<Request>,
    worker: JoinHandle<()>,
}

impl ActorInbox {
    /// Start the worker for `session`; `capacity` bounds queued lines
    pub fn spawn(
        session: SessionId,
        dispatcher: Arc<CommandDispatcher>,
        world: Arc<Mutex<World>>,
        capacity: usize,
    ) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Request>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let outcome = {
                    let mut world = world.lock().await;
                    dispatcher
                        .dispatch(&mut world, session, &request.input)
                        .await
                };
                if let Err(err) = &outcome {
                    warn!(%session, input = %request.input, error = %err, "Dispatch failed");
                }
                if let Some(reply) = request.reply {
                    // the submitter may have stopped waiting
                    let _ = reply.send(outcome);
                }
            }
            debug!(%session, "Inbox worker stopped");
        });
        Self {
            session,
            sender,
            worker,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Queue a line without waiting for it to run
    pub async fn submit(&self, input: impl Into<String>) -> DispatchResult<()> {
        self.send(input.into(), None).await
    }

    /// Queue a line and wait for its outcome
    pub async fn dispatch(&self, input: impl Into<String>) -> DispatchResult<DispatchOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.send(input.into(), Some(reply)).await?;
        outcome
            .await
            .map_err(|_| DispatchError::InboxClosed(self.session))?
    }

    /// Stop accepting lines and wait for the queued ones to finish
    pub async fn shutdown(self) {
        let Self {
            session,
            sender,
            worker,
        } = self;
        drop(sender);
        if let Err(err) = worker.await {
            warn!(%session, error = %err, "Inbox worker ended abnormally");
        }
    }

    async fn send(&self, input: String, reply: Option<Reply>) -> DispatchResult<()> {
        self.sender
            .send(Request { input, reply })
            .await
            .map_err(|_| DispatchError::InboxClosed(self.session))
    }
}

impl std::fmt::Debug for ActorInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorInbox")
            .field("session", &self.session)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
