// ShelfReader - Library E-Reader Core for Mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Age gate worker
//!
//! # Serialization
//! Every request goes through one unbounded channel into a single worker
//! task that owns [`GateState`]. Reading "is a prompt showing" and deciding
//! to queue or present happen while handling one message, so two callers can
//! never both start a prompt.
//!
//! # Prompt lifecycle
//! - `Idle -> Presenting`: first request that needs an answer
//! - `Presenting -> Idle`: presenter answered, failed, or its task panicked
//!
//! The presenter runs on its own task and reports back with a
//! `Resolved` message. That task holds a sender, so the worker outlives
//! every [`AgeGate`] handle until the in-flight prompt is answered.

use super::presenter::{AgePrompt, AgePromptPresenter};
use super::store::AccountStore;
use super::AgeDecision;
use crate::config::AgeGateConfig;
use crate::error::{Result, ShelfError};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Caller callback receiving "permitted"
pub type VerifyCallback = Box<dyn FnOnce(bool) + Send + 'static>;

enum GateMessage {
    Verify(VerifyCallback),
    Resolved {
        prompt_id: u64,
        outcome: Result<bool>,
    },
    Status(oneshot::Sender<GateStatus>),
}

/// Snapshot of the gate for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    /// A prompt is currently showing
    pub presenting: bool,
    /// Callers waiting on that prompt, including the one that triggered it
    pub pending: usize,
}

/// The prompt currently showing
#[derive(Debug)]
struct Episode {
    prompt_id: u64,
    account_id: String,
}

#[derive(Default)]
struct GateState {
    presenting: Option<Episode>,
    pending: Vec<VerifyCallback>,
}

enum Evaluation {
    Immediate(bool),
    NeedsAnswer(String),
}

/// Handle to the age gate
///
/// Cheap to clone; every clone talks to the same worker.
#[derive(Clone, Debug)]
pub struct AgeGate {
    tx: mpsc::UnboundedSender<GateMessage>,
}

impl std::fmt::Debug for GateMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateMessage::Verify(_) => f.write_str("Verify"),
            GateMessage::Resolved { prompt_id, .. } => {
                write!(f, "Resolved({})", prompt_id)
            }
            GateMessage::Status(_) => f.write_str("Status"),
        }
    }
}

impl AgeGate {
    /// Start the gate worker on the current tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new(
        store: Arc<dyn AccountStore>,
        presenter: Arc<dyn AgePromptPresenter>,
        config: AgeGateConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = GateWorker {
            store,
            presenter,
            config,
            tx: tx.downgrade(),
            state: GateState::default(),
            next_prompt_id: 0,
        };
        tokio::spawn(worker.run(rx));

        Self { tx }
    }

    /// Decide whether the current account may see age-restricted content
    ///
    /// Never blocks. `callback` runs exactly once, on the gate worker, either
    /// right away or when the prompt showing for this decision resolves.
    pub fn verify_age_requirement<F>(&self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if let Err(err) = self.tx.send(GateMessage::Verify(Box::new(callback))) {
            warn!("age gate worker stopped, denying");
            if let GateMessage::Verify(callback) = err.0 {
                invoke(callback, false);
            }
        }
    }

    /// Async form of [`verify_age_requirement`](Self::verify_age_requirement)
    pub async fn check(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        self.verify_age_requirement(move |permitted| {
            let _ = tx.send(permitted);
        });
        rx.await.unwrap_or(false)
    }

    /// Current presenting flag and queue length
    pub async fn status(&self) -> Result<GateStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(GateMessage::Status(tx))
            .map_err(|_| ShelfError::GateUnavailable)?;
        rx.await.map_err(|_| ShelfError::GateUnavailable)
    }
}

struct GateWorker {
    store: Arc<dyn AccountStore>,
    presenter: Arc<dyn AgePromptPresenter>,
    config: AgeGateConfig,
    tx: mpsc::WeakUnboundedSender<GateMessage>,
    state: GateState,
    next_prompt_id: u64,
}

impl GateWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<GateMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                GateMessage::Verify(callback) => self.verify(callback).await,
                GateMessage::Resolved { prompt_id, outcome } => {
                    self.resolve(prompt_id, outcome).await
                }
                GateMessage::Status(reply) => {
                    let _ = reply.send(GateStatus {
                        presenting: self.state.presenting.is_some(),
                        pending: self.state.pending.len(),
                    });
                }
            }
        }

        // Only reachable with nothing in flight, since the presenter task
        // keeps the channel open.
        for callback in self.state.pending.drain(..) {
            invoke(callback, false);
        }
        debug!("age gate worker stopped");
    }

    async fn verify(&mut self, callback: VerifyCallback) {
        let account_id = match evaluate(self.store.as_ref()).await {
            Evaluation::Immediate(permitted) => {
                invoke(callback, permitted);
                return;
            }
            Evaluation::NeedsAnswer(account_id) => account_id,
        };

        self.state.pending.push(callback);
        if self.state.presenting.is_some() {
            debug!(pending = self.state.pending.len(), "age prompt already showing, queued");
            return;
        }

        self.start_prompt(account_id).await;
    }

    async fn start_prompt(&mut self, account_id: String) {
        self.next_prompt_id += 1;
        let prompt = AgePrompt {
            prompt_id: self.next_prompt_id,
            minimum_age: self.config.minimum_age,
        };
        self.state.presenting = Some(Episode {
            prompt_id: prompt.prompt_id,
            account_id,
        });

        let Some(tx) = self.tx.upgrade() else {
            // Every handle is gone; nobody could deliver the answer.
            self.resolve(prompt.prompt_id, Err(ShelfError::GateUnavailable))
                .await;
            return;
        };

        info!(prompt_id = prompt.prompt_id, minimum_age = prompt.minimum_age, "presenting age prompt");

        let presenter = Arc::clone(&self.presenter);
        tokio::spawn(async move {
            let shown =
                tokio::spawn(async move { presenter.present_age_prompt(&prompt).await });
            let outcome = match shown.await {
                Ok(outcome) => outcome,
                Err(e) => Err(ShelfError::prompt_failed(format!(
                    "presenter task ended: {}",
                    e
                ))),
            };
            let _ = tx.send(GateMessage::Resolved {
                prompt_id: prompt.prompt_id,
                outcome,
            });
        });
    }

    async fn resolve(&mut self, prompt_id: u64, outcome: Result<bool>) {
        let episode = match self.state.presenting.take() {
            Some(episode) if episode.prompt_id == prompt_id => episode,
            other => {
                warn!(prompt_id, "ignoring resolution for a prompt that is not showing");
                self.state.presenting = other;
                return;
            }
        };

        let permitted = match outcome {
            Ok(above_threshold) => {
                info!(
                    account_id = %episode.account_id,
                    above_threshold,
                    "age prompt answered"
                );
                persist(
                    self.store.as_ref(),
                    &episode.account_id,
                    AgeDecision::from_answer(above_threshold),
                    true,
                )
                .await;
                above_threshold
            }
            Err(e) => {
                warn!(
                    account_id = %episode.account_id,
                    error = %e,
                    "age prompt failed, will ask again next time"
                );
                persist(self.store.as_ref(), &episode.account_id, AgeDecision::Denied, false)
                    .await;
                false
            }
        };

        let waiting = std::mem::take(&mut self.state.pending);
        debug!(callers = waiting.len(), permitted, "releasing age gate callers");
        for callback in waiting {
            invoke(callback, permitted);
        }
    }
}

async fn evaluate(store: &dyn AccountStore) -> Evaluation {
    let account_id = match store.current_account_id().await {
        Ok(Some(id)) => id,
        Ok(None) => {
            debug!("no active account, denying");
            return Evaluation::Immediate(false);
        }
        Err(e) => {
            warn!(error = %e, "could not resolve active account, denying");
            return Evaluation::Immediate(false);
        }
    };

    match evaluate_account(store, &account_id).await {
        Ok(evaluation) => evaluation,
        Err(e) => {
            warn!(account_id = %account_id, error = %e, "could not read age state, denying");
            Evaluation::Immediate(false)
        }
    }
}

async fn evaluate_account(store: &dyn AccountStore, account_id: &str) -> Result<Evaluation> {
    if !store.requires_age_gate(account_id).await? {
        return Ok(Evaluation::Immediate(true));
    }
    if store.age_decision(account_id).await?.permits() {
        return Ok(Evaluation::Immediate(true));
    }
    if store.prompted(account_id).await? {
        return Ok(Evaluation::Immediate(false));
    }
    Ok(Evaluation::NeedsAnswer(account_id.to_string()))
}

async fn persist(store: &dyn AccountStore, account_id: &str, decision: AgeDecision, prompted: bool) {
    // Nothing stored means the next request asks again.
    if let Err(e) = store.set_age_state(account_id, decision, prompted).await {
        warn!(account_id, ?decision, prompted, error = %e, "failed to store age state");
    }
}

fn invoke(callback: VerifyCallback, permitted: bool) {
    if panic::catch_unwind(AssertUnwindSafe(|| callback(permitted))).is_err() {
        warn!("age gate callback panicked");
    }
}
