//! Age prompt presentation
//!
//! The gate never draws anything itself. A presenter shows the question on
//! whatever thread owns the UI and reports back. Two shapes are supported:
//! implement [`AgePromptPresenter`] directly with an async body, or wrap a
//! delegate-style platform callback in [`CallbackPresenter`].

use crate::error::{Result, ShelfError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// What the platform needs to render the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePrompt {
    /// Identifies this presentation episode
    pub prompt_id: u64,
    /// Age threshold to ask about
    pub minimum_age: u8,
}

/// Shows the age question and reports the answer
#[async_trait]
pub trait AgePromptPresenter: Send + Sync {
    /// Show the prompt and wait for the user
    ///
    /// `Ok(true)` means the user is at or above `prompt.minimum_age`,
    /// `Ok(false)` means below. `Err` means no answer could be obtained
    /// (nothing to present on, dismissed without a choice).
    async fn present_age_prompt(&self, prompt: &AgePrompt) -> Result<bool>;
}

/// One-shot handle the platform uses to answer a prompt
///
/// Dropping it without calling [`answer`](Self::answer) or
/// [`fail`](Self::fail) reports a presentation failure.
#[derive(Debug)]
pub struct PromptResponder {
    tx: oneshot::Sender<Result<bool>>,
}

impl PromptResponder {
    /// Report the user's choice
    pub fn answer(self, above_threshold: bool) {
        // Receiver gone means the gate shut down; nobody is left to tell.
        let _ = self.tx.send(Ok(above_threshold));
    }

    /// Report that the prompt could not be shown or answered
    pub fn fail<S: Into<String>>(self, reason: S) {
        let _ = self.tx.send(Err(ShelfError::prompt_failed(reason)));
    }
}

type PresentFn = dyn Fn(AgePrompt, PromptResponder) + Send + Sync;

/// Presenter backed by a platform callback
///
/// The callback must return quickly; it hands the responder to the UI
/// thread, which answers whenever the user taps a button.
pub struct CallbackPresenter {
    present: Box<PresentFn>,
}

impl CallbackPresenter {
    pub fn new<F>(present: F) -> Self
    where
        F: Fn(AgePrompt, PromptResponder) + Send + Sync + 'static,
    {
        Self {
            present: Box::new(present),
        }
    }
}

impl std::fmt::Debug for CallbackPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackPresenter").finish_non_exhaustive()
    }
}

#[async_trait]
impl AgePromptPresenter for CallbackPresenter {
    async fn present_age_prompt(&self, prompt: &AgePrompt) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        (self.present)(*prompt, PromptResponder { tx });

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ShelfError::prompt_failed(
                "prompt dismissed without an answer",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: AgePrompt = AgePrompt {
        prompt_id: 1,
        minimum_age: 13,
    };

    #[tokio::test]
    async fn test_callback_answer() {
        let presenter = CallbackPresenter::new(|prompt, responder| {
            assert_eq!(prompt.minimum_age, 13);
            responder.answer(false);
        });
        assert!(!presenter.present_age_prompt(&PROMPT).await.unwrap());
    }

    #[tokio::test]
    async fn test_answer_from_another_task() {
        let presenter = CallbackPresenter::new(|_, responder| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                responder.answer(true);
            });
        });
        assert!(presenter.present_age_prompt(&PROMPT).await.unwrap());
    }

    #[tokio::test]
    async fn test_dropped_responder_is_failure() {
        let presenter = CallbackPresenter::new(|_, responder| drop(responder));
        let err = presenter.present_age_prompt(&PROMPT).await.unwrap_err();
        assert!(matches!(err, ShelfError::PromptPresentationFailed(_)));
    }

    #[tokio::test]
    async fn test_explicit_failure() {
        let presenter = CallbackPresenter::new(|_, responder| responder.fail("no window"));
        let err = presenter.present_age_prompt(&PROMPT).await.unwrap_err();
        assert_eq!(err.to_string(), "Age prompt presentation failed: no window");
    }
}
