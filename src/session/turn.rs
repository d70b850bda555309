//! One request/reply turn.
//!
//! ```text
//! append user entry → show placeholder → send → remove placeholder
//!   ├─ Ok(reply) → append reply → speak(reply)
//!   └─ Err(e)    → append "エラー: {e}"
//! ```
//!
//! Typed and voice turns share this sequence.

use std::sync::Mutex;

use crate::exchange::{ExchangeClient, ExchangeError};
use crate::speech::SpeechOutput;
use crate::transcript::{Presenter, Role};

use super::input::Utterance;

/// Prefix of the transcript entry written for a failed turn.
pub const ERROR_PREFIX: &str = "エラー: ";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied(String),
    Failed(ExchangeError),
}

/// Removes the typing placeholder exactly once: explicitly via
/// [`TypingGuard::remove`], or on drop if the turn is abandoned.
struct TypingGuard<'a> {
    presenter: &'a dyn Presenter,
    shown: bool,
}

impl<'a> TypingGuard<'a> {
    fn show(presenter: &'a dyn Presenter) -> Self {
        presenter.show_typing_placeholder();
        Self {
            presenter,
            shown: true,
        }
    }

    fn remove(mut self) {
        self.dismiss();
    }

    fn dismiss(&mut self) {
        if std::mem::take(&mut self.shown) {
            self.presenter.remove_typing_placeholder();
        }
    }
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.dismiss();
    }
}

/// Drive one turn for `utterance`.
pub async fn run_turn(
    exchange: &dyn ExchangeClient,
    presenter: &dyn Presenter,
    speech: &Mutex<SpeechOutput>,
    utterance: &Utterance,
) -> TurnOutcome {
    log::debug!("turn: {:?} utterance", utterance.source());
    presenter.append_message(Role::User, utterance.text());

    let typing = TypingGuard::show(presenter);
    let result = exchange.send(utterance.text()).await;
    typing.remove();

    match result {
        Ok(reply) => {
            presenter.append_message(Role::Assistant, &reply);
            speech
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .speak(&reply);
            TurnOutcome::Replied(reply)
        }
        Err(e) => {
            log::warn!("turn: exchange failed: {e}");
            presenter.append_message(Role::Assistant, &format!("{ERROR_PREFIX}{e}"));
            TurnOutcome::Failed(e)
        }
    }
}
