//! Transcript model and the presentation interface the session writes to.
//!
//! [`Presenter`] is the only way the core touches the screen.  The desktop
//! window renders a [`SharedTranscript`], which implements it on top of an
//! `Arc<Mutex<Transcript>>` read by egui every frame.

use std::sync::{Arc, Mutex, MutexGuard};

// ---------------------------------------------------------------------------
// Role / TranscriptEntry
// ---------------------------------------------------------------------------

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One rendered line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

/// Presentation collaborator driven by the session orchestrator.
///
/// Implementations must be `Send + Sync`: turns run as tokio tasks and call
/// into the presenter from worker threads.
pub trait Presenter: Send + Sync {
    /// Append a finished entry to the end of the transcript.
    fn append_message(&self, role: Role, text: &str);
    /// Show the "assistant is typing" placeholder.
    fn show_typing_placeholder(&self);
    /// Remove one previously shown placeholder.
    fn remove_typing_placeholder(&self);
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Append-only list of entries plus the typing placeholder.
///
/// The placeholder is not an entry: it is rendered after the last entry
/// while at least one turn is pending, so there is never more than one on
/// screen even when turns overlap.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    pending: usize,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// `true` while the typing placeholder should be drawn.
    pub fn is_typing(&self) -> bool {
        self.pending > 0
    }

    fn push(&mut self, role: Role, text: &str) {
        self.entries.push(TranscriptEntry {
            role,
            text: text.to_string(),
        });
    }
}

/// Thread-safe handle to a [`Transcript`].  Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SharedTranscript(Arc<Mutex<Transcript>>);

impl SharedTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the transcript for reading.  Do not hold the guard across
    /// `.await` points.
    pub fn lock(&self) -> MutexGuard<'_, Transcript> {
        // A poisoned transcript is still a valid list of strings.
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Presenter for SharedTranscript {
    fn append_message(&self, role: Role, text: &str) {
        self.lock().push(role, text);
    }

    fn show_typing_placeholder(&self) {
        self.lock().pending += 1;
    }

    fn remove_typing_placeholder(&self) {
        let mut transcript = self.lock();
        transcript.pending = transcript.pending.saturating_sub(1);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_submission_order() {
        let transcript = SharedTranscript::new();
        transcript.append_message(Role::User, "こんにちは");
        transcript.append_message(Role::Assistant, "hi");

        let t = transcript.lock();
        assert_eq!(t.entries().len(), 2);
        assert_eq!(t.entries()[0].role, Role::User);
        assert_eq!(t.entries()[1].text, "hi");
    }

    #[test]
    fn placeholder_is_not_an_entry() {
        let transcript = SharedTranscript::new();
        transcript.show_typing_placeholder();

        let t = transcript.lock();
        assert!(t.is_typing());
        assert!(t.entries().is_empty());
    }

    #[test]
    fn overlapping_turns_share_one_placeholder() {
        let transcript = SharedTranscript::new();
        transcript.show_typing_placeholder();
        transcript.show_typing_placeholder();
        transcript.remove_typing_placeholder();
        assert!(transcript.lock().is_typing());

        transcript.remove_typing_placeholder();
        assert!(!transcript.lock().is_typing());
    }

    #[test]
    fn removing_without_placeholder_is_harmless() {
        let transcript = SharedTranscript::new();
        transcript.remove_typing_placeholder();
        assert!(!transcript.lock().is_typing());
    }

    #[test]
    fn shared_transcript_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedTranscript>();
    }
}
