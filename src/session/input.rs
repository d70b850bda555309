//! Utterances entering a turn.

/// Where an utterance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Typed,
    Voice,
}

/// Text the user wants the assistant to answer.  Never blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    text: String,
    source: InputSource,
}

impl Utterance {
    /// Trim `text`; `None` when nothing is left.
    ///
    /// ```
    /// use kani_assistant::session::{InputSource, Utterance};
    ///
    /// assert!(Utterance::new("   ", InputSource::Typed).is_none());
    /// let u = Utterance::new(" 天気は？\n", InputSource::Voice).unwrap();
    /// assert_eq!(u.text(), "天気は？");
    /// ```
    pub fn new(text: &str, source: InputSource) -> Option<Self> {
        let text = text.trim();
        (!text.is_empty()).then(|| Self {
            text: text.to_string(),
            source,
        })
    }

    pub fn typed(text: &str) -> Option<Self> {
        Self::new(text, InputSource::Typed)
    }

    pub fn voice(text: &str) -> Option<Self> {
        Self::new(text, InputSource::Voice)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> InputSource {
        self.source
    }
}
