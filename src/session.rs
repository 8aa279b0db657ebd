use std::time::{Duration, Instant};

/// State of one search session, from show to hide.
///
/// Transitions:
/// - `show` on a hidden session clears the term, replaces any pinned module
///   with the requested one and starts the startup clock. On a visible
///   session it does nothing.
/// - `hide` marks the session hidden; the term and pin survive until the next
///   `show`.
/// - `mark_ready` reports the startup time once per process.
#[derive(Debug, Default)]
pub struct SessionState {
    visible: bool,
    has_shown: bool,
    measured: bool,
    started: Option<Instant>,
    term: String,
    pinned: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn has_shown(&self) -> bool {
        self.has_shown
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Module every query is restricted to, if any.
    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Returns false when the session was already visible.
    pub fn show(&mut self, pin: Option<String>) -> bool {
        if self.visible {
            return false;
        }
        self.visible = true;
        self.has_shown = true;
        self.started = Some(Instant::now());
        self.term.clear();
        self.pinned = pin;
        true
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn begin_query(&mut self, term: &str) {
        self.term.clear();
        self.term.push_str(term);
    }

    pub fn pin(&mut self, module: impl Into<String>) {
        self.pinned = Some(module.into());
    }

    /// Time since the first show, reported only the first time the UI is ready.
    pub fn mark_ready(&mut self) -> Option<Duration> {
        if self.measured {
            return None;
        }
        let started = self.started?;
        self.measured = true;
        Some(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_is_idempotent_while_visible() {
        let mut session = SessionState::new();
        assert!(session.show(None));
        session.begin_query("fire");
        session.pin("finder");

        assert!(!session.show(None));
        assert_eq!(session.term(), "fire");
        assert_eq!(session.pinned(), Some("finder"));
    }

    #[test]
    fn reshow_clears_term_and_pin() {
        let mut session = SessionState::new();
        session.show(None);
        session.begin_query("fire");
        session.pin("finder");
        session.hide();

        assert!(session.show(None));
        assert_eq!(session.term(), "");
        assert_eq!(session.pinned(), None);

        session.hide();
        session.show(Some("websearch".into()));
        assert_eq!(session.pinned(), Some("websearch"));
    }

    #[test]
    fn startup_is_measured_once() {
        let mut session = SessionState::new();
        assert!(session.mark_ready().is_none());
        session.show(None);
        assert!(session.mark_ready().is_some());
        session.hide();
        session.show(None);
        assert!(session.mark_ready().is_none());
    }
}
