//! Turning a gesture on the list into an action and a window decision.

use url::Url;
use crate::executor::Executor;
use crate::list::ResultList;
use crate::model::Entry;
use crate::modules::switcher;
use crate::session::SessionState;

pub const URI_LIST_MIME: &str = "text/uri-list";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Activate key on the current selection.
    Activate { keep_open: bool },
    /// Quick-activation key; targets its row without moving the selection.
    QuickKey(String),
    /// Primary click on a row.
    Click { index: usize, keep_open: bool },
    /// A drag started on a row.
    DragBegin { index: usize },
    DragEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The action ran; hide the window.
    Close,
    /// Keep the window as it is.
    StayOpen,
    /// A module was picked from the switcher; queries now go to it alone.
    Pinned(String),
    /// The trigger had no target.
    Ignored,
}

/// Payload offered to drop targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragPayload {
    pub mime: &'static str,
    pub data: String,
}

/// Single-file `text/uri-list` payload for a draggable entry.
pub fn drag_payload(entry: &Entry) -> Option<DragPayload> {
    if !entry.drag_drop {
        return None;
    }
    let path = entry.drag_drop_data.as_deref()?;
    let uri = Url::from_file_path(path).ok()?;
    Some(DragPayload {
        mime: URI_LIST_MIME,
        data: format!("{}\n", uri),
    })
}

pub struct Activator<E> {
    executor: E,
    keep_open: bool,
    dragging: bool,
}

impl<E: Executor> Activator<E> {
    pub fn new(executor: E, keep_open: bool) -> Self {
        Self {
            executor,
            keep_open,
            dragging: false,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// A new button press; a drag that never reported its end is over.
    pub fn press_started(&mut self) {
        if self.dragging {
            log::debug!("Dropping stale drag state");
            self.dragging = false;
        }
    }

    pub fn handle(&mut self, trigger: Trigger, list: &ResultList, session: &mut SessionState) -> Outcome {
        match trigger {
            Trigger::Activate { keep_open } => match list.selected() {
                Some(entry) => self.activate(entry, keep_open, session),
                None => Outcome::Ignored,
            },
            Trigger::QuickKey(key) => match list.quick_target(&key).and_then(|i| list.entry(i)) {
                Some(entry) => self.activate(entry, false, session),
                None => Outcome::Ignored,
            },
            Trigger::Click { index, keep_open } => {
                // The release that ends a drag is not a click.
                if self.dragging {
                    self.dragging = false;
                    return Outcome::StayOpen;
                }
                match list.entry(index) {
                    Some(entry) => self.activate(entry, keep_open, session),
                    None => Outcome::Ignored,
                }
            }
            Trigger::DragBegin { index } => match list.entry(index) {
                Some(entry) if entry.drag_drop => {
                    log::debug!("Drag started on '{}'", entry.label);
                    self.dragging = true;
                    Outcome::StayOpen
                }
                _ => Outcome::Ignored,
            },
            Trigger::DragEnd => {
                self.dragging = false;
                Outcome::StayOpen
            }
        }
    }

    fn activate(&mut self, entry: &Entry, keep_open: bool, session: &mut SessionState) -> Outcome {
        if switcher::is_switch(entry) {
            log::info!("Pinning module '{}'", entry.exec);
            session.pin(entry.exec.clone());
            return Outcome::Pinned(entry.exec.clone());
        }

        if let Some(pinned) = session.pinned() {
            log::debug!("Activated '{}' while pinned to '{}'", entry.label, pinned);
        }
        self.executor.execute(&entry.exec);

        if keep_open || self.keep_open {
            Outcome::StayOpen
        } else {
            Outcome::Close
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::list::tests::Recorder;
    use std::cell::RefCell;

    #[derive(Default)]
    pub(crate) struct Recording {
        pub launched: RefCell<Vec<String>>,
    }

    impl Executor for Recording {
        fn execute(&self, exec: &str) {
            self.launched.borrow_mut().push(exec.to_string());
        }
    }

    impl Executor for std::rc::Rc<Recording> {
        fn execute(&self, exec: &str) {
            self.as_ref().execute(exec);
        }
    }

    fn list_with(entries: Vec<Entry>) -> ResultList {
        let keys = ["j", "k"].iter().map(|k| k.to_string()).collect();
        let mut list = ResultList::new(keys, false);
        list.replace(entries, &mut Recorder::default());
        list
    }

    fn file_entry() -> Entry {
        Entry::new("report.pdf", "xdg-open /tmp/report.pdf", "finder").draggable("/tmp/report.pdf")
    }

    #[test]
    fn activate_runs_selection_and_closes() {
        let list = list_with(vec![Entry::new("Firefox", "firefox", "applications")]);
        let mut session = SessionState::new();
        let mut activator = Activator::new(Recording::default(), false);

        let outcome = activator.handle(Trigger::Activate { keep_open: false }, &list, &mut session);
        assert_eq!(outcome, Outcome::Close);
        assert_eq!(*activator.executor().launched.borrow(), ["firefox"]);
    }

    #[test]
    fn keep_open_from_trigger_or_config() {
        let list = list_with(vec![Entry::new("Firefox", "firefox", "applications")]);
        let mut session = SessionState::new();

        let mut activator = Activator::new(Recording::default(), false);
        assert_eq!(
            activator.handle(Trigger::Activate { keep_open: true }, &list, &mut session),
            Outcome::StayOpen
        );

        let mut activator = Activator::new(Recording::default(), true);
        assert_eq!(
            activator.handle(Trigger::Click { index: 0, keep_open: false }, &list, &mut session),
            Outcome::StayOpen
        );
        assert_eq!(activator.executor().launched.borrow().len(), 1);
    }

    #[test]
    fn quick_key_targets_its_row() {
        let list = list_with(vec![
            Entry::new("a", "run-a", "x"),
            Entry::new("b", "run-b", "x"),
        ]);
        let mut session = SessionState::new();
        let mut activator = Activator::new(Recording::default(), false);

        assert_eq!(activator.handle(Trigger::QuickKey("k".into()), &list, &mut session), Outcome::Close);
        assert_eq!(*activator.executor().launched.borrow(), ["run-b"]);
        assert_eq!(list.selected_index(), Some(0));

        assert_eq!(activator.handle(Trigger::QuickKey("z".into()), &list, &mut session), Outcome::Ignored);
    }

    #[test]
    fn drag_does_not_activate_or_close() {
        let list = list_with(vec![file_entry()]);
        let mut session = SessionState::new();
        let mut activator = Activator::new(Recording::default(), false);

        assert_eq!(activator.handle(Trigger::DragBegin { index: 0 }, &list, &mut session), Outcome::StayOpen);
        assert!(activator.is_dragging());
        assert_eq!(
            activator.handle(Trigger::Click { index: 0, keep_open: false }, &list, &mut session),
            Outcome::StayOpen
        );
        assert!(activator.executor().launched.borrow().is_empty());

        assert_eq!(
            activator.handle(Trigger::Click { index: 0, keep_open: false }, &list, &mut session),
            Outcome::Close
        );
    }

    #[test]
    fn lost_drag_end_does_not_swallow_next_click() {
        let list = list_with(vec![file_entry()]);
        let mut session = SessionState::new();
        let mut activator = Activator::new(Recording::default(), false);

        activator.handle(Trigger::DragBegin { index: 0 }, &list, &mut session);
        activator.press_started();
        assert!(!activator.is_dragging());
        assert_eq!(
            activator.handle(Trigger::Click { index: 0, keep_open: false }, &list, &mut session),
            Outcome::Close
        );
        assert_eq!(activator.executor().launched.borrow().len(), 1);
    }

    #[test]
    fn drag_needs_a_draggable_entry() {
        let list = list_with(vec![Entry::new("a", "a", "x")]);
        let mut activator = Activator::new(Recording::default(), false);
        let outcome = activator.handle(Trigger::DragBegin { index: 0 }, &list, &mut SessionState::new());
        assert_eq!(outcome, Outcome::Ignored);
        assert!(!activator.is_dragging());
    }

    #[test]
    fn switcher_entry_pins_module() {
        let list = list_with(vec![Entry::new("finder", "finder", switcher::NAME)]);
        let mut session = SessionState::new();
        let mut activator = Activator::new(Recording::default(), false);

        let outcome = activator.handle(Trigger::Activate { keep_open: false }, &list, &mut session);
        assert_eq!(outcome, Outcome::Pinned("finder".into()));
        assert_eq!(session.pinned(), Some("finder"));
        assert!(activator.executor().launched.borrow().is_empty());
    }

    #[test]
    fn payload_is_single_file_uri() {
        let payload = drag_payload(&Entry::new("x", "x", "finder").draggable("/tmp/my report.pdf")).unwrap();
        assert_eq!(payload.mime, "text/uri-list");
        assert_eq!(payload.data, "file:///tmp/my%20report.pdf\n");

        assert!(drag_payload(&Entry::new("x", "x", "apps")).is_none());
    }
}
