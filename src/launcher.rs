use std::sync::Arc;
use crate::activation::{Activator, Outcome, Trigger};
use crate::config::Config;
use crate::executor::Executor;
use crate::list::{ResultList, Surface};
use crate::orchestrator::{Dispatch, Orchestrator, Reply, ReplySink};
use crate::registry::Registry;
use crate::session::SessionState;

/// Everything the UI thread owns for one launcher window.
///
/// Frontends forward input, module replies and gestures here and implement
/// [`Surface`] to receive the resulting display state.
pub struct Launcher<E> {
    orchestrator: Orchestrator,
    list: ResultList,
    activator: Activator<E>,
    session: SessionState,
}

impl<E: Executor> Launcher<E> {
    pub fn new(config: &Config, registry: Arc<Registry>, executor: E) -> Self {
        Self {
            orchestrator: Orchestrator::new(registry, config.search.max_results),
            list: ResultList::new(config.activation.effective_keys(), config.list.always_show),
            activator: Activator::new(executor, config.general.keep_open),
            session: SessionState::new(),
        }
    }

    pub fn list(&self) -> &ResultList {
        &self.list
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn activator(&self) -> &Activator<E> {
        &self.activator
    }

    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    /// Shows the window, optionally pinned to one module. No-op while visible.
    pub fn show(&mut self, pin: Option<String>, surface: &mut dyn Surface) -> bool {
        if !self.session.show(pin) {
            return false;
        }
        self.orchestrator.cancel();
        self.list.clear(surface);
        surface.set_busy(false);
        true
    }

    pub fn hide(&mut self, surface: &mut dyn Surface) {
        self.orchestrator.cancel();
        self.session.hide();
        self.list.set_quick_mode(false, surface);
        surface.set_busy(false);
    }

    /// First focus after a show; logs how long startup took, once.
    pub fn ready(&mut self) {
        if let Some(elapsed) = self.session.mark_ready() {
            log::info!("startup time: {:?}", elapsed);
        }
    }

    /// The search text changed.
    pub fn input<S: ReplySink>(&mut self, term: &str, sink: &S, surface: &mut dyn Surface) -> Dispatch {
        self.session.begin_query(term);
        let dispatch = self.orchestrator.dispatch(term, self.session.pinned(), sink);
        match &dispatch {
            Dispatch::Ready(entries) => {
                self.list.replace(entries.clone(), surface);
                surface.set_busy(false);
            }
            Dispatch::Pending { .. } => surface.set_busy(true),
        }
        dispatch
    }

    /// A module replied. Returns true if the displayed list changed.
    pub fn reply(&mut self, reply: Reply, surface: &mut dyn Surface) -> bool {
        let Some(entries) = self.orchestrator.accept(reply) else {
            return false;
        };
        self.list.replace(entries, surface);
        surface.set_busy(false);
        true
    }

    pub fn hover(&mut self, index: usize, surface: &mut dyn Surface) {
        self.list.hover(index, surface);
    }

    pub fn move_selection(&mut self, delta: i32, surface: &mut dyn Surface) {
        self.list.move_selection(delta, surface);
    }

    pub fn set_quick_mode(&mut self, enabled: bool, surface: &mut dyn Surface) {
        self.list.set_quick_mode(enabled, surface);
    }

    pub fn press_started(&mut self) {
        self.activator.press_started();
    }

    /// Runs a gesture and applies its lifecycle decision.
    ///
    /// `Close` hides the session. `Pinned` clears the term so the next input
    /// starts fresh inside the pinned module.
    pub fn trigger<S: ReplySink>(&mut self, trigger: Trigger, sink: &S, surface: &mut dyn Surface) -> Outcome {
        let outcome = self.activator.handle(trigger, &self.list, &mut self.session);
        match &outcome {
            Outcome::Close => self.hide(surface),
            Outcome::Pinned(_) => {
                self.input("", sink, surface);
            }
            Outcome::StayOpen | Outcome::Ignored => {}
        }
        outcome
    }
}
