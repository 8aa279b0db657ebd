//! Fan-out of a query term to the eligible modules.
//!
//! Every dispatch opens a new generation. Module calls run on worker threads
//! and send a [`Reply`] tagged with the generation they were started for; the
//! UI thread feeds replies back through [`Orchestrator::accept`], which drops
//! anything that is not for the current generation and merges once the last
//! outstanding module has answered.

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use crate::model::Entry;
use crate::modules::{self, CancelToken};
use crate::registry::Registry;

/// Result of one module call for one generation.
#[derive(Debug)]
pub struct Reply {
    pub generation: u64,
    pub slot: usize,
    pub entries: Vec<Entry>,
}

/// Channel end worker threads hand their replies to.
pub trait ReplySink: Clone + Send + 'static {
    /// Returns false once the receiving side is gone.
    fn send_reply(&self, reply: Reply) -> bool;
}

impl ReplySink for mpsc::Sender<Reply> {
    fn send_reply(&self, reply: Reply) -> bool {
        self.send(reply).is_ok()
    }
}

impl ReplySink for calloop::channel::Sender<Reply> {
    fn send_reply(&self, reply: Reply) -> bool {
        self.send(reply).is_ok()
    }
}

/// What the caller should do right after a dispatch.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Nothing to wait for; display these entries now.
    Ready(Vec<Entry>),
    /// Replies are on their way for `generation`.
    Pending { generation: u64, modules: usize },
}

struct Round {
    generation: u64,
    slots: Vec<usize>,
    replies: Vec<Option<Vec<Entry>>>,
    outstanding: usize,
}

impl Round {
    /// Stores the reply for `slot`; true when it was the last one missing.
    fn fill(&mut self, slot: usize, entries: Vec<Entry>) -> bool {
        let Some(pos) = self.slots.iter().position(|s| *s == slot) else {
            log::warn!("Reply for undispatched slot {} in generation {}", slot, self.generation);
            return false;
        };
        if self.replies[pos].is_some() {
            return false;
        }
        self.replies[pos] = Some(entries);
        self.outstanding -= 1;
        self.outstanding == 0
    }

    fn into_batches(self) -> Vec<Vec<Entry>> {
        self.replies.into_iter().map(Option::unwrap_or_default).collect()
    }
}

pub struct Orchestrator {
    registry: Arc<Registry>,
    latest: Arc<AtomicU64>,
    round: Option<Round>,
    max_results: Option<usize>,
}

impl Orchestrator {
    pub fn new(registry: Arc<Registry>, max_results: Option<usize>) -> Self {
        Self {
            registry,
            latest: Arc::new(AtomicU64::new(0)),
            round: None,
            max_results,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// True while the current generation still waits on a module.
    pub fn is_busy(&self) -> bool {
        self.round.is_some()
    }

    /// Supersedes whatever is in flight without starting new work.
    pub fn cancel(&mut self) -> u64 {
        self.round = None;
        self.latest.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Starts a new generation for `term`.
    ///
    /// The previous generation is cancelled first. A pinned module gets the
    /// term with its prefix made optional. An empty term, or one no
    /// module accepts, resolves immediately to an empty list.
    pub fn dispatch<S: ReplySink>(&mut self, term: &str, pinned: Option<&str>, sink: &S) -> Dispatch {
        let generation = self.cancel();

        if term.is_empty() {
            log::debug!("Generation {}: empty term, nothing dispatched", generation);
            return Dispatch::Ready(Vec::new());
        }

        let slots = self.registry.eligible(term, pinned);
        if slots.is_empty() {
            log::debug!("Generation {}: no eligible module for '{}'", generation, term);
            return Dispatch::Ready(Vec::new());
        }

        self.round = Some(Round {
            generation,
            replies: vec![None; slots.len()],
            outstanding: slots.len(),
            slots: slots.clone(),
        });

        let mut settled = None;
        for &slot in &slots {
            let addressed = match (pinned, self.registry.get(slot)) {
                (Some(_), Some(module)) => modules::address(module.prefix(), term),
                _ => Cow::Borrowed(term),
            };
            if let Err(e) = self.spawn(generation, slot, &addressed, sink) {
                log::warn!("Could not start module in slot {}: {}", slot, e);
                settled = self.fill(generation, slot, Vec::new()).or(settled);
            }
        }
        // Only reachable when no worker could be started at all.
        if let Some(entries) = settled {
            return Dispatch::Ready(entries);
        }

        log::debug!("Generation {}: dispatched '{}' to {} modules", generation, term, slots.len());
        Dispatch::Pending { generation, modules: slots.len() }
    }

    fn spawn<S: ReplySink>(&self, generation: u64, slot: usize, term: &str, sink: &S) -> std::io::Result<()> {
        let registry = Arc::clone(&self.registry);
        let cancel = CancelToken::new(Arc::clone(&self.latest), generation);
        let term = term.to_string();
        let sink = sink.clone();
        let name = registry.get(slot).map(|m| m.name().to_string()).unwrap_or_default();

        thread::Builder::new()
            .name(format!("module-{}", name))
            .spawn(move || {
                let entries = run_module(&registry, slot, &cancel, &term);
                if !sink.send_reply(Reply { generation, slot, entries }) {
                    log::debug!("Reply channel closed, dropping '{}' results", name);
                }
            })?;
        Ok(())
    }

    fn fill(&mut self, generation: u64, slot: usize, entries: Vec<Entry>) -> Option<Vec<Entry>> {
        let round = self.round.as_mut().filter(|r| r.generation == generation)?;
        if !round.fill(slot, entries) {
            return None;
        }
        let round = self.round.take()?;
        Some(merge(round.into_batches(), self.max_results))
    }

    /// Takes one reply on the UI thread.
    ///
    /// Returns the merged list once every module of the current generation has
    /// replied. Replies from older generations are dropped.
    pub fn accept(&mut self, reply: Reply) -> Option<Vec<Entry>> {
        let current = self.round.as_ref().map(|r| r.generation);
        if current != Some(reply.generation) {
            log::debug!(
                "Dropping stale reply from slot {} (generation {}, current {})",
                reply.slot,
                reply.generation,
                self.generation()
            );
            return None;
        }
        self.fill(reply.generation, reply.slot, reply.entries)
    }
}

/// Calls one module, turning errors and panics into an empty list.
fn run_module(registry: &Registry, slot: usize, cancel: &CancelToken, term: &str) -> Vec<Entry> {
    let Some(module) = registry.get(slot) else {
        return Vec::new();
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| module.entries(cancel, term)));
    match outcome {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            log::warn!("Module '{}' failed: {}", module.name(), e);
            Vec::new()
        }
        Err(_) => {
            log::error!("Module '{}' panicked", module.name());
            Vec::new()
        }
    }
}

/// Combines per-module batches given in configured order.
///
/// Each batch keeps its own order; `Normal` entries come before
/// `AlwaysBottom` ones, and module order breaks ties inside each group.
/// `limit` truncates the merged list.
pub fn merge(batches: Vec<Vec<Entry>>, limit: Option<usize>) -> Vec<Entry> {
    let mut merged: Vec<Entry> = batches.into_iter().flatten().collect();
    merged.sort_by_key(|e| e.matching);
    if let Some(limit) = limit {
        merged.truncate(limit);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Matching;
    use crate::modules::{Module, ModuleError, ModuleResult};
    use crate::registry::tests::Fixed;
    use std::sync::{Barrier, Mutex};
    use std::time::Duration;

    fn entry(label: &str, matching: Matching) -> Entry {
        Entry::new(label, label, "test").with_matching(matching)
    }

    fn labels(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn merge_puts_bottom_entries_last_and_keeps_order() {
        let batches = vec![
            vec![entry("web-a", Matching::AlwaysBottom), entry("a1", Matching::Normal)],
            vec![entry("b1", Matching::Normal), entry("web-b", Matching::AlwaysBottom)],
            vec![entry("c1", Matching::Normal)],
        ];
        let merged = merge(batches.clone(), None);
        assert_eq!(labels(&merged), ["a1", "b1", "c1", "web-a", "web-b"]);
        assert_eq!(merge(batches, None), merged);
    }

    #[test]
    fn merge_truncates_after_ordering() {
        let batches = vec![
            vec![entry("web", Matching::AlwaysBottom)],
            vec![entry("a", Matching::Normal), entry("b", Matching::Normal)],
        ];
        assert_eq!(labels(&merge(batches, Some(2))), ["a", "b"]);
    }

    struct Failing;

    impl Module for Failing {
        fn name(&self) -> &str { "failing" }
        fn prefix(&self) -> &str { "" }
        fn switcher_exclusive(&self) -> bool { false }
        fn entries(&self, _: &CancelToken, _: &str) -> ModuleResult {
            Err(ModuleError::Other("boom".into()))
        }
    }

    struct Panicking;

    impl Module for Panicking {
        fn name(&self) -> &str { "panicking" }
        fn prefix(&self) -> &str { "" }
        fn switcher_exclusive(&self) -> bool { false }
        fn entries(&self, _: &CancelToken, _: &str) -> ModuleResult {
            panic!("module bug")
        }
    }

    fn orchestrator(modules: Vec<Box<dyn Module>>) -> Orchestrator {
        Orchestrator::new(Arc::new(Registry::new(modules, 2)), None)
    }

    fn drain(orch: &mut Orchestrator, rx: &mpsc::Receiver<Reply>, count: usize) -> Option<Vec<Entry>> {
        let mut merged = None;
        for _ in 0..count {
            let reply = rx.recv_timeout(Duration::from_secs(5)).expect("reply");
            if let Some(entries) = orch.accept(reply) {
                merged = Some(entries);
            }
        }
        merged
    }

    #[test]
    fn empty_term_dispatches_nothing() {
        let mut orch = orchestrator(vec![Box::new(Fixed::new("apps", "", &["a"]))]);
        let (tx, rx) = mpsc::channel();
        assert_eq!(orch.dispatch("", None, &tx), Dispatch::Ready(Vec::new()));
        assert!(!orch.is_busy());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn failures_are_isolated() {
        let mut orch = orchestrator(vec![
            Box::new(Failing),
            Box::new(Fixed::new("apps", "", &["a", "b"])),
            Box::new(Panicking),
        ]);
        let (tx, rx) = mpsc::channel();

        let Dispatch::Pending { modules, .. } = orch.dispatch("x", None, &tx) else {
            panic!("expected pending dispatch");
        };
        assert_eq!(modules, 3);

        let merged = drain(&mut orch, &rx, 3).expect("merged");
        assert_eq!(labels(&merged), ["a", "b"]);
        assert!(!orch.is_busy());
    }

    /// Blocks until released, then reports whether it saw cancellation.
    struct Gate {
        barrier: Arc<Barrier>,
        saw_cancel: Arc<Mutex<Option<bool>>>,
    }

    impl Module for Gate {
        fn name(&self) -> &str { "gate" }
        fn prefix(&self) -> &str { "" }
        fn switcher_exclusive(&self) -> bool { false }
        fn entries(&self, cancel: &CancelToken, term: &str) -> ModuleResult {
            if term == "slow" {
                self.barrier.wait();
                *self.saw_cancel.lock().unwrap() = Some(cancel.is_cancelled());
            }
            Ok(vec![Entry::new(term, term, "gate")])
        }
    }

    #[test]
    fn stale_generation_never_overwrites_newer_one() {
        let barrier = Arc::new(Barrier::new(2));
        let saw_cancel = Arc::new(Mutex::new(None));
        let mut orch = orchestrator(vec![Box::new(Gate {
            barrier: Arc::clone(&barrier),
            saw_cancel: Arc::clone(&saw_cancel),
        })]);
        let (tx, rx) = mpsc::channel();

        let Dispatch::Pending { generation: first, .. } = orch.dispatch("slow", None, &tx) else {
            panic!("expected pending dispatch");
        };
        let Dispatch::Pending { generation: second, .. } = orch.dispatch("fast", None, &tx) else {
            panic!("expected pending dispatch");
        };
        assert!(second > first);

        let fast = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(fast.generation, second);
        let merged = orch.accept(fast).expect("current generation merges");
        assert_eq!(labels(&merged), ["fast"]);

        barrier.wait();
        let slow = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(slow.generation, first);
        assert!(orch.accept(slow).is_none());
        assert_eq!(*saw_cancel.lock().unwrap(), Some(true));
    }

    #[test]
    fn duplicate_or_foreign_replies_are_ignored() {
        let mut orch = orchestrator(vec![
            Box::new(Fixed::new("a", "", &["a"])),
            Box::new(Fixed::new("b", "", &["b"])),
        ]);
        let (tx, rx) = mpsc::channel();
        let Dispatch::Pending { generation, .. } = orch.dispatch("x", None, &tx) else {
            panic!("expected pending dispatch");
        };
        let _ = drain(&mut orch, &rx, 2);

        let late = Reply { generation, slot: 0, entries: vec![Entry::new("dup", "dup", "a")] };
        assert!(orch.accept(late).is_none());
    }

    /// Prefixed module echoing the term it was handed.
    struct Echo;

    impl Module for Echo {
        fn name(&self) -> &str { "echo" }
        fn prefix(&self) -> &str { "?" }
        fn switcher_exclusive(&self) -> bool { false }
        fn entries(&self, _: &CancelToken, term: &str) -> ModuleResult {
            Ok(vec![Entry::new(term, term, "echo")])
        }
    }

    #[test]
    fn pinned_module_does_not_need_its_prefix() {
        let mut orch = orchestrator(vec![Box::new(Echo)]);
        let (tx, rx) = mpsc::channel();

        assert_eq!(orch.dispatch("cats", None, &tx), Dispatch::Ready(Vec::new()));

        orch.dispatch("cats", Some("echo"), &tx);
        assert_eq!(labels(&drain(&mut orch, &rx, 1).expect("merged")), ["?cats"]);

        orch.dispatch("?dogs", Some("echo"), &tx);
        assert_eq!(labels(&drain(&mut orch, &rx, 1).expect("merged")), ["?dogs"]);
    }

    #[test]
    fn cancel_discards_in_flight_round() {
        let mut orch = orchestrator(vec![Box::new(Fixed::new("a", "", &["a"]))]);
        let (tx, rx) = mpsc::channel();
        orch.dispatch("x", None, &tx);
        orch.cancel();
        assert!(!orch.is_busy());
        assert!(drain(&mut orch, &rx, 1).is_none());
    }
}
