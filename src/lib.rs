//! Result computation and selection core for a keystroke-driven launcher.
//!
//! As the user types, pluggable [`modules`] produce candidate [`Entry`]
//! values. The [`orchestrator`] fans each term out to the eligible modules on
//! worker threads, drops replies from superseded generations and merges the
//! rest. The [`list`] engine owns the displayed rows and the selection, and
//! [`activation`] turns gestures into launched commands.
//!
//! [`Launcher`] wires these together for a UI thread; the binary drives it
//! from a Wayland layer surface.

pub mod activation;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod launcher;
pub mod list;
pub mod matcher;
pub mod model;
pub mod modules;
pub mod orchestrator;
pub mod registry;
pub mod session;

pub use activation::{Outcome, Trigger};
pub use config::Config;
pub use error::{Error, Result};
pub use launcher::Launcher;
pub use list::{Row, Surface};
pub use model::{Entry, Matching};
pub use modules::{CancelToken, Module};
pub use orchestrator::{Dispatch, Reply};
pub use registry::Registry;
