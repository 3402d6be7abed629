//! termdeck - supervise interactive coding-agent CLIs in pseudo-terminals.
//!
//! Each session is one CLI process (a shell, Claude, Codex or Gemini) running
//! in its own PTY. The [`session::SessionManager`] spawns it, keeps a bounded
//! replayable history of its output, and turns what the CLI prints into a
//! coarse state (`starting`, `running`, `attention`, `error`, `dead`) using a
//! provider-specific [`adapter::Adapter`].
//!
//! On the consuming side, [`client::ClientSync`] orders the manager's events
//! per session for any number of views, and [`client::InstanceCache`] keeps
//! detached views alive until they are reattached or deliberately reset.

pub mod adapter;
pub mod ansi;
pub mod client;
pub mod config;
pub mod domain;
pub mod session;

pub use domain::*;
