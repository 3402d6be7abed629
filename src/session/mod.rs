//! Session management: processes, output history and state tracking.

mod error;
mod filter;
mod idle;
mod manager;
mod process;
mod ring_buffer;
mod watch;

pub use error::SessionError;
pub use filter::{EscapeFilter, filter_complete};
pub use idle::{DEFAULT_IDLE_CHECK_INTERVAL, IdleChecker, IdleSweep};
pub use manager::{BufferSince, CreateOptions, DEFAULT_COLS, DEFAULT_ROWS, SessionManager};
pub use process::{
    DataCallback, ExitCallback, ProcessCallbacks, ProcessHandle, ProcessSpawner, PtySpawner,
    SpawnRequest,
};
pub use ring_buffer::{DEFAULT_MAX_BYTES, OutputChunk, RingBuffer};
pub use watch::{InputTracker, SessionIdWatch};
