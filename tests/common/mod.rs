//! Shared test utilities: a scripted process spawner

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use tempfile::TempDir;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use termdeck::config::Config;
use termdeck::session::{
    DataCallback, ExitCallback, ProcessCallbacks, ProcessHandle, ProcessSpawner, SessionManager,
    SpawnRequest,
};
use termdeck::{SessionEvent, SessionState};

struct FakeState {
    request: SpawnRequest,
    on_data: Mutex<Option<DataCallback>>,
    on_exit: Mutex<Option<ExitCallback>>,
    written: Mutex<Vec<u8>>,
    size: Mutex<(u16, u16)>,
    killed: AtomicBool,
}

/// Test-side control of one fake process.
///
/// Output and exit are delivered from the calling thread, like a PTY reader
/// thread would deliver them, and may be delivered while the spawn is still
/// in progress (see [`FakeSpawner::during_next_spawn`]).
#[derive(Clone)]
pub struct FakeProcess {
    state: Arc<FakeState>,
}

impl FakeProcess {
    pub fn request(&self) -> &SpawnRequest {
        &self.state.request
    }

    /// Simulate output.
    pub fn emit(&self, text: &str) {
        if let Some(on_data) = self.state.on_data.lock().unwrap().as_mut() {
            on_data(text.to_string());
        }
    }

    /// Simulate the process exiting. Only the first call has an effect.
    pub fn exit(&self, code: i32) {
        self.state.on_data.lock().unwrap().take();
        let on_exit = self.state.on_exit.lock().unwrap().take();
        if let Some(on_exit) = on_exit {
            on_exit(code);
        }
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.written.lock().unwrap()).into_owned()
    }

    pub fn size(&self) -> (u16, u16) {
        *self.state.size.lock().unwrap()
    }

    pub fn was_killed(&self) -> bool {
        self.state.killed.load(Ordering::SeqCst)
    }
}

struct FakeHandle {
    state: Arc<FakeState>,
}

impl ProcessHandle for FakeHandle {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.state.killed.load(Ordering::SeqCst) {
            bail!("process is gone");
        }
        self.state.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        *self.state.size.lock().unwrap() = (cols, rows);
        Ok(())
    }

    fn kill(&mut self) -> Result<()> {
        self.state.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        None
    }
}

type SpawnHook = Box<dyn FnOnce(&FakeProcess) + Send>;

/// Records every spawn and hands out [`FakeProcess`] controls.
#[derive(Default)]
pub struct FakeSpawner {
    processes: Mutex<Vec<FakeProcess>>,
    fail_next: AtomicBool,
    during_spawn: Mutex<Option<SpawnHook>>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next spawn fail.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Run `hook` inside the next spawn, before it returns.
    pub fn during_next_spawn(&self, hook: impl FnOnce(&FakeProcess) + Send + 'static) {
        *self.during_spawn.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn processes(&self) -> Vec<FakeProcess> {
        self.processes.lock().unwrap().clone()
    }

    pub fn last(&self) -> FakeProcess {
        self.processes
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing spawned")
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(
        &self,
        request: SpawnRequest,
        callbacks: ProcessCallbacks,
    ) -> Result<Box<dyn ProcessHandle>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            bail!("No such file or directory (os error 2)");
        }

        let size = (request.cols, request.rows);
        let state = Arc::new(FakeState {
            request,
            on_data: Mutex::new(Some(callbacks.on_data)),
            on_exit: Mutex::new(Some(callbacks.on_exit)),
            written: Mutex::new(Vec::new()),
            size: Mutex::new(size),
            killed: AtomicBool::new(false),
        });
        let process = FakeProcess {
            state: state.clone(),
        };
        self.processes.lock().unwrap().push(process.clone());

        let hook = self.during_spawn.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&process);
        }
        Ok(Box::new(FakeHandle { state }))
    }
}

/// A manager wired to a fake spawner, plus its event stream.
pub struct Harness {
    pub manager: SessionManager,
    pub spawner: Arc<FakeSpawner>,
    pub events: UnboundedReceiver<SessionEvent>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let spawner = FakeSpawner::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = SessionManager::new(config, spawner.clone(), tx);
        Self {
            manager,
            spawner,
            events: rx,
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Every event emitted so far.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// The `new_state` of every state change in `events`.
pub fn states(events: &[SessionEvent]) -> Vec<SessionState> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateChange { new_state, .. } => Some(*new_state),
            _ => None,
        })
        .collect()
}

/// Data chunks in `events` as `(seq, data)`.
pub fn data(events: &[SessionEvent]) -> Vec<(i64, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Data { seq, data, .. } => Some((*seq, data.clone())),
            _ => None,
        })
        .collect()
}

pub fn exits(events: &[SessionEvent]) -> Vec<i32> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Exit { exit_code, .. } => Some(*exit_code),
            _ => None,
        })
        .collect()
}
