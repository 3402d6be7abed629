//! Session manager: one supervised terminal process per session id.
//!
//! All mutable session data lives in one table behind a mutex. Output and exit
//! callbacks, debounce timers and the idle sweep all go through that table and
//! identify their session by `(id, generation)`, so anything addressed to a
//! killed or replaced process finds nothing and does nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};

use super::error::SessionError;
use super::filter::EscapeFilter;
use super::idle::{IdleChecker, IdleSweep};
use super::process::{ProcessCallbacks, ProcessHandle, ProcessSpawner, SpawnRequest};
use super::ring_buffer::{OutputChunk, RingBuffer};
use super::watch::{InputTracker, SessionIdWatch};
use crate::adapter::{Adapter, SpawnOptions, adapter_for};
use crate::config::{ColorScheme, Config};
use crate::domain::{
    Activity, AdapterError, AdapterErrorKind, ProviderKind, Seq, SessionEvent, SessionInfo,
    SessionState,
};

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;

/// Inputs for [`SessionManager::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub cwd: PathBuf,
    pub provider: ProviderKind,
    /// Id for a fresh conversation, for CLIs that accept one
    pub conversation_id: Option<String>,
    /// Stored conversation to resume
    pub existing_conversation_id: Option<String>,
    pub resuming: bool,
    pub initial_prompt: Option<String>,
    pub extra_args: Vec<String>,
    pub mode: Option<String>,
    pub shell: Option<String>,
    pub cols: u16,
    pub rows: u16,
}

impl CreateOptions {
    pub fn new(cwd: impl Into<PathBuf>, provider: ProviderKind) -> Self {
        Self {
            cwd: cwd.into(),
            provider,
            conversation_id: None,
            existing_conversation_id: None,
            resuming: false,
            initial_prompt: None,
            extra_args: Vec::new(),
            mode: None,
            shell: None,
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// Result of [`SessionManager::get_buffer_since`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSince {
    pub chunks: Vec<OutputChunk>,
    pub current_seq: Seq,
}

type SharedProcess = Arc<Mutex<Box<dyn ProcessHandle>>>;

struct PendingTransition {
    target: SessionState,
    token: u64,
    task: AbortHandle,
}

struct Session {
    id: String,
    generation: u64,
    provider: ProviderKind,
    process: SharedProcess,
    adapter: Box<dyn Adapter>,
    buffer: RingBuffer,
    filter: EscapeFilter,
    state: SessionState,
    activity: Activity,
    last_output: Instant,
    last_output_at: DateTime<Utc>,
    idle_timeout: Duration,
    last_error: Option<AdapterError>,
    invalid_reported: bool,
    input: InputTracker,
    watch: Option<SessionIdWatch>,
    pending: Option<PendingTransition>,
    next_token: u64,
    startup_grace: Option<AbortHandle>,
}

impl Session {
    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            last_output_time: self.last_output_at,
            state: self.state,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_pending();
        if let Some(grace) = self.startup_grace.take() {
            grace.abort();
        }
    }
}

/// A session taken out of the table by `kill` or replacement, waiting for its exit.
struct Retired {
    session_id: String,
    last_state: SessionState,
}

/// Why a process was torn down before its session entry existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Replaced,
    Killed,
}

/// A process between `spawn` and its table entry. Anything it reports in
/// that window is queued here.
#[derive(Default)]
struct Spawning {
    session_id: String,
    output: Vec<String>,
    exit: Option<i32>,
    teardown: Option<Teardown>,
}

#[derive(Default)]
struct Table {
    sessions: HashMap<String, Session>,
    retired: HashMap<u64, Retired>,
    spawning: HashMap<u64, Spawning>,
    next_generation: u64,
}

impl Table {
    fn live_mut(&mut self, session_id: &str, generation: u64) -> Option<&mut Session> {
        self.sessions
            .get_mut(session_id)
            .filter(|s| s.generation == generation)
    }

    /// Remove a session and remember it so its exit can still be reported.
    fn retire(&mut self, session_id: &str) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;
        // Only the most recently retired process of an id may report an exit
        self.retired.retain(|_, r| r.session_id != session_id);
        self.retired.insert(
            session.generation,
            Retired {
                session_id: session.id.clone(),
                last_state: session.state,
            },
        );
        Some(session)
    }

    /// Mark in-flight spawns for `session_id` as torn down. Returns how many.
    fn cancel_spawning(&mut self, session_id: Option<&str>, teardown: Teardown) -> usize {
        let mut cancelled = 0;
        for spawning in self.spawning.values_mut() {
            if session_id.is_none_or(|id| spawning.session_id == id) && spawning.teardown.is_none()
            {
                spawning.teardown = Some(teardown);
                cancelled += 1;
            }
        }
        cancelled
    }
}

struct Inner {
    config: Config,
    spawner: Arc<dyn ProcessSpawner>,
    events: UnboundedSender<SessionEvent>,
    runtime: Handle,
    table: Mutex<Table>,
    idle_checker: Mutex<IdleChecker>,
    this: Weak<Inner>,
}

/// Owns every live session and reports what happens to them as [`SessionEvent`]s.
///
/// Cloning is cheap; clones share the same table.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a manager on the current Tokio runtime and start its idle checker.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        config: Config,
        spawner: Arc<dyn ProcessSpawner>,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self::with_runtime(Handle::current(), config, spawner, events)
    }

    /// Create a manager whose timers run on `runtime`.
    pub fn with_runtime(
        runtime: Handle,
        config: Config,
        spawner: Arc<dyn ProcessSpawner>,
        events: UnboundedSender<SessionEvent>,
    ) -> Self {
        let interval = config.settings.idle_check_interval();
        let inner = Arc::new_cyclic(|this| Inner {
            config,
            spawner,
            events,
            runtime,
            table: Mutex::new(Table::default()),
            idle_checker: Mutex::new(IdleChecker::new(interval)),
            this: this.clone(),
        });
        let manager = Self { inner };
        manager.start_idle_checker();
        manager
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Spawn a session under `session_id`, replacing any live session with that id.
    pub fn create(&self, session_id: &str, options: CreateOptions) -> Result<(), SessionError> {
        self.inner.create(session_id, options)
    }

    /// Send input. Returns `false` for unknown sessions or failed writes.
    pub fn write(&self, session_id: &str, data: &str) -> bool {
        self.inner.write(session_id, data)
    }

    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) -> bool {
        let Some(process) = self.inner.process(session_id) else {
            return false;
        };
        let result = lock(&process).resize(cols, rows);
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to resize session {}: {:#}", session_id, e);
                false
            }
        }
    }

    /// Remove the session and SIGKILL its process.
    ///
    /// Returns as soon as the signal is sent; the `exit` event follows later.
    pub fn kill(&self, session_id: &str) -> bool {
        let session = {
            let mut table = self.inner.lock_table();
            match table.retire(session_id) {
                Some(session) => session,
                // Still spawning: torn down as soon as the spawn returns
                None => return table.cancel_spawning(Some(session_id), Teardown::Killed) > 0,
            }
        };
        tracing::info!(session_id, provider = %session.provider, "killing session");
        terminate(&session);
        true
    }

    /// Kill every live session. Returns how many were killed.
    pub fn kill_all(&self) -> usize {
        let (retired, spawning): (Vec<Session>, usize) = {
            let mut table = self.inner.lock_table();
            let ids: Vec<String> = table.sessions.keys().cloned().collect();
            let retired = ids.iter().filter_map(|id| table.retire(id)).collect();
            (retired, table.cancel_spawning(None, Teardown::Killed))
        };
        for session in &retired {
            terminate(session);
        }
        retired.len() + spawning
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.inner.lock_table().sessions.contains_key(session_id)
    }

    /// Everything currently buffered, concatenated.
    pub fn get_buffer(&self, session_id: &str) -> Option<String> {
        self.inner
            .lock_table()
            .sessions
            .get(session_id)
            .map(|s| s.buffer.to_string())
    }

    /// Chunks with `seq > after_seq` plus the latest seq.
    pub fn get_buffer_since(&self, session_id: &str, after_seq: Seq) -> Option<BufferSince> {
        self.inner
            .lock_table()
            .sessions
            .get(session_id)
            .map(|s| BufferSince {
                chunks: s.buffer.chunks_since(after_seq),
                current_seq: s.buffer.current_seq(),
            })
    }

    /// Drop buffered output. Returns the seq that was current at the time.
    pub fn clear_buffer(&self, session_id: &str) -> Option<Seq> {
        let mut table = self.inner.lock_table();
        let session = table.sessions.get_mut(session_id)?;
        session.buffer.clear();
        Some(session.buffer.current_seq())
    }

    pub fn get_state(&self, session_id: &str) -> Option<SessionState> {
        self.inner
            .lock_table()
            .sessions
            .get(session_id)
            .map(|s| s.state)
    }

    /// Last error an adapter recognized in the session's output.
    pub fn session_error(&self, session_id: &str) -> Option<AdapterError> {
        self.inner
            .lock_table()
            .sessions
            .get(session_id)
            .and_then(|s| s.last_error.clone())
    }

    /// Live sessions, ordered by id.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .lock_table()
            .sessions
            .values()
            .map(Session::info)
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    pub fn start_idle_checker(&self) {
        let target: Weak<dyn IdleSweep> = self.inner.this.clone();
        lock(&self.inner.idle_checker).start(&self.inner.runtime, target);
    }

    pub fn stop_idle_checker(&self) {
        lock(&self.inner.idle_checker).stop();
    }

    pub fn is_idle_checker_running(&self) -> bool {
        lock(&self.inner.idle_checker).is_running()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn terminate(session: &Session) {
    terminate_process(&session.id, &session.process);
}

fn terminate_process(session_id: &str, process: &SharedProcess) {
    if let Err(e) = lock(process).kill() {
        tracing::warn!("Failed to kill session {}: {:#}", session_id, e);
    }
}

/// Capability variables every spawned process gets.
pub(crate) fn terminal_env(scheme: ColorScheme) -> HashMap<String, String> {
    HashMap::from([
        ("TERM".to_string(), "xterm-256color".to_string()),
        ("COLORTERM".to_string(), "truecolor".to_string()),
        ("FORCE_COLOR".to_string(), "1".to_string()),
        ("COLORFGBG".to_string(), scheme.colorfgbg().to_string()),
    ])
}

impl Inner {
    fn lock_table(&self) -> MutexGuard<'_, Table> {
        lock(&self.table)
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }

    fn process(&self, session_id: &str) -> Option<SharedProcess> {
        self.lock_table()
            .sessions
            .get(session_id)
            .map(|s| s.process.clone())
    }

    fn create(&self, session_id: &str, options: CreateOptions) -> Result<(), SessionError> {
        if !options.cwd.is_dir() {
            return Err(SessionError::InvalidCwd(options.cwd));
        }

        let provider = options.provider;
        let overrides = self.config.provider(provider);
        let adapter = adapter_for(provider);

        let mut extra_args = overrides.args.clone();
        extra_args.extend(options.extra_args);
        let spawn_options = SpawnOptions {
            cwd: options.cwd.clone(),
            conversation_id: options.conversation_id,
            existing_conversation_id: options.existing_conversation_id,
            resuming: options.resuming,
            shell: options.shell,
            initial_prompt: options.initial_prompt,
            extra_args,
            mode: options.mode.or_else(|| overrides.mode.clone()),
            binary: overrides.binary.clone(),
        };
        let spawn_config = adapter.build_spawn_config(&spawn_options);

        let mut env = terminal_env(self.config.settings.color_scheme);
        env.extend(overrides.env.clone());
        env.extend(spawn_config.env);
        let request = SpawnRequest {
            command: spawn_config.command,
            args: spawn_config.args,
            cwd: options.cwd,
            env,
            cols: options.cols,
            rows: options.rows,
        };
        let idle_timeout = overrides
            .idle_timeout()
            .or_else(|| adapter.idle_timeout())
            .unwrap_or_else(|| self.config.settings.idle_timeout());

        tracing::debug!(
            "[termdeck:session] spawning {} for {}: {} {:?}",
            provider,
            session_id,
            request.command,
            request.args
        );

        let generation = {
            let mut table = self.lock_table();
            if let Some(old) = table.retire(session_id) {
                tracing::info!(session_id, "replacing existing session");
                terminate(&old);
            }
            table.cancel_spawning(Some(session_id), Teardown::Replaced);

            table.next_generation += 1;
            let generation = table.next_generation;
            table.spawning.insert(
                generation,
                Spawning {
                    session_id: session_id.to_string(),
                    ..Default::default()
                },
            );
            generation
        };

        // Spawning forks and starts a reader thread, so it runs unlocked;
        // callbacks arriving before the entry exists are queued in `spawning`
        let spawned = self
            .spawner
            .spawn(request, self.callbacks(session_id, generation));

        let mut table = self.lock_table();
        let early = table.spawning.remove(&generation).unwrap_or_default();
        let process: SharedProcess = match spawned {
            Ok(process) => Arc::new(Mutex::new(process)),
            Err(e) => {
                drop(table);
                tracing::error!("Failed to spawn {} session {}: {:#}", provider, session_id, e);
                return Err(SessionError::Spawn {
                    session_id: session_id.to_string(),
                    provider,
                    reason: format!("{e:#}"),
                });
            }
        };

        match early.teardown {
            Some(Teardown::Replaced) => {
                tracing::debug!(session_id, generation, "superseded while spawning");
                terminate_process(session_id, &process);
                return Ok(());
            }
            Some(Teardown::Killed) => {
                tracing::info!(session_id, generation, "killed while spawning");
                terminate_process(session_id, &process);
                match early.exit {
                    Some(exit_code) if !table.sessions.contains_key(session_id) => {
                        self.emit_exit(session_id, SessionState::Starting, exit_code);
                    }
                    Some(_) => {}
                    None => {
                        table.retired.retain(|_, r| r.session_id != session_id);
                        table.retired.insert(
                            generation,
                            Retired {
                                session_id: session_id.to_string(),
                                last_state: SessionState::Starting,
                            },
                        );
                    }
                }
                return Ok(());
            }
            None => {}
        }

        let session = Session {
            id: session_id.to_string(),
            generation,
            provider,
            process: process.clone(),
            adapter,
            buffer: RingBuffer::new(self.config.settings.buffer_max_bytes),
            filter: EscapeFilter::new(),
            state: SessionState::Starting,
            activity: Activity::Unknown,
            last_output: Instant::now(),
            last_output_at: Utc::now(),
            idle_timeout,
            last_error: None,
            invalid_reported: false,
            input: InputTracker::new(),
            watch: None,
            pending: None,
            next_token: 0,
            startup_grace: Some(self.arm_startup_grace(session_id, generation)),
        };
        table.sessions.insert(session_id.to_string(), session);

        self.emit(SessionEvent::StateChange {
            session_id: session_id.to_string(),
            new_state: SessionState::Starting,
            old_state: None,
        });
        for text in &early.output {
            self.output_locked(&mut table, session_id, generation, text);
        }
        if let Some(exit_code) = early.exit {
            self.exit_locked(&mut table, session_id, generation, exit_code);
        }
        drop(table);

        tracing::info!(session_id, %provider, generation, "session created");

        if let Some(command) = spawn_config.post_spawn_command.filter(|_| early.exit.is_none()) {
            let line = format!("{command}\r");
            if let Err(e) = lock(&process).write(line.as_bytes()) {
                tracing::warn!("Failed to send startup command to {}: {:#}", session_id, e);
            }
        }

        Ok(())
    }

    fn write(&self, session_id: &str, data: &str) -> bool {
        let process = {
            let mut table = self.lock_table();
            let Some(session) = table.sessions.get_mut(session_id) else {
                return false;
            };
            if let Some(command) = session.adapter.session_query_command() {
                if session.input.feed(data, command) {
                    tracing::debug!(session_id, command, "watching output for conversation id");
                    session.watch = Some(SessionIdWatch::new(
                        self.config.settings.session_watch_timeout(),
                    ));
                }
            }
            session.process.clone()
        };

        let result = lock(&process).write(data.as_bytes());
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to write to session {}: {:#}", session_id, e);
                false
            }
        }
    }

    fn callbacks(&self, session_id: &str, generation: u64) -> ProcessCallbacks {
        let on_data = {
            let this = self.this.clone();
            let session_id = session_id.to_string();
            Box::new(move |text: String| {
                if let Some(inner) = this.upgrade() {
                    inner.handle_output(&session_id, generation, &text);
                }
            })
        };
        let on_exit = {
            let this = self.this.clone();
            let session_id = session_id.to_string();
            Box::new(move |exit_code: i32| {
                if let Some(inner) = this.upgrade() {
                    inner.handle_exit(&session_id, generation, exit_code);
                }
            })
        };
        ProcessCallbacks { on_data, on_exit }
    }

    fn handle_output(&self, session_id: &str, generation: u64, text: &str) {
        let mut table = self.lock_table();
        self.output_locked(&mut table, session_id, generation, text);
    }

    fn output_locked(&self, table: &mut Table, session_id: &str, generation: u64, text: &str) {
        if let Some(spawning) = table.spawning.get_mut(&generation) {
            spawning.output.push(text.to_string());
            return;
        }
        let Some(session) = table.live_mut(session_id, generation) else {
            tracing::trace!(session_id, generation, "dropping output of retired process");
            return;
        };

        let filtered = session.filter.filter(text);
        let seq = (!filtered.is_empty()).then(|| session.buffer.append(&filtered));
        let now = Instant::now();
        session.last_output = now;
        session.last_output_at = Utc::now();

        self.run_detectors(session, text);

        let detected = match session.watch.take() {
            Some(watch) if watch.is_expired(now) => {
                tracing::debug!(session_id, "conversation id watch expired");
                None
            }
            Some(mut watch) => match watch.feed(&filtered) {
                Some(conversation_id) => Some(conversation_id),
                None => {
                    session.watch = Some(watch);
                    None
                }
            },
            None => None,
        };

        if let Some(seq) = seq {
            self.emit(SessionEvent::Data {
                session_id: session_id.to_string(),
                data: filtered,
                seq,
            });
        }

        if let Some(conversation_id) = detected {
            tracing::info!(session_id, %conversation_id, "conversation id detected");
            self.emit(SessionEvent::SessionDetected {
                session_id: session_id.to_string(),
                conversation_id,
            });
        }
    }

    fn run_detectors(&self, session: &mut Session, text: &str) {
        let current = session.activity;
        if let Some(activity) = session.adapter.detect_activity(text, current) {
            session.activity = activity;
            match activity {
                Activity::Working => self.transition_now(session, SessionState::Running),
                Activity::Attention => self.request_transition(session, SessionState::Attention),
                Activity::Unknown => {}
            }
        }

        if let Some(error) = session.adapter.detect_error(text) {
            self.handle_adapter_error(session, error);
        }

        if let Some(prompt) = session.adapter.detect_prompt(text) {
            self.emit(SessionEvent::Prompt {
                session_id: session.id.clone(),
                prompt,
            });
        }
    }

    fn handle_adapter_error(&self, session: &mut Session, error: AdapterError) {
        match error.kind {
            AdapterErrorKind::SessionNotFound => {
                if !session.invalid_reported {
                    session.invalid_reported = true;
                    tracing::warn!("Session {} cannot resume: {}", session.id, error.message);
                    self.emit(SessionEvent::SessionInvalid {
                        session_id: session.id.clone(),
                    });
                }
            }
            _ => {
                tracing::warn!("Session {} reported {}", session.id, error);
                // Stays in error until the adapter sees a fresh sign of life
                session.activity = Activity::Unknown;
                self.request_transition(session, SessionState::Error);
            }
        }
        session.last_error = Some(error);
    }

    /// Apply a transition now, dropping any pending one.
    fn transition_now(&self, session: &mut Session, target: SessionState) {
        session.cancel_pending();
        self.apply_state(session, target);
    }

    /// Debounced transition. A pending transition to another state is replaced;
    /// one to the current state is simply cancelled.
    fn request_transition(&self, session: &mut Session, target: SessionState) {
        if session.pending.as_ref().is_some_and(|p| p.target == target) {
            return;
        }
        session.cancel_pending();
        if session.state == target {
            return;
        }

        let delay = self.config.settings.state_debounce();
        if delay.is_zero() {
            self.apply_state(session, target);
            return;
        }

        session.next_token += 1;
        let token = session.next_token;
        let this = self.this.clone();
        let session_id = session.id.clone();
        let generation = session.generation;
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = this.upgrade() {
                inner.fire_pending(&session_id, generation, token);
            }
        });
        session.pending = Some(PendingTransition {
            target,
            token,
            task: task.abort_handle(),
        });
    }

    fn fire_pending(&self, session_id: &str, generation: u64, token: u64) {
        let mut table = self.lock_table();
        let Some(session) = table.live_mut(session_id, generation) else {
            return;
        };
        if !session.pending.as_ref().is_some_and(|p| p.token == token) {
            return;
        }
        if let Some(pending) = session.pending.take() {
            self.apply_state(session, pending.target);
        }
    }

    fn apply_state(&self, session: &mut Session, new_state: SessionState) {
        let old_state = session.state;
        if old_state == new_state {
            return;
        }
        session.state = new_state;
        if old_state == SessionState::Starting {
            if let Some(grace) = session.startup_grace.take() {
                grace.abort();
            }
        }

        tracing::debug!(session_id = %session.id, from = %old_state, to = %new_state, "state change");
        self.emit(SessionEvent::StateChange {
            session_id: session.id.clone(),
            new_state,
            old_state: Some(old_state),
        });
    }

    fn arm_startup_grace(&self, session_id: &str, generation: u64) -> AbortHandle {
        let grace = self.config.settings.startup_grace();
        let this = self.this.clone();
        let session_id = session_id.to_string();
        self.runtime
            .spawn(async move {
                tokio::time::sleep(grace).await;
                if let Some(inner) = this.upgrade() {
                    inner.startup_grace_elapsed(&session_id, generation);
                }
            })
            .abort_handle()
    }

    fn startup_grace_elapsed(&self, session_id: &str, generation: u64) {
        let mut table = self.lock_table();
        let Some(session) = table.live_mut(session_id, generation) else {
            return;
        };
        session.startup_grace = None;
        if session.state == SessionState::Starting && session.pending.is_none() {
            tracing::debug!(session_id, "no activity signal after startup, assuming ready");
            session.activity = Activity::Attention;
            self.request_transition(session, SessionState::Attention);
        }
    }

    fn handle_exit(&self, session_id: &str, generation: u64, exit_code: i32) {
        let mut table = self.lock_table();
        self.exit_locked(&mut table, session_id, generation, exit_code);
    }

    fn exit_locked(&self, table: &mut Table, session_id: &str, generation: u64, exit_code: i32) {
        if let Some(spawning) = table.spawning.get_mut(&generation) {
            spawning.exit = Some(exit_code);
            return;
        }

        if let Some(retired) = table.retired.remove(&generation) {
            if table.sessions.contains_key(&retired.session_id) {
                tracing::debug!(session_id, exit_code, "replaced process exited");
                return;
            }
            tracing::info!(session_id, exit_code, "killed session exited");
            self.emit_exit(&retired.session_id, retired.last_state, exit_code);
            return;
        }

        if table.live_mut(session_id, generation).is_none() {
            return;
        }
        if let Some(session) = table.sessions.remove(session_id) {
            tracing::info!(session_id, provider = %session.provider, exit_code, "session exited");
            self.emit_exit(session_id, session.state, exit_code);
        }
    }

    fn emit_exit(&self, session_id: &str, last_state: SessionState, exit_code: i32) {
        self.emit(SessionEvent::StateChange {
            session_id: session_id.to_string(),
            new_state: SessionState::Dead,
            old_state: Some(last_state),
        });
        self.emit(SessionEvent::Exit {
            session_id: session_id.to_string(),
            exit_code,
        });
    }
}

impl IdleSweep for Inner {
    fn sweep_idle(&self, now: Instant) {
        let mut table = self.lock_table();
        for session in table.sessions.values_mut() {
            if session.state != SessionState::Running {
                continue;
            }
            let silent = now.saturating_duration_since(session.last_output);
            if silent > session.idle_timeout {
                tracing::debug!(
                    "Session {} silent for {:?}, marking as waiting",
                    session.id,
                    silent
                );
                session.activity = Activity::Attention;
                self.request_transition(session, SessionState::Attention);
            }
        }
    }
}
