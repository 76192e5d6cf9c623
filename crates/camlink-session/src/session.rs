use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, warn};

use camlink_replay::{NamedImage, ReplayCursor, ReplayError, ReplayStore};

use crate::config::PipelineConfig;
use crate::decoder::{JsonDecoder, ResultDecoder};
use crate::dispatch::TaskQueue;
use crate::driver::{CameraDriver, FrameResult};
use crate::error::{Result, SessionError};

/// Worker-loop pacing: the stop flag is observed within one interval.
const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Pause between live (re)connect attempts in worker mode.
const RECONNECT_INTERVAL: Duration = Duration::from_millis(50);

/// Where the session is in its lifecycle.
///
/// Exactly one of `Running`/`ReplayingRunning` is ever active; `Stopping`
/// is reachable from both and always terminates at `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Running,
    ReplayingRunning,
    Stopping,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            SessionState::Disconnected => 0,
            SessionState::Connecting => 1,
            SessionState::Running => 2,
            SessionState::ReplayingRunning => 3,
            SessionState::Stopping => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionState::Connecting,
            2 => SessionState::Running,
            3 => SessionState::ReplayingRunning,
            4 => SessionState::Stopping,
            _ => SessionState::Disconnected,
        }
    }
}

/// How the session's poll loop is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessMode {
    /// A dedicated background thread connects and polls until stopped.
    #[default]
    Worker,
    /// The caller invokes [`DeviceSession::poll`] once per tick; connect
    /// happens synchronously on request and is not retried.
    Polling,
}

/// One delivered frame, decoded and ready for the consumer.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    /// Structured results produced by the session's [`ResultDecoder`].
    pub results: Value,
    /// Raw metadata bytes exactly as received or recorded.
    pub metadata: Bytes,
    /// Named image buffers for this frame.
    pub images: Vec<NamedImage>,
    /// True if this frame came from a recording rather than the device.
    pub replayed: bool,
}

type FrameCallback = Box<dyn FnMut(FrameUpdate) + Send>;

struct Playback {
    store: ReplayStore,
    cursor: ReplayCursor,
    interval: Duration,
    due: Instant,
}

struct Recorder {
    store: ReplayStore,
    next: u32,
}

struct Shared {
    config: PipelineConfig,
    driver: Mutex<Box<dyn CameraDriver>>,
    decoder: Mutex<Box<dyn ResultDecoder>>,
    callback: Mutex<Option<FrameCallback>>,
    queue: Mutex<Option<TaskQueue>>,
    state: AtomicU8,
    stop: AtomicBool,
    fallback: AtomicBool,
    /// Device init succeeded and close is still owed. Guarantees the native
    /// close call happens exactly once per successful init.
    inited: AtomicBool,
    /// Replay ran to its bound or was stopped; keeps the worker loop from
    /// restarting the source until the caller asks again.
    replay_finished: AtomicBool,
    playback: Mutex<Option<Playback>>,
    recorder: Mutex<Option<Recorder>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The top-level session for one logical camera device.
///
/// Owns the configuration, decides live vs. replay vs. fallback-to-replay,
/// runs the poll loop (dedicated worker or once per external tick), and
/// exposes connect/disconnect/record/replay controls.
///
/// Lives for the application's runtime; state transitions are driven only
/// by its own connect/disconnect/fallback logic.
pub struct DeviceSession {
    shared: Arc<Shared>,
    mode: ProcessMode,
    worker: Option<JoinHandle<()>>,
}

impl DeviceSession {
    /// Create a session over `driver` with the [`JsonDecoder`] default.
    pub fn new(config: PipelineConfig, driver: impl CameraDriver + 'static) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                driver: Mutex::new(Box::new(driver)),
                decoder: Mutex::new(Box::new(JsonDecoder)),
                callback: Mutex::new(None),
                queue: Mutex::new(None),
                state: AtomicU8::new(SessionState::Disconnected.as_u8()),
                stop: AtomicBool::new(false),
                fallback: AtomicBool::new(false),
                inited: AtomicBool::new(false),
                replay_finished: AtomicBool::new(false),
                playback: Mutex::new(None),
                recorder: Mutex::new(None),
            }),
            mode: ProcessMode::default(),
            worker: None,
        }
    }

    /// Select worker or polling execution. Set before `connect`.
    pub fn with_mode(mut self, mode: ProcessMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the metadata decoder. Set before `connect`.
    pub fn with_decoder(self, decoder: impl ResultDecoder + 'static) -> Self {
        *lock(&self.shared.decoder) = Box::new(decoder);
        self
    }

    /// Marshal frame callbacks through `queue` instead of invoking them on
    /// the producing thread. The consumer drains the queue on its own
    /// thread.
    pub fn with_task_queue(self, queue: TaskQueue) -> Self {
        *lock(&self.shared.queue) = Some(queue);
        self
    }

    /// Install the result-processing callback.
    pub fn on_frame(self, callback: impl FnMut(FrameUpdate) + Send + 'static) -> Self {
        *lock(&self.shared.callback) = Some(Box::new(callback));
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// True in either live or replay delivery.
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Running | SessionState::ReplayingRunning
        )
    }

    /// True when replay was substituted for a failed live connect. Lets the
    /// caller distinguish genuine live operation from the fallback.
    pub fn is_fallback(&self) -> bool {
        self.shared.fallback.load(Ordering::Acquire)
    }

    /// Session configuration (read-only for the session's lifetime).
    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// Start the device.
    ///
    /// Configuration errors are rejected here, before any resource opens.
    /// In worker mode this spawns the background loop and returns; the
    /// worker keeps retrying the connect until it succeeds or the session
    /// stops. In polling mode the device is started synchronously and a
    /// failed live init (with no replay source configured) propagates.
    pub fn connect(&mut self) -> Result<()> {
        self.shared.config.validate()?;
        if self.is_running() {
            debug!("connect called on running session");
            return Ok(());
        }

        self.shared.stop.store(false, Ordering::Release);
        self.shared.replay_finished.store(false, Ordering::Release);
        self.shared.fallback.store(false, Ordering::Release);
        self.arm_recorder();

        match self.mode {
            ProcessMode::Worker => {
                if self.worker.is_none() {
                    let shared = Arc::clone(&self.shared);
                    self.worker = Some(std::thread::spawn(move || run_loop(&shared)));
                }
                Ok(())
            }
            ProcessMode::Polling => start_device(&self.shared),
        }
    }

    /// One cooperative tick for polling mode: pull the latest available
    /// frame (or the next due replay frame) and invoke the callback. A
    /// stall in the device call blocks this tick; that is the accepted
    /// price of having no background thread.
    pub fn poll(&mut self) {
        if self.shared.stop.load(Ordering::Acquire) {
            return;
        }
        step(&self.shared);
    }

    /// Stop the session and release the device.
    ///
    /// Blocks until the worker (if any) has observed the stop signal and
    /// exited, then issues the driver close — in that order, so close never
    /// races an in-flight poll. Idempotent: the close call happens at most
    /// once per successful init, and calling this on a disconnected session
    /// is a no-op.
    pub fn disconnect(&mut self) {
        if self.shared.state() != SessionState::Disconnected {
            self.shared.set_state(SessionState::Stopping);
        }
        self.shared.stop.store(true, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("session worker panicked");
            }
        }

        lock(&self.shared.playback).take();
        lock(&self.shared.recorder).take();

        if self.shared.inited.swap(false, Ordering::AcqRel) {
            lock(&self.shared.driver).close(self.shared.config.device_index);
            info!(
                device_index = self.shared.config.device_index,
                "device closed"
            );
        }

        self.shared.fallback.store(false, Ordering::Release);
        self.shared.set_state(SessionState::Disconnected);
    }

    /// Begin playback from the configured replay source at frame 0.
    ///
    /// Requires a configured path and a positive frame count. Does not
    /// touch any live transport. Frames are delivered by the worker loop or
    /// by `poll` ticks, paced at the configured replay fps.
    pub fn start_replay(&mut self) -> Result<()> {
        if !self.shared.config.has_replay_source() {
            return Err(SessionError::ReplayNotConfigured);
        }
        self.shared.stop.store(false, Ordering::Release);
        begin_replay(&self.shared)
    }

    /// Persist one frame into the configured record directory at the next
    /// sequential index.
    ///
    /// Delivered live frames are recorded automatically when a record path
    /// is set; this entry point is for frames the caller produces itself.
    /// Requires an armed recorder, which `connect` sets up from
    /// `record_path`.
    pub fn record(&self, metadata: &str, images: &[NamedImage]) -> Result<()> {
        let mut recorder_guard = lock(&self.shared.recorder);
        let Some(recorder) = recorder_guard.as_mut() else {
            return Err(SessionError::Config("record path not configured".into()));
        };
        recorder.store.save(recorder.next, metadata, images)?;
        recorder.next += 1;
        Ok(())
    }

    /// Stop frame delivery from replay. Leaves any live transport alone
    /// (there is none in replay mode) and does not close the device.
    pub fn stop_replay(&mut self) {
        if lock(&self.shared.playback).take().is_some() {
            info!("replay stopped");
        }
        self.shared.replay_finished.store(true, Ordering::Release);
        if self.shared.state() == SessionState::ReplayingRunning {
            self.shared.set_state(SessionState::Disconnected);
        }
    }

    fn arm_recorder(&self) {
        let Some(path) = &self.shared.config.record_path else {
            return;
        };
        // Recording while replaying would overwrite the source with itself.
        let replay_autostart = self
            .shared
            .config
            .replay
            .as_ref()
            .is_some_and(|replay| replay.autostart);
        if replay_autostart {
            debug!("recording disabled: session starts in replay mode");
            return;
        }
        *lock(&self.shared.recorder) = Some(Recorder {
            store: ReplayStore::new(path.clone(), Vec::new()),
            next: 0,
        });
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Worker-mode main loop: reconnect until running, then poll for frames,
/// until the stop flag is observed.
fn run_loop(shared: &Arc<Shared>) {
    while !shared.stop.load(Ordering::Acquire) {
        match shared.state() {
            SessionState::Disconnected | SessionState::Connecting => {
                if shared.replay_finished.load(Ordering::Acquire) {
                    std::thread::sleep(POLL_INTERVAL);
                    continue;
                }
                if let Err(err) = start_device(shared) {
                    debug!(%err, "device start failed; will retry");
                    std::thread::sleep(RECONNECT_INTERVAL);
                    continue;
                }
            }
            SessionState::Running | SessionState::ReplayingRunning => step(shared),
            SessionState::Stopping => break,
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Start live or replay delivery, applying the fallback policy: a failed
/// live init with a usable replay source configured becomes replay, not an
/// error.
fn start_device(shared: &Arc<Shared>) -> Result<()> {
    shared.set_state(SessionState::Connecting);

    let autostart_replay = shared
        .config
        .replay
        .as_ref()
        .is_some_and(|replay| replay.autostart);
    if autostart_replay && shared.config.has_replay_source() {
        info!("starting in replay mode");
        return begin_replay(shared);
    }

    match lock(&shared.driver).init(&shared.config) {
        Ok(()) => {
            shared.inited.store(true, Ordering::Release);
            shared.set_state(SessionState::Running);
            info!("device running");
            Ok(())
        }
        Err(err) => {
            if shared.config.has_replay_source() {
                warn!(%err, "live init failed; falling back to replay");
                shared.fallback.store(true, Ordering::Release);
                begin_replay(shared)
            } else {
                shared.set_state(SessionState::Disconnected);
                Err(err)
            }
        }
    }
}

fn begin_replay(shared: &Arc<Shared>) -> Result<()> {
    let Some(replay) = shared.config.replay.as_ref() else {
        return Err(SessionError::ReplayNotConfigured);
    };
    if replay.frame_count == 0 {
        return Err(SessionError::ReplayNotConfigured);
    }

    let interval = Duration::from_secs_f64(1.0 / f64::from(replay.fps));
    *lock(&shared.playback) = Some(Playback {
        store: ReplayStore::new(replay.path.clone(), replay.image_names.clone()),
        cursor: ReplayCursor::new(replay.frame_count, replay.loop_replay),
        interval,
        // First frame is due immediately.
        due: Instant::now(),
    });
    shared.replay_finished.store(false, Ordering::Release);
    shared.set_state(SessionState::ReplayingRunning);
    info!(
        path = %replay.path.display(),
        frames = replay.frame_count,
        fps = replay.fps,
        "replay started"
    );
    Ok(())
}

/// One delivery step, shared by both execution modes.
fn step(shared: &Arc<Shared>) {
    match shared.state() {
        SessionState::Running => live_step(shared),
        SessionState::ReplayingRunning => replay_tick(shared),
        _ => {}
    }
}

fn live_step(shared: &Arc<Shared>) {
    let polled = lock(&shared.driver).get_results();
    match polled {
        Ok(Some(frame)) => handle_live_frame(shared, frame),
        // No new frame: between frames or mid-segment stall, identical from
        // here. The last delivered results simply remain current.
        Ok(None) => {}
        Err(err) => warn!(%err, "device poll failed"),
    }
}

fn handle_live_frame(shared: &Arc<Shared>, frame: FrameResult) {
    let results = match lock(&shared.decoder).decode(&frame.metadata) {
        Ok(results) => results,
        Err(err) => {
            warn!(%err, "dropping frame with undecodable metadata");
            return;
        }
    };

    record_frame(shared, &frame);

    deliver(
        shared,
        FrameUpdate {
            results,
            metadata: frame.metadata,
            images: frame.images,
            replayed: false,
        },
    );
}

fn record_frame(shared: &Arc<Shared>, frame: &FrameResult) {
    let mut recorder_guard = lock(&shared.recorder);
    let mut failed = false;
    if let Some(recorder) = recorder_guard.as_mut() {
        let metadata = String::from_utf8_lossy(&frame.metadata);
        match recorder.store.save(recorder.next, &metadata, &frame.images) {
            Ok(()) => recorder.next += 1,
            Err(err) => {
                warn!(%err, "recording failed; disabling recorder");
                failed = true;
            }
        }
    }
    if failed {
        recorder_guard.take();
    }
}

enum TickOutcome {
    Idle,
    Frame(camlink_replay::ReplayFrame),
    Finished,
}

fn replay_tick(shared: &Arc<Shared>) {
    let outcome = {
        let mut playback_guard = lock(&shared.playback);
        match playback_guard.as_mut() {
            None => TickOutcome::Idle,
            Some(playback) => {
                let now = Instant::now();
                if now < playback.due {
                    TickOutcome::Idle
                } else {
                    playback.due += playback.interval;
                    match playback.cursor.advance() {
                        None => TickOutcome::Finished,
                        Some(index) => match playback.store.load(index) {
                            Ok(frame) => TickOutcome::Frame(frame),
                            Err(err @ ReplayError::NotFound { .. }) => {
                                // Contiguity is Save's contract; a gap here
                                // means the recording is broken. Stop
                                // delivery rather than spin on it.
                                warn!(%err, "replay frame missing; stopping playback");
                                TickOutcome::Finished
                            }
                            Err(err) => {
                                warn!(%err, "replay read failed; stopping playback");
                                TickOutcome::Finished
                            }
                        },
                    }
                }
            }
        }
    };

    match outcome {
        TickOutcome::Idle => {}
        TickOutcome::Finished => {
            lock(&shared.playback).take();
            shared.replay_finished.store(true, Ordering::Release);
            shared.set_state(SessionState::Disconnected);
            info!("replay finished");
        }
        TickOutcome::Frame(frame) => {
            let results = match lock(&shared.decoder).decode(frame.metadata.as_bytes()) {
                Ok(results) => results,
                Err(err) => {
                    warn!(%err, "dropping replay frame with undecodable metadata");
                    return;
                }
            };
            deliver(
                shared,
                FrameUpdate {
                    results,
                    metadata: Bytes::from(frame.metadata.into_bytes()),
                    images: frame.images,
                    replayed: true,
                },
            );
        }
    }
}

/// Hand one update to the consumer: through the task queue when one is
/// installed (the consumer's thread runs it on drain), inline otherwise.
fn deliver(shared: &Arc<Shared>, update: FrameUpdate) {
    let queue = lock(&shared.queue).clone();
    match queue {
        Some(queue) => {
            let shared = Arc::clone(shared);
            queue.push(move || invoke_callback(&shared, update));
        }
        None => invoke_callback(shared, update),
    }
}

fn invoke_callback(shared: &Shared, update: FrameUpdate) {
    if let Some(callback) = lock(&shared.callback).as_mut() {
        callback(update);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    use crate::config::ReplayConfig;

    use super::*;

    struct MockDriver {
        fail_inits: usize,
        init_calls: Arc<AtomicUsize>,
        close_calls: Arc<AtomicUsize>,
        frames: VecDeque<FrameResult>,
    }

    impl MockDriver {
        fn new(frames: Vec<FrameResult>) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let init_calls = Arc::new(AtomicUsize::new(0));
            let close_calls = Arc::new(AtomicUsize::new(0));
            let driver = Self {
                fail_inits: 0,
                init_calls: Arc::clone(&init_calls),
                close_calls: Arc::clone(&close_calls),
                frames: frames.into(),
            };
            (driver, init_calls, close_calls)
        }

        fn failing(fail_inits: usize, frames: Vec<FrameResult>) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let (mut driver, init_calls, close_calls) = Self::new(frames);
            driver.fail_inits = fail_inits;
            (driver, init_calls, close_calls)
        }
    }

    impl CameraDriver for MockDriver {
        fn init(&mut self, _config: &PipelineConfig) -> Result<()> {
            let call = self.init_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_inits {
                return Err(SessionError::DeviceInit("no device available".into()));
            }
            Ok(())
        }

        fn get_results(&mut self) -> Result<Option<FrameResult>> {
            Ok(self.frames.pop_front())
        }

        fn close(&mut self, _device_index: u32) {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn mock_frame(n: u32) -> FrameResult {
        FrameResult {
            metadata: Bytes::from(format!("{{\"n\":{n}}}")),
            images: vec![NamedImage::new("color", vec![n as u8; 16])],
        }
    }

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "camlink-session-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    /// Write a small recording and return its replay config.
    fn make_recording(dir: &PathBuf, frames: u32) -> ReplayConfig {
        let store = ReplayStore::new(dir.clone(), vec!["color".into()]);
        for frame in 0..frames {
            let images = vec![NamedImage::new("color", vec![frame as u8; 8])];
            store
                .save(frame, &format!("{{\"frame\":{frame}}}"), &images)
                .expect("save recording frame");
        }
        ReplayConfig {
            path: dir.clone(),
            frame_count: frames,
            fps: 500.0,
            loop_replay: false,
            image_names: vec!["color".into()],
            autostart: false,
        }
    }

    fn collecting_session(
        config: PipelineConfig,
        driver: MockDriver,
    ) -> (DeviceSession, Arc<Mutex<Vec<FrameUpdate>>>) {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let session = DeviceSession::new(config, driver)
            .with_mode(ProcessMode::Polling)
            .on_frame(move |update| sink.lock().unwrap().push(update));
        (session, collected)
    }

    fn poll_until(
        session: &mut DeviceSession,
        timeout: Duration,
        mut done: impl FnMut(&DeviceSession) -> bool,
    ) {
        let deadline = Instant::now() + timeout;
        while !done(session) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            session.poll();
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn polling_mode_connects_and_delivers_frames() {
        let (driver, init_calls, _) = MockDriver::new(vec![mock_frame(0), mock_frame(1)]);
        let (mut session, collected) =
            collecting_session(PipelineConfig::default(), driver);

        session.connect().expect("connect");
        assert_eq!(session.state(), SessionState::Running);
        assert!(!session.is_fallback());
        assert_eq!(init_calls.load(Ordering::SeqCst), 1);

        poll_until(&mut session, Duration::from_secs(2), |_| {
            collected.lock().unwrap().len() >= 2
        });

        let updates = collected.lock().unwrap();
        assert_eq!(updates[0].results["n"], 0);
        assert_eq!(updates[1].results["n"], 1);
        assert!(!updates[0].replayed);
    }

    #[test]
    fn disconnect_is_idempotent_close_called_once() {
        let (driver, _, close_calls) = MockDriver::new(vec![]);
        let (mut session, _) = collecting_session(PipelineConfig::default(), driver);

        session.connect().expect("connect");
        session.disconnect();
        session.disconnect();

        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn disconnect_without_successful_init_never_calls_close() {
        let (driver, _, close_calls) = MockDriver::failing(usize::MAX, vec![]);
        let (mut session, _) = collecting_session(PipelineConfig::default(), driver);

        assert!(session.connect().is_err());
        session.disconnect();
        assert_eq!(close_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn config_error_is_rejected_before_device_init() {
        let (driver, init_calls, _) = MockDriver::new(vec![]);
        let config = PipelineConfig {
            bridge_host: String::new(),
            ..PipelineConfig::default()
        };
        let (mut session, _) = collecting_session(config, driver);

        let err = session.connect().unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
        assert_eq!(init_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn failed_live_init_falls_back_to_replay() {
        let dir = unique_temp_dir("fallback");
        let replay = make_recording(&dir, 3);
        let config = PipelineConfig {
            replay: Some(replay),
            ..PipelineConfig::default()
        };

        let (driver, _, close_calls) = MockDriver::failing(usize::MAX, vec![]);
        let (mut session, collected) = collecting_session(config, driver);

        // Fallback is policy, not an error: connect succeeds.
        session.connect().expect("connect with fallback");
        assert_eq!(session.state(), SessionState::ReplayingRunning);
        assert!(session.is_fallback());

        poll_until(&mut session, Duration::from_secs(2), |_| {
            !collected.lock().unwrap().is_empty()
        });

        // First polled frame equals the stored frame 0.
        let expected = ReplayStore::new(dir.clone(), vec!["color".into()])
            .load(0)
            .expect("load frame 0");
        let updates = collected.lock().unwrap();
        assert_eq!(updates[0].metadata.as_ref(), expected.metadata.as_bytes());
        assert_eq!(updates[0].images, expected.images);
        assert!(updates[0].replayed);
        drop(updates);

        session.disconnect();
        // Replay never inited the device, so nothing to close.
        assert_eq!(close_calls.load(Ordering::SeqCst), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replay_halts_at_frame_bound() {
        let dir = unique_temp_dir("bound");
        let mut replay = make_recording(&dir, 2);
        replay.autostart = true;
        let config = PipelineConfig {
            replay: Some(replay),
            ..PipelineConfig::default()
        };

        let (driver, init_calls, _) = MockDriver::new(vec![]);
        let (mut session, collected) = collecting_session(config, driver);

        session.connect().expect("connect");
        assert_eq!(session.state(), SessionState::ReplayingRunning);
        // Autostart replay never touches the live driver.
        assert_eq!(init_calls.load(Ordering::SeqCst), 0);

        poll_until(&mut session, Duration::from_secs(2), |s| {
            s.state() == SessionState::Disconnected
        });

        let updates = collected.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].results["frame"], 0);
        assert_eq!(updates[1].results["frame"], 1);
        drop(updates);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replay_stops_at_gap_in_recording() {
        let dir = unique_temp_dir("gap");
        // Only frames 0 and 1 exist on disk; the configured bound claims 4.
        let mut replay = make_recording(&dir, 2);
        replay.frame_count = 4;
        replay.autostart = true;
        let config = PipelineConfig {
            replay: Some(replay),
            ..PipelineConfig::default()
        };

        let (driver, _, _) = MockDriver::new(vec![]);
        let (mut session, collected) = collecting_session(config, driver);
        session.connect().expect("connect");

        // Hitting the missing frame 2 must stop delivery, not panic or spin.
        poll_until(&mut session, Duration::from_secs(2), |s| {
            s.state() == SessionState::Disconnected
        });

        let updates = collected.lock().unwrap();
        assert_eq!(updates.len(), 2, "only the recorded frames are delivered");
        assert_eq!(updates[0].results["frame"], 0);
        assert_eq!(updates[1].results["frame"], 1);
        drop(updates);

        session.disconnect();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replay_wraps_to_zero_when_looping() {
        let dir = unique_temp_dir("wrap");
        let mut replay = make_recording(&dir, 2);
        replay.autostart = true;
        replay.loop_replay = true;
        let config = PipelineConfig {
            replay: Some(replay),
            ..PipelineConfig::default()
        };

        let (driver, _, _) = MockDriver::new(vec![]);
        let (mut session, collected) = collecting_session(config, driver);
        session.connect().expect("connect");

        poll_until(&mut session, Duration::from_secs(2), |_| {
            collected.lock().unwrap().len() >= 5
        });

        let updates = collected.lock().unwrap();
        for (i, update) in updates.iter().take(5).enumerate() {
            assert_eq!(update.results["frame"], (i % 2) as u32);
        }
        drop(updates);

        session.stop_replay();
        assert_eq!(session.state(), SessionState::Disconnected);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn worker_mode_delivers_and_joins_on_disconnect() {
        let (driver, _, close_calls) =
            MockDriver::new((0..16).map(mock_frame).collect());
        let (tx, rx) = mpsc::channel();
        let mut session = DeviceSession::new(PipelineConfig::default(), driver)
            .with_mode(ProcessMode::Worker)
            .on_frame(move |update| {
                let _ = tx.send(update);
            });

        session.connect().expect("connect");
        let first = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("worker should deliver");
        assert_eq!(first.results["n"], 0);

        session.disconnect();
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn worker_mode_retries_connect_until_device_available() {
        let (driver, init_calls, close_calls) =
            MockDriver::failing(2, vec![mock_frame(7)]);
        let (tx, rx) = mpsc::channel();
        let mut session = DeviceSession::new(PipelineConfig::default(), driver)
            .with_mode(ProcessMode::Worker)
            .on_frame(move |update| {
                let _ = tx.send(update);
            });

        session.connect().expect("connect");
        let update = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker should eventually connect");
        assert_eq!(update.results["n"], 7);
        assert!(init_calls.load(Ordering::SeqCst) >= 3);

        session.disconnect();
        assert_eq!(close_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn task_queue_marshals_callbacks_to_draining_thread() {
        let (driver, _, _) = MockDriver::new(vec![mock_frame(0)]);
        let queue = TaskQueue::new();
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        let mut session = DeviceSession::new(PipelineConfig::default(), driver)
            .with_mode(ProcessMode::Polling)
            .with_task_queue(queue.clone())
            .on_frame(move |update| sink.lock().unwrap().push(update));

        session.connect().expect("connect");
        let deadline = Instant::now() + Duration::from_secs(2);
        while queue.is_empty() {
            assert!(Instant::now() < deadline, "task should be queued");
            session.poll();
            std::thread::sleep(Duration::from_millis(1));
        }

        // Queued but not yet invoked.
        assert!(collected.lock().unwrap().is_empty());
        assert_eq!(queue.drain(), 1);
        assert_eq!(collected.lock().unwrap().len(), 1);
    }

    #[test]
    fn live_frames_are_recorded_when_record_path_is_set() {
        let dir = unique_temp_dir("record");
        let config = PipelineConfig {
            record_path: Some(dir.clone()),
            ..PipelineConfig::default()
        };
        let (driver, _, _) = MockDriver::new(vec![mock_frame(0), mock_frame(1)]);
        let (mut session, collected) = collecting_session(config, driver);

        session.connect().expect("connect");
        poll_until(&mut session, Duration::from_secs(2), |_| {
            collected.lock().unwrap().len() >= 2
        });
        session.disconnect();

        let store = ReplayStore::new(dir.clone(), vec!["color".into()]);
        let frame0 = store.load(0).expect("recorded frame 0");
        assert_eq!(frame0.metadata, "{\"n\":0}");
        assert_eq!(frame0.images[0].data.as_ref(), &[0u8; 16][..]);
        let frame1 = store.load(1).expect("recorded frame 1");
        assert_eq!(frame1.metadata, "{\"n\":1}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn explicit_record_appends_after_automatic_recording() {
        let dir = unique_temp_dir("manual-record");
        let config = PipelineConfig {
            record_path: Some(dir.clone()),
            ..PipelineConfig::default()
        };
        let (driver, _, _) = MockDriver::new(vec![mock_frame(0)]);
        let (mut session, collected) = collecting_session(config, driver);

        session.connect().expect("connect");
        poll_until(&mut session, Duration::from_secs(2), |_| {
            !collected.lock().unwrap().is_empty()
        });

        let extra = vec![NamedImage::new("color", vec![0xEE; 4])];
        session
            .record("{\"manual\":true}", &extra)
            .expect("manual record");

        let store = ReplayStore::new(dir.clone(), vec!["color".into()]);
        assert_eq!(store.load(0).expect("auto frame").metadata, "{\"n\":0}");
        assert_eq!(
            store.load(1).expect("manual frame").metadata,
            "{\"manual\":true}"
        );

        session.disconnect();
        // Without a record path the entry point refuses.
        let (driver, _, _) = MockDriver::new(vec![]);
        let (bare, _) = collecting_session(PipelineConfig::default(), driver);
        assert!(bare.record("{}", &[]).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn start_replay_requires_a_configured_source() {
        let (driver, _, _) = MockDriver::new(vec![]);
        let (mut session, _) = collecting_session(PipelineConfig::default(), driver);
        assert!(matches!(
            session.start_replay(),
            Err(SessionError::ReplayNotConfigured)
        ));
    }

    #[test]
    fn start_replay_resets_to_frame_zero() {
        let dir = unique_temp_dir("restart");
        let replay = make_recording(&dir, 2);
        let config = PipelineConfig {
            replay: Some(replay),
            ..PipelineConfig::default()
        };
        let (driver, _, _) = MockDriver::new(vec![]);
        let (mut session, collected) = collecting_session(config, driver);

        session.start_replay().expect("start replay");
        poll_until(&mut session, Duration::from_secs(2), |s| {
            s.state() == SessionState::Disconnected
        });
        assert_eq!(collected.lock().unwrap().len(), 2);

        // A second run starts over at frame 0.
        session.start_replay().expect("restart replay");
        poll_until(&mut session, Duration::from_secs(2), |_| {
            collected.lock().unwrap().len() >= 3
        });
        assert_eq!(collected.lock().unwrap()[2].results["frame"], 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
