use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::capture::context::CaptureContext;
use crate::mix::incremental::IncrementalMixer;
use crate::mix::offline::OfflineMixer;
use crate::models::artifact::{RecordingArtifact, RecordingMetadata};
use crate::models::config::{MixStrategy, RecorderConfig, RecordingMode};
use crate::models::error::CaptureError;
use crate::models::pcm::{PcmBuffer, CANONICAL_CHANNELS};
use crate::models::source::{AudioLevels, SessionDiagnostics, SourceKind};
use crate::models::state::RecorderState;
use crate::processing::mixer::MixEngine;
use crate::sink::file_sink::FileSink;
use crate::sink::memory_sink::MemorySink;
use crate::sink::BufferSink;
use crate::storage::metadata;
use crate::storage::wav_writer::FinalizedWav;
use crate::traits::capture_provider::{AudioBufferCallback, CaptureProvider};
use crate::traits::permission_gate::{AlwaysGranted, PermissionGate, PermissionStatus};
use crate::traits::session_delegate::SessionDelegate;

/// Memory sink capacity for live mixing, in seconds of audio.
const LIVE_BUFFER_SECONDS: f64 = 5.0;

/// Mutable state shared with capture callbacks and worker threads.
struct SharedState {
    state: RecorderState,
    levels: AudioLevels,
    diagnostics: SessionDiagnostics,
}

impl SharedState {
    fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            levels: AudioLevels::default(),
            diagnostics: SessionDiagnostics::default(),
        }
    }
}

/// Where buffers go for the duration of one recording.
enum Pipeline {
    /// One source, written incrementally to the output file.
    SingleFile { sink: Arc<FileSink> },
    /// Two sources recording to per-source temp files, mixed after stop.
    DualOffline {
        system_sink: Arc<FileSink>,
        mic_sink: Arc<FileSink>,
    },
    /// Two sources mixed live from memory sinks.
    DualLive {
        mixer: IncrementalMixer,
        system_sink: Arc<MemorySink>,
        mic_sink: Arc<MemorySink>,
    },
}

/// Everything belonging to the in-flight recording. Dropped (after
/// cleanup) when the session returns to idle.
struct ActiveSession {
    mode: RecordingMode,
    output_path: PathBuf,
    temp_system: Option<PathBuf>,
    temp_mic: Option<PathBuf>,
    context: CaptureContext,
    pipeline: Pipeline,
    system_started: bool,
    mic_started: bool,
    started_at: Instant,
    bit_depth: u16,
}

/// Owns the recording lifecycle: mode selection, permission
/// preconditions, source start ordering, mixing strategy, and teardown.
///
/// ```text
/// [System Provider] ─→ [Sink] ─┐
///                               ├→ [MixEngine] → [WavWriter]
/// [Mic Provider]    ─→ [Sink] ─┘
/// ```
///
/// All lifecycle transitions run on the caller's thread and are
/// serialized through `&mut self`; capture callbacks only touch the
/// shared state behind a mutex. One recording at a time.
pub struct RecordingController<S: CaptureProvider, M: CaptureProvider> {
    system: S,
    microphone: M,
    config: RecorderConfig,
    permissions: Arc<dyn PermissionGate>,
    delegate: Option<Arc<dyn SessionDelegate>>,
    shared: Arc<Mutex<SharedState>>,
    active: Option<ActiveSession>,
    last_artifact: Option<RecordingArtifact>,
}

impl<S: CaptureProvider, M: CaptureProvider> RecordingController<S, M> {
    pub fn new(system: S, microphone: M, config: RecorderConfig) -> Self {
        Self {
            system,
            microphone,
            config,
            permissions: Arc::new(AlwaysGranted),
            delegate: None,
            shared: Arc::new(Mutex::new(SharedState::new())),
            active: None,
            last_artifact: None,
        }
    }

    pub fn set_permission_gate(&mut self, gate: Arc<dyn PermissionGate>) {
        self.permissions = gate;
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn SessionDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> RecorderState {
        self.shared.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.state().is_recording()
    }

    pub fn current_levels(&self) -> AudioLevels {
        self.shared.lock().levels
    }

    pub fn diagnostics(&self) -> SessionDiagnostics {
        self.shared.lock().diagnostics.clone()
    }

    /// The active recording's output path, or the finished one until the
    /// caller takes the artifact.
    pub fn current_output_path(&self) -> Option<PathBuf> {
        if let Some(session) = &self.active {
            return Some(session.output_path.clone());
        }
        self.last_artifact.as_ref().map(|a| a.file_path.clone())
    }

    /// Consume the finished recording, clearing the retained path.
    pub fn take_artifact(&mut self) -> Option<RecordingArtifact> {
        self.last_artifact.take()
    }

    /// The capture sources, for availability and device queries.
    pub fn sources(&self) -> (&S, &M) {
        (&self.system, &self.microphone)
    }

    /// Start a recording. Fails with `RecordingInProgress` if a session
    /// is already active; any partial start rolls back to idle before
    /// the originating error is returned.
    pub fn start(&mut self, mode: RecordingMode) -> Result<(), CaptureError> {
        if self.shared.lock().state.is_active() {
            return Err(CaptureError::RecordingInProgress);
        }
        self.set_state(RecorderState::Starting);
        self.shared.lock().diagnostics = SessionDiagnostics::default();

        if let Err(e) = self.try_start(mode) {
            self.rollback();
            self.set_state(RecorderState::Idle);
            return Err(e);
        }

        self.set_state(RecorderState::Recording { mode });
        Ok(())
    }

    /// Stop the active recording and finalize its output. A stop while
    /// idle is a no-op and returns `Ok(None)`.
    pub fn stop(&mut self) -> Result<Option<RecordingArtifact>, CaptureError> {
        let recording = self.shared.lock().state.is_recording();
        if !recording {
            return Ok(None);
        }
        let mut session = match self.active.take() {
            Some(s) => s,
            None => return Ok(None),
        };

        self.set_state(RecorderState::Stopping);

        // Mic goes first so the system stream cannot trail into an
        // asymmetric tail of mic-only silence.
        if session.mic_started {
            if let Err(e) = self.microphone.stop() {
                log::warn!("microphone stop failed: {}", e);
            }
            session.mic_started = false;
        }
        if session.system_started {
            if let Err(e) = self.system.stop() {
                log::warn!("system source stop failed: {}", e);
            }
            session.system_started = false;
        }

        // Grace period for in-flight buffers to land in the sinks.
        thread::sleep(Duration::from_millis(self.config.stop_grace_millis));

        let duration = session.started_at.elapsed().as_secs_f64();
        let result = self.finalize_session(&mut session);

        let finalized = match result {
            Ok(f) => f,
            Err(e) => {
                if let Some(delegate) = &self.delegate {
                    delegate.on_error(&e);
                }
                self.set_state(RecorderState::Idle);
                return Err(e);
            }
        };

        let metadata_record = RecordingMetadata::new(
            session.mode,
            duration,
            finalized.path.to_string_lossy().as_ref(),
            &finalized.checksum,
            self.config.sample_rate as u32,
            CANONICAL_CHANNELS,
            session.bit_depth,
        );
        if let Err(e) = metadata::write_metadata(&metadata_record, &finalized.path) {
            log::warn!("metadata sidecar write failed: {}", e);
        }

        let artifact = RecordingArtifact {
            file_path: finalized.path,
            duration_secs: duration,
            frames_written: finalized.frames,
            checksum: finalized.checksum,
            metadata: metadata_record,
        };

        if let Some(delegate) = &self.delegate {
            delegate.on_recording_finished(&artifact);
        }
        self.last_artifact = Some(artifact.clone());
        self.set_state(RecorderState::Idle);
        Ok(Some(artifact))
    }

    // --- Start path ---

    fn try_start(&mut self, mode: RecordingMode) -> Result<(), CaptureError> {
        self.config.validate().map_err(CaptureError::SetupFailed)?;
        self.check_permissions(mode)?;
        self.check_sources(mode)?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let tag = &tag[..8];
        let dir = &self.config.output_directory;

        let output_path = dir.join(format!("recording_{}_{}.wav", stamp, tag));
        let bit_depth = if mode == RecordingMode::SyncedMixed {
            24
        } else {
            self.config.bit_depth
        };
        let started_at = Instant::now();

        let mut temp_system = None;
        let mut temp_mic = None;
        let mut system_sink: Option<Arc<dyn BufferSink>> = None;
        let mut mic_sink: Option<Arc<dyn BufferSink>> = None;

        let pipeline = match mode {
            RecordingMode::SystemOnly | RecordingMode::MicrophoneOnly => {
                let sink = Arc::new(FileSink::new(
                    output_path.clone(),
                    self.config.sample_rate,
                    bit_depth,
                ));
                if mode == RecordingMode::SystemOnly {
                    system_sink = Some(sink.clone());
                } else {
                    mic_sink = Some(sink.clone());
                }
                Pipeline::SingleFile { sink }
            }
            RecordingMode::Mixed {
                strategy: MixStrategy::Offline,
            } => {
                let system_path = dir.join(format!("system_{}_{}.wav", stamp, tag));
                let mic_path = dir.join(format!("mic_{}_{}.wav", stamp, tag));
                let system_file = Arc::new(FileSink::new(
                    system_path.clone(),
                    self.config.sample_rate,
                    bit_depth,
                ));
                let mic_file = Arc::new(FileSink::new(
                    mic_path.clone(),
                    self.config.sample_rate,
                    bit_depth,
                ));
                temp_system = Some(system_path);
                temp_mic = Some(mic_path);
                system_sink = Some(system_file.clone());
                mic_sink = Some(mic_file.clone());
                Pipeline::DualOffline {
                    system_sink: system_file,
                    mic_sink: mic_file,
                }
            }
            RecordingMode::Mixed {
                strategy: MixStrategy::Incremental,
            }
            | RecordingMode::SyncedMixed => {
                let capacity = (self.config.sample_rate * LIVE_BUFFER_SECONDS) as usize;
                let system_mem = Arc::new(MemorySink::new(self.config.sample_rate, capacity));
                let mic_mem = Arc::new(MemorySink::new(self.config.sample_rate, capacity));
                let chunk_frames = (self.config.sample_rate
                    * (self.config.live_chunk_millis as f64 / 1000.0))
                    as usize;
                let diagnostics = Arc::new(Mutex::new(SessionDiagnostics::default()));
                let mixer = IncrementalMixer::start(
                    output_path.clone(),
                    self.config.sample_rate,
                    bit_depth,
                    chunk_frames,
                    Duration::from_millis(self.config.live_chunk_millis),
                    Arc::clone(&system_mem),
                    Arc::clone(&mic_mem),
                    diagnostics,
                )?;
                system_sink = Some(system_mem.clone());
                mic_sink = Some(mic_mem.clone());
                Pipeline::DualLive {
                    mixer,
                    system_sink: system_mem,
                    mic_sink: mic_mem,
                }
            }
        };

        let context = if mode == RecordingMode::SyncedMixed {
            CaptureContext::aggregate_for(&self.system.device_info().id, &self.microphone.device_info().id)
        } else {
            CaptureContext::NotConfigured
        };
        match &context {
            CaptureContext::NotConfigured => {}
            CaptureContext::TapConfigured { device_id, .. } => {
                log::debug!("capture tap {} configured", device_id);
            }
            CaptureContext::AggregateReady {
                device_id,
                drift_correction,
            } => {
                log::info!(
                    "aggregate device {} ready (drift correction {})",
                    device_id,
                    drift_correction
                );
            }
        }

        self.active = Some(ActiveSession {
            mode,
            output_path,
            temp_system,
            temp_mic,
            context,
            pipeline,
            system_started: false,
            mic_started: false,
            started_at,
            bit_depth,
        });

        // System audio first; a failed mic start then only has one
        // engine to unwind.
        if mode.needs_system() {
            let sink = system_sink.expect("system sink exists for system modes");
            let callback = self.make_callback(SourceKind::System, sink, started_at);
            self.system.start(callback)?;
            if let Some(session) = self.active.as_mut() {
                session.system_started = true;
            }
        }
        if mode.needs_microphone() {
            let sink = mic_sink.expect("mic sink exists for mic modes");
            let callback = self.make_callback(SourceKind::Microphone, sink, started_at);
            self.microphone.start(callback)?;
            if let Some(session) = self.active.as_mut() {
                session.mic_started = true;
            }
        }

        Ok(())
    }

    /// Verify each required source is backed by a device before any
    /// file is created, and record what the hardware will deliver.
    fn check_sources(&self, mode: RecordingMode) -> Result<(), CaptureError> {
        if mode.needs_system() {
            if !self.system.is_available() {
                return Err(CaptureError::NoAudioDeviceFound);
            }
            let format = self.system.native_format();
            if (format.sample_rate - self.config.sample_rate).abs() > 0.01 {
                log::info!(
                    "system source runs at {} Hz, resampling to {} Hz",
                    format.sample_rate,
                    self.config.sample_rate
                );
            }
        }
        if mode.needs_microphone() {
            if !self.microphone.is_available() {
                return Err(CaptureError::NoAudioDeviceFound);
            }
            let format = self.microphone.native_format();
            if (format.sample_rate - self.config.sample_rate).abs() > 0.01 {
                log::info!(
                    "microphone runs at {} Hz, resampling to {} Hz",
                    format.sample_rate,
                    self.config.sample_rate
                );
            }
        }
        Ok(())
    }

    fn check_permissions(&self, mode: RecordingMode) -> Result<(), CaptureError> {
        if mode.needs_system()
            && !self.permissions.screen_capture_granted()
            && !self.permissions.request_screen_capture()
        {
            return Err(CaptureError::PermissionDenied(
                "screen/audio capture permission was not granted".into(),
            ));
        }
        if mode.needs_microphone() {
            match self.permissions.microphone_status() {
                PermissionStatus::Granted => {}
                PermissionStatus::NotDetermined => {
                    if !self.permissions.request_microphone() {
                        return Err(CaptureError::PermissionDenied(
                            "microphone permission was not granted".into(),
                        ));
                    }
                }
                PermissionStatus::Denied => {
                    return Err(CaptureError::PermissionDenied(
                        "microphone access is denied".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Build the real-time delivery callback for one source. It copies
    /// the buffer, hands it to the sink, and refreshes metering; all
    /// file I/O happens on the sink's own thread.
    fn make_callback(
        &self,
        kind: SourceKind,
        sink: Arc<dyn BufferSink>,
        started_at: Instant,
    ) -> AudioBufferCallback {
        let shared = Arc::clone(&self.shared);
        let delegate = self.delegate.clone();

        Arc::new(move |samples: &[f32], sample_rate: f64, channels: u16| {
            let buffer = PcmBuffer::copy_from(samples, sample_rate, channels, started_at.elapsed());
            sink.write(&buffer);

            let rms = MixEngine::rms_level(samples);
            let peak = MixEngine::peak_level(samples);
            let (levels, callback_count) = {
                let mut s = shared.lock();
                match kind {
                    SourceKind::System => {
                        s.levels.system_rms = rms;
                        s.levels.system_peak = peak;
                        s.diagnostics.system_callback_count += 1;
                        s.diagnostics.system_samples_total += samples.len() as u64;
                        (s.levels, s.diagnostics.system_callback_count)
                    }
                    SourceKind::Microphone => {
                        s.levels.mic_rms = rms;
                        s.levels.mic_peak = peak;
                        s.diagnostics.mic_callback_count += 1;
                        s.diagnostics.mic_samples_total += samples.len() as u64;
                        (s.levels, s.diagnostics.mic_callback_count)
                    }
                }
            };

            if callback_count % 10 == 1 {
                if let Some(delegate) = &delegate {
                    delegate.on_levels_updated(&levels);
                }
            }
        })
    }

    // --- Stop path ---

    fn finalize_session(&mut self, session: &mut ActiveSession) -> Result<FinalizedWav, CaptureError> {
        match &session.pipeline {
            Pipeline::SingleFile { sink } => {
                let finalized = sink.finalize()?;
                self.shared.lock().diagnostics.dropped_writes += sink.dropped_writes();
                Ok(finalized)
            }
            Pipeline::DualOffline {
                system_sink,
                mic_sink,
            } => {
                let system_done = system_sink.finalize()?;
                let mic_done = mic_sink.finalize()?;
                {
                    let mut s = self.shared.lock();
                    s.diagnostics.dropped_writes +=
                        system_sink.dropped_writes() + mic_sink.dropped_writes();
                }

                let mixer = OfflineMixer::new(
                    self.config.sample_rate,
                    self.config.mix_window_frames,
                    session.bit_depth,
                );
                match mixer.mix(
                    Some(&system_done.path),
                    Some(&mic_done.path),
                    session.output_path.clone(),
                ) {
                    Ok(finalized) => {
                        // Temps feed nothing else once the mix exists.
                        fs::remove_file(&system_done.path).ok();
                        fs::remove_file(&mic_done.path).ok();
                        session.temp_system = None;
                        session.temp_mic = None;
                        Ok(finalized)
                    }
                    Err(e) => {
                        // Keep the per-source files so the capture can
                        // be recovered manually.
                        log::error!(
                            "offline mix failed ({}); per-source files kept at {:?} and {:?}",
                            e,
                            system_done.path,
                            mic_done.path
                        );
                        Err(e)
                    }
                }
            }
            Pipeline::DualLive {
                mixer,
                system_sink,
                mic_sink,
            } => {
                let finalized = mixer.finish()?;
                system_sink.clear();
                mic_sink.clear();
                Ok(finalized)
            }
        }
    }

    /// Undo a partial start: stop whatever was running and remove any
    /// partial files, leaving no trace of the failed session.
    fn rollback(&mut self) {
        let Some(session) = self.active.take() else {
            return;
        };

        if session.mic_started {
            let _ = self.microphone.stop();
        }
        if session.system_started {
            let _ = self.system.stop();
        }

        match session.pipeline {
            Pipeline::SingleFile { sink } => {
                let _ = sink.finalize();
            }
            Pipeline::DualOffline {
                system_sink,
                mic_sink,
            } => {
                let _ = system_sink.finalize();
                let _ = mic_sink.finalize();
            }
            Pipeline::DualLive {
                mixer,
                system_sink,
                mic_sink,
            } => {
                let _ = mixer.finish();
                system_sink.clear();
                mic_sink.clear();
            }
        }

        fs::remove_file(&session.output_path).ok();
        if let Some(path) = &session.temp_system {
            fs::remove_file(path).ok();
        }
        if let Some(path) = &session.temp_mic {
            fs::remove_file(path).ok();
        }
        debug_assert!(!session.context.is_ready() || session.mode == RecordingMode::SyncedMixed);
    }

    fn set_state(&self, new_state: RecorderState) {
        self.shared.lock().state = new_state;
        if let Some(delegate) = &self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::{Delivery, SyntheticCapture, SyntheticConfig, TestSignal};
    use crate::models::pcm::PcmFormat;
    use crate::models::source::DeviceInfo;

    const RATE: f64 = 44_100.0;

    fn test_config(name: &str) -> RecorderConfig {
        let dir = std::env::temp_dir().join(format!(
            "duet_controller_{}_{}",
            std::process::id(),
            name
        ));
        RecorderConfig {
            output_directory: dir,
            stop_grace_millis: 20,
            live_chunk_millis: 10,
            ..Default::default()
        }
    }

    fn controller(
        name: &str,
        system_signal: TestSignal,
        mic_signal: TestSignal,
        buffers: usize,
    ) -> RecordingController<SyntheticCapture, SyntheticCapture> {
        let system = SyntheticCapture::new(SyntheticConfig {
            delivery: Delivery::Burst { buffers },
            ..SyntheticConfig::system(system_signal)
        });
        let mic = SyntheticCapture::new(SyntheticConfig {
            delivery: Delivery::Burst { buffers },
            ..SyntheticConfig::microphone(mic_signal)
        });
        RecordingController::new(system, mic, test_config(name))
    }

    fn cleanup(config_dir: &std::path::Path) {
        fs::remove_dir_all(config_dir).ok();
    }

    struct DenyAll;
    impl PermissionGate for DenyAll {
        fn screen_capture_granted(&self) -> bool {
            false
        }
        fn request_screen_capture(&self) -> bool {
            false
        }
        fn microphone_status(&self) -> PermissionStatus {
            PermissionStatus::Denied
        }
        fn request_microphone(&self) -> bool {
            false
        }
    }

    /// Provider whose start always fails, for rollback coverage.
    struct BrokenProvider;
    impl CaptureProvider for BrokenProvider {
        fn is_available(&self) -> bool {
            true
        }
        fn native_format(&self) -> PcmFormat {
            PcmFormat::mono(RATE)
        }
        fn start(&mut self, _: AudioBufferCallback) -> Result<(), CaptureError> {
            Err(CaptureError::CaptureEngineError("engine refused".into()))
        }
        fn stop(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
        fn device_info(&self) -> DeviceInfo {
            DeviceInfo {
                id: "broken".into(),
                name: "Broken".into(),
                kind: SourceKind::Microphone,
                is_default: true,
            }
        }
    }

    /// Provider that reports no backing device.
    struct MissingDevice;
    impl CaptureProvider for MissingDevice {
        fn is_available(&self) -> bool {
            false
        }
        fn native_format(&self) -> PcmFormat {
            PcmFormat::mono(RATE)
        }
        fn start(&mut self, _: AudioBufferCallback) -> Result<(), CaptureError> {
            Err(CaptureError::CaptureEngineError("started without a device".into()))
        }
        fn stop(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }
        fn device_info(&self) -> DeviceInfo {
            DeviceInfo {
                id: "missing".into(),
                name: "Missing".into(),
                kind: SourceKind::Microphone,
                is_default: false,
            }
        }
    }

    fn all_modes() -> [RecordingMode; 5] {
        [
            RecordingMode::SystemOnly,
            RecordingMode::MicrophoneOnly,
            RecordingMode::Mixed {
                strategy: MixStrategy::Offline,
            },
            RecordingMode::Mixed {
                strategy: MixStrategy::Incremental,
            },
            RecordingMode::SyncedMixed,
        ]
    }

    #[test]
    fn start_then_immediate_stop_returns_to_idle_for_every_mode() {
        for (i, mode) in all_modes().into_iter().enumerate() {
            let name = format!("immediate_{}", i);
            let mut ctl = controller(&name, TestSignal::Silence, TestSignal::Silence, 2);
            let dir = ctl.config.output_directory.clone();

            ctl.start(mode).unwrap();
            assert!(ctl.is_recording());
            ctl.stop().unwrap();

            assert!(ctl.state().is_idle(), "mode {:?} did not return to idle", mode);
            let (system, mic) = ctl.sources();
            assert!(!system.is_running(), "system source left running in {:?}", mode);
            assert!(!mic.is_running(), "mic source left running in {:?}", mode);

            cleanup(&dir);
        }
    }

    #[test]
    fn start_while_recording_is_rejected_without_disturbing_session() {
        let mut ctl = controller("double_start", TestSignal::Silence, TestSignal::Silence, 2);
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::MicrophoneOnly).unwrap();
        let path_before = ctl.current_output_path();

        let err = ctl.start(RecordingMode::SystemOnly).unwrap_err();
        assert_eq!(err, CaptureError::RecordingInProgress);
        assert_eq!(
            ctl.state().mode(),
            Some(RecordingMode::MicrophoneOnly),
            "existing session must be unchanged"
        );
        assert_eq!(ctl.current_output_path(), path_before);

        ctl.stop().unwrap();
        cleanup(&dir);
    }

    #[test]
    fn stop_while_idle_is_a_quiet_no_op_even_twice() {
        let mut ctl = controller("idle_stop", TestSignal::Silence, TestSignal::Silence, 2);
        let dir = ctl.config.output_directory.clone();

        assert_eq!(ctl.stop().unwrap(), None);
        assert_eq!(ctl.stop().unwrap(), None);
        assert!(ctl.state().is_idle());

        cleanup(&dir);
    }

    #[test]
    fn single_source_round_trip_preserves_frame_count() {
        let buffers = 8;
        let mut ctl = controller("round_trip", TestSignal::Constant(0.25), TestSignal::Silence, buffers);
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::SystemOnly).unwrap();
        thread::sleep(Duration::from_millis(100));
        let artifact = ctl.stop().unwrap().expect("artifact for active recording");

        let expected = (buffers * 1024) as i64;
        let got = artifact.frames_written as i64;
        assert!(
            (got - expected).abs() <= 1024,
            "expected ~{} frames, got {}",
            expected,
            got
        );
        assert!(fs::metadata(&artifact.file_path).unwrap().len() > 0);

        cleanup(&dir);
    }

    #[test]
    fn offline_mixed_recording_produces_one_file_and_removes_temps() {
        let mut ctl = controller(
            "offline_mix",
            TestSignal::Constant(0.4),
            TestSignal::Constant(0.2),
            4,
        );
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::Mixed {
            strategy: MixStrategy::Offline,
        })
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        let artifact = ctl.stop().unwrap().unwrap();

        assert!(artifact.file_path.exists());
        assert!(artifact.frames_written > 0);

        // Only the final output (and its sidecar) remain.
        let leftovers: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("system_") || n.starts_with("mic_"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);

        cleanup(&dir);
    }

    #[test]
    fn live_mixed_recording_applies_gain_formula() {
        let mut ctl = controller(
            "live_mix",
            TestSignal::Constant(0.4),
            TestSignal::Constant(0.2),
            4,
        );
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::Mixed {
            strategy: MixStrategy::Incremental,
        })
        .unwrap();
        thread::sleep(Duration::from_millis(100));
        let artifact = ctl.stop().unwrap().unwrap();

        let samples: Vec<f32> = hound::WavReader::open(&artifact.file_path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap() as f32 / i16::MAX as f32)
            .collect();
        assert!(!samples.is_empty());
        // Overlapping region mixes to 0.75*0.4 + 0.50*0.2 = 0.4; any
        // arrival-order tail holds a single-source value instead.
        for &s in &samples {
            assert!(
                (s - 0.4).abs() < 1e-3 || (s - 0.3).abs() < 1e-3 || (s - 0.1).abs() < 1e-3,
                "unexpected mixed sample {}",
                s
            );
        }

        cleanup(&dir);
    }

    #[test]
    fn synced_mode_writes_24_bit_output() {
        let mut ctl = controller("synced", TestSignal::Constant(0.1), TestSignal::Silence, 2);
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::SyncedMixed).unwrap();
        thread::sleep(Duration::from_millis(60));
        let artifact = ctl.stop().unwrap().unwrap();

        let spec = hound::WavReader::open(&artifact.file_path).unwrap().spec();
        assert_eq!(spec.bits_per_sample, 24);
        assert_eq!(artifact.metadata.bit_depth, 24);

        cleanup(&dir);
    }

    #[test]
    fn denied_permissions_fail_start_and_stay_idle() {
        let mut ctl = controller("denied", TestSignal::Silence, TestSignal::Silence, 2);
        let dir = ctl.config.output_directory.clone();
        ctl.set_permission_gate(Arc::new(DenyAll));

        let err = ctl.start(RecordingMode::MicrophoneOnly).unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert!(err.remediation().is_some());
        assert!(ctl.state().is_idle());
        assert_eq!(ctl.current_output_path(), None);

        cleanup(&dir);
    }

    #[test]
    fn failed_mic_start_rolls_back_system_source_and_files() {
        let system = SyntheticCapture::new(SyntheticConfig::system(TestSignal::Constant(0.3)));
        let mut ctl =
            RecordingController::new(system, BrokenProvider, test_config("rollback"));
        let dir = ctl.config.output_directory.clone();

        let err = ctl
            .start(RecordingMode::Mixed {
                strategy: MixStrategy::Offline,
            })
            .unwrap_err();
        assert!(matches!(err, CaptureError::CaptureEngineError(_)));
        assert!(ctl.state().is_idle());
        assert!(!ctl.sources().0.is_running(), "system source must be unwound");

        // No partial output or temp files survive the rollback.
        if dir.exists() {
            let leftovers: Vec<_> = fs::read_dir(&dir)
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect();
            assert!(leftovers.is_empty(), "rollback left files: {:?}", leftovers);
        }

        cleanup(&dir);
    }

    #[test]
    fn missing_microphone_device_fails_start_before_any_file_exists() {
        let system = SyntheticCapture::new(SyntheticConfig::system(TestSignal::Silence));
        let mut ctl = RecordingController::new(system, MissingDevice, test_config("no_device"));
        let dir = ctl.config.output_directory.clone();

        let err = ctl
            .start(RecordingMode::Mixed {
                strategy: MixStrategy::Offline,
            })
            .unwrap_err();
        assert_eq!(err, CaptureError::NoAudioDeviceFound);
        assert!(ctl.state().is_idle());
        assert!(!ctl.sources().0.is_running());
        assert!(
            !dir.exists(),
            "device availability must be checked before any file is created"
        );

        cleanup(&dir);
    }

    #[test]
    fn missing_display_surfaces_no_display_found() {
        let system = SyntheticCapture::new(SyntheticConfig {
            display_attached: false,
            ..SyntheticConfig::system(TestSignal::Silence)
        });
        let mic = SyntheticCapture::new(SyntheticConfig::microphone(TestSignal::Silence));
        let mut ctl = RecordingController::new(system, mic, test_config("no_display"));
        let dir = ctl.config.output_directory.clone();

        let err = ctl.start(RecordingMode::SystemOnly).unwrap_err();
        assert_eq!(err, CaptureError::NoDisplayFound);
        assert!(ctl.state().is_idle());

        cleanup(&dir);
    }

    #[test]
    fn output_path_is_retained_until_taken() {
        let mut ctl = controller("retained", TestSignal::Constant(0.2), TestSignal::Silence, 2);
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::SystemOnly).unwrap();
        thread::sleep(Duration::from_millis(60));
        let artifact = ctl.stop().unwrap().unwrap();

        assert_eq!(ctl.current_output_path(), Some(artifact.file_path.clone()));
        let taken = ctl.take_artifact().unwrap();
        assert_eq!(taken, artifact);
        assert_eq!(ctl.current_output_path(), None);
        assert!(ctl.take_artifact().is_none());

        cleanup(&dir);
    }

    #[test]
    fn metadata_sidecar_accompanies_the_recording() {
        let mut ctl = controller("sidecar", TestSignal::Constant(0.2), TestSignal::Silence, 2);
        let dir = ctl.config.output_directory.clone();

        ctl.start(RecordingMode::SystemOnly).unwrap();
        thread::sleep(Duration::from_millis(60));
        let artifact = ctl.stop().unwrap().unwrap();

        let sidecar = metadata::read_metadata(&artifact.file_path).unwrap();
        assert_eq!(sidecar, artifact.metadata);
        assert_eq!(sidecar.mode, RecordingMode::SystemOnly);
        assert_eq!(sidecar.tracks, vec![SourceKind::System]);
        assert_eq!(sidecar.channels, CANONICAL_CHANNELS);

        cleanup(&dir);
    }
}
