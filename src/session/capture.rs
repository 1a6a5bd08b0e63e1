use crate::config::CaptureSettings;
use crate::encode::pipe::{EncoderConfig, EncoderPipe, PipeReport, locate_encoder};
use crate::foundation::core::{FrameRGBA, Resolution};
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::engine::RenderEngine;
use crate::render::extract::PixelExtractor;
use crate::session::clock::{FrameRateOverride, GlobalClock};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// Lifecycle of a [`CaptureSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Not capturing.
    Idle,
    /// Capture requested; the pipe is spawned on the next `update`.
    Opening,
    /// The pipe is running and frames are written each tick.
    Active,
    /// The pipe is being shut down.
    Closing,
}

/// What happened to the frame offered to a session on one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The session has no running pipe.
    NotCapturing,
    /// The frame fell outside the record window.
    OutsideWindow,
    /// The frame reached the encoder.
    Written,
    /// Extraction or the write failed; the session keeps going.
    Dropped,
    /// The encoder is gone; the session has been closed.
    Terminated,
}

struct ActiveCapture {
    extractor: PixelExtractor,
    pipe: EncoderPipe,
}

/// One capture source bound to one encoder pipe.
///
/// `open` only validates and records the request; the pipe is created on the next
/// [`CaptureSession::update`], where the engine is available. `close` is immediate. Dropping an
/// active session closes it the same way `close` does, so no encoder process outlives it.
pub struct CaptureSession {
    name: String,
    settings: CaptureSettings,
    encoder: EncoderConfig,
    clock: Rc<GlobalClock>,

    state: SessionState,
    enabled: bool,
    elapsed: Duration,
    active: Option<ActiveCapture>,

    frames_dropped: u64,
    last_report: Option<PipeReport>,
}

impl CaptureSession {
    /// Create an idle session. Opens it right away when `settings.capturing` is set.
    pub fn new(
        name: impl Into<String>,
        settings: CaptureSettings,
        encoder: EncoderConfig,
        clock: Rc<GlobalClock>,
    ) -> CaptureResult<Self> {
        settings.validate()?;
        let mut session = Self {
            name: name.into(),
            settings,
            encoder,
            clock,
            state: SessionState::Idle,
            enabled: true,
            elapsed: Duration::ZERO,
            active: None,
            frames_dropped: 0,
            last_report: None,
        };
        if session.settings.capturing
            && let Err(e) = session.open()
        {
            tracing::debug!(session = %session.name, "not capturing at setup: {e}");
        }
        Ok(session)
    }

    /// Registry name, also used in output file names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings the session was created with.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Capture has been requested or is running.
    pub fn is_capturing(&self) -> bool {
        matches!(self.state, SessionState::Opening | SessionState::Active)
    }

    /// The pipe is running.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// `false` once a missing encoder disabled the session.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Re-enable a session that disabled itself after a missing encoder.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Time accumulated over every `update`, capturing or not.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Frames written by the running pipe; see [`CaptureSession::last_report`] once closed.
    pub fn frames_written(&self) -> u64 {
        self.active
            .as_ref()
            .map(|a| a.pipe.frames_written())
            .unwrap_or(0)
    }

    /// Frames lost over the session's lifetime.
    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    /// Output path of the running pipe.
    pub fn output_filename(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.pipe.filename())
    }

    /// Frame size shared by the extractor and the running pipe.
    pub fn output_size(&self) -> Option<Resolution> {
        self.active.as_ref().map(|a| a.extractor.output_size())
    }

    /// Report of the most recently closed pipe.
    pub fn last_report(&self) -> Option<&PipeReport> {
        self.last_report.as_ref()
    }

    /// Request capture. Fails, and disables the session, when the encoder cannot be found.
    pub fn open(&mut self) -> CaptureResult<()> {
        if !self.enabled {
            tracing::error!(session = %self.name, "capture is disabled; re-enable it first");
            return Err(CaptureError::Disabled(self.name.clone()));
        }
        if self.state != SessionState::Idle {
            return Ok(());
        }
        if let Err(e) = locate_encoder(&self.encoder.program) {
            tracing::error!(session = %self.name, "{e}");
            self.enabled = false;
            return Err(e);
        }
        self.state = SessionState::Opening;
        Ok(())
    }

    /// Stop capturing. A pending request is simply cancelled.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Opening => self.state = SessionState::Idle,
            SessionState::Active => self.close_pipe(),
            SessionState::Idle | SessionState::Closing => {}
        }
    }

    /// Per-tick bookkeeping: advance elapsed time and start a requested capture.
    pub fn update(&mut self, engine: &mut dyn RenderEngine, dt: Duration) {
        self.elapsed += dt;
        if self.state == SessionState::Opening {
            self.activate(engine);
        }
    }

    fn activate(&mut self, engine: &mut dyn RenderEngine) {
        match self.start_capture(engine) {
            Ok(active) => {
                tracing::info!(
                    session = %self.name,
                    size = %active.extractor.output_size(),
                    "capture started ({})",
                    active.pipe.filename().display()
                );
                self.clock.on_session_activated(FrameRateOverride::for_session(
                    self.settings.frame_rate,
                    self.settings.allow_slow_down,
                ));
                self.active = Some(active);
                self.state = SessionState::Active;
            }
            Err(e) => {
                tracing::error!(session = %self.name, "failed to start capture: {e}");
                if matches!(e, CaptureError::Availability(_)) {
                    self.enabled = false;
                }
                self.state = SessionState::Idle;
            }
        }
    }

    fn start_capture(&self, engine: &mut dyn RenderEngine) -> CaptureResult<ActiveCapture> {
        let extractor = if self.settings.set_resolution {
            PixelExtractor::with_render_target(engine, self.settings.resolution()?)?
        } else {
            PixelExtractor::for_viewport(engine.viewport())
        };
        let pipe = EncoderPipe::open(
            &self.encoder,
            &self.name,
            extractor.output_size(),
            self.settings.frame_rate,
            self.settings.preset,
        )?;
        Ok(ActiveCapture { extractor, pipe })
    }

    /// Extract this tick's frame and hand it to the encoder. Never fails the caller.
    pub fn capture_frame(
        &mut self,
        engine: &mut dyn RenderEngine,
        screen: &FrameRGBA,
        time: Duration,
    ) -> FrameOutcome {
        if self.state != SessionState::Active {
            return FrameOutcome::NotCapturing;
        }
        if let Some(window) = self.settings.record_window
            && !window.contains(self.elapsed)
        {
            return FrameOutcome::OutsideWindow;
        }
        let Some(active) = self.active.as_mut() else {
            return FrameOutcome::NotCapturing;
        };

        let result = active
            .extractor
            .capture(engine, screen, time)
            .and_then(|bytes| active.pipe.write(&bytes));
        match result {
            Ok(()) => FrameOutcome::Written,
            Err(e) if e.is_fatal_to_session() => {
                tracing::error!(session = %self.name, "{e}; closing capture");
                self.close_pipe();
                FrameOutcome::Terminated
            }
            Err(e) => {
                self.frames_dropped += 1;
                tracing::warn!(
                    session = %self.name,
                    dropped = self.frames_dropped,
                    "frame dropped: {e}"
                );
                FrameOutcome::Dropped
            }
        }
    }

    fn close_pipe(&mut self) {
        let Some(ActiveCapture { extractor, pipe }) = self.active.take() else {
            self.state = SessionState::Idle;
            return;
        };
        self.state = SessionState::Closing;
        drop(extractor);

        tracing::info!(session = %self.name, "capture ended ({})", pipe.filename().display());
        match pipe.close() {
            Ok(report) => {
                if !report.diagnostics.is_empty() {
                    tracing::warn!(
                        session = %self.name,
                        "encoder returned with a warning or an error message:\n{}",
                        report.diagnostics
                    );
                }
                if !report.status.success() {
                    tracing::warn!(
                        session = %self.name,
                        status = %report.status,
                        "encoder exited unsuccessfully"
                    );
                }
                self.last_report = Some(report);
            }
            Err(e) => tracing::error!(session = %self.name, "failed to close encoder: {e}"),
        }

        self.clock.on_session_deactivated();
        self.state = SessionState::Idle;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.close_pipe();
        }
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pattern::TestPatternEngine;

    fn missing_encoder() -> EncoderConfig {
        EncoderConfig::default().with_program("definitely/not/here/ffmpeg")
    }

    #[test]
    fn missing_encoder_disables_session() {
        let clock = Rc::new(GlobalClock::new());
        let mut s = CaptureSession::new(
            "cam",
            CaptureSettings::default(),
            missing_encoder(),
            clock.clone(),
        )
        .unwrap();

        let err = s.open().unwrap_err();
        assert!(matches!(err, CaptureError::Availability(_)));
        assert!(!s.is_enabled());
        assert!(!s.is_capturing());
        assert_eq!(s.state(), SessionState::Idle);

        let err = s.open().unwrap_err();
        assert!(matches!(err, CaptureError::Disabled(_)));
        assert_eq!(clock.active_count(), 0);
    }

    #[test]
    fn enable_allows_another_open_attempt() {
        let mut s = CaptureSession::new(
            "cam",
            CaptureSettings::default(),
            missing_encoder(),
            Rc::new(GlobalClock::new()),
        )
        .unwrap();
        assert!(matches!(s.open(), Err(CaptureError::Availability(_))));
        assert!(matches!(s.open(), Err(CaptureError::Disabled(_))));

        s.enable();
        assert!(s.is_enabled());
        assert!(matches!(s.open(), Err(CaptureError::Availability(_))));
        assert!(!s.is_enabled());
    }

    #[test]
    fn capturing_at_setup_with_missing_encoder_is_not_fatal() {
        let settings = CaptureSettings {
            capturing: true,
            ..CaptureSettings::default()
        };
        let s = CaptureSession::new("cam", settings, missing_encoder(), Rc::new(GlobalClock::new()))
            .unwrap();
        assert!(!s.is_enabled());
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn elapsed_accumulates_while_idle() {
        let mut engine = TestPatternEngine::new(Resolution::new(16, 16).unwrap());
        let mut s = CaptureSession::new(
            "cam",
            CaptureSettings::default(),
            missing_encoder(),
            Rc::new(GlobalClock::new()),
        )
        .unwrap();
        s.update(&mut engine, Duration::from_millis(10));
        s.update(&mut engine, Duration::from_millis(15));
        assert_eq!(s.elapsed(), Duration::from_millis(25));

        let screen = FrameRGBA::new(engine.viewport());
        assert_eq!(
            s.capture_frame(&mut engine, &screen, Duration::ZERO),
            FrameOutcome::NotCapturing
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = CaptureSettings {
            frame_rate: 0,
            ..CaptureSettings::default()
        };
        assert!(
            CaptureSession::new("cam", settings, missing_encoder(), Rc::new(GlobalClock::new()))
                .is_err()
        );
    }

    #[test]
    fn close_when_idle_is_a_no_op() {
        let clock = Rc::new(GlobalClock::new());
        let mut s =
            CaptureSession::new("cam", CaptureSettings::default(), missing_encoder(), clock.clone())
                .unwrap();
        s.close();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(clock.stats().cleared, 0);
    }
}
