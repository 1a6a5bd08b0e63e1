use crate::foundation::core::FrameRGBA;
use crate::render::engine::RenderEngine;
use crate::session::capture::FrameOutcome;
use crate::session::clock::GlobalClock;
use crate::session::registry::SessionHandle;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Result of one [`FrameLoop::tick`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 0-based index of the tick just run.
    pub frame: u64,
    /// Logical time step applied this tick.
    pub dt: Duration,
    /// Logical time the frame was rendered at.
    pub time: Duration,
    /// Per-session outcome, in the order sessions were passed in.
    pub outcomes: Vec<FrameOutcome>,
}

impl TickReport {
    /// Sessions that wrote a frame this tick.
    pub fn written(&self) -> usize {
        self.count(FrameOutcome::Written)
    }

    fn count(&self, outcome: FrameOutcome) -> usize {
        self.outcomes.iter().filter(|o| **o == outcome).count()
    }
}

/// Running totals over the ticks of one [`FrameLoop::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Frames handed to an encoder.
    pub written: u64,
    /// Frames lost to extraction or write failures.
    pub dropped: u64,
    /// Sessions closed because their encoder went away.
    pub terminated: u64,
}

impl RunSummary {
    /// Fold one tick into the totals.
    pub fn record(&mut self, tick: &TickReport) {
        self.ticks += 1;
        self.written += tick.written() as u64;
        self.dropped += tick.count(FrameOutcome::Dropped) as u64;
        self.terminated += tick.count(FrameOutcome::Terminated) as u64;
    }
}

/// Drives rendering and capture, one synchronous call per tick.
///
/// Each tick: the clock picks the logical step, every session updates (and starts pending
/// captures), the engine renders the screen frame, then each active session extracts and writes
/// its frame. Capture failures are logged by the sessions and never abort the tick.
pub struct FrameLoop<E: RenderEngine> {
    engine: E,
    clock: Rc<GlobalClock>,
    screen: FrameRGBA,
    time: Duration,
    frame: u64,
}

impl<E: RenderEngine> FrameLoop<E> {
    /// Loop over `engine`, stepping time through `clock`.
    pub fn new(engine: E, clock: Rc<GlobalClock>) -> Self {
        let screen = FrameRGBA::new(engine.viewport());
        Self {
            engine,
            clock,
            screen,
            time: Duration::ZERO,
            frame: 0,
        }
    }

    /// The driven engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the driven engine, e.g. to resize its viewport.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The clock shared with the sessions.
    pub fn clock(&self) -> &Rc<GlobalClock> {
        &self.clock
    }

    /// Logical time of the last rendered frame.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// The screen frame rendered on the last tick.
    pub fn screen(&self) -> &FrameRGBA {
        &self.screen
    }

    /// Run one tick that took `real_elapsed` of wall time since the previous one.
    #[tracing::instrument(level = "trace", skip(self, sessions), fields(frame = self.frame))]
    pub fn tick(&mut self, sessions: &[SessionHandle], real_elapsed: Duration) -> TickReport {
        let dt = self.clock.step(real_elapsed);
        self.time += dt;

        for s in sessions {
            match s.try_borrow_mut() {
                Ok(mut s) => s.update(&mut self.engine, dt),
                Err(_) => tracing::warn!("session busy during update; skipped"),
            }
        }

        let viewport = self.engine.viewport();
        if self.screen.size() != viewport {
            self.screen = FrameRGBA::new(viewport);
        }
        if let Err(e) = self.engine.render(&mut self.screen, self.time) {
            tracing::error!(frame = self.frame, "render failed: {e}");
        }

        let outcomes = sessions
            .iter()
            .map(|s| match s.try_borrow_mut() {
                Ok(mut s) => s.capture_frame(&mut self.engine, &self.screen, self.time),
                Err(_) => FrameOutcome::NotCapturing,
            })
            .collect();

        let report = TickReport {
            frame: self.frame,
            dt,
            time: self.time,
            outcomes,
        };
        self.frame += 1;
        report
    }

    /// Run `frames` ticks against the wall clock, sleeping to honour the clock's pacing hint
    /// when `paced` is set. Only the totals are kept.
    pub fn run(&mut self, sessions: &[SessionHandle], frames: u64, paced: bool) -> RunSummary {
        self.run_with(sessions, frames, paced, |_| ControlFlow::Continue(()))
    }

    /// Like [`FrameLoop::run`], handing each tick's report to `on_tick` once it is folded in.
    /// Returning `Break` from `on_tick` ends the run early.
    pub fn run_with(
        &mut self,
        sessions: &[SessionHandle],
        frames: u64,
        paced: bool,
        mut on_tick: impl FnMut(&TickReport) -> ControlFlow<()>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut last = Instant::now();
        for _ in 0..frames {
            let tick_start = Instant::now();
            let real_elapsed = tick_start.duration_since(last);
            last = tick_start;
            let report = self.tick(sessions, real_elapsed);
            summary.record(&report);
            if on_tick(&report).is_break() {
                break;
            }

            if paced && let Some(interval) = self.clock.pacing_interval() {
                let spent = tick_start.elapsed();
                if spent < interval {
                    std::thread::sleep(interval - spent);
                }
            }
        }
        summary
    }
}
