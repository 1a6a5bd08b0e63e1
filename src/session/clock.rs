use std::cell::RefCell;
use std::time::Duration;

/// Frame pacing imposed on the render loop while any capture is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameRateOverride {
    /// Real-time pacing, no capture running.
    #[default]
    None,
    /// Every tick advances logical time by exactly `1 / fps`, however long it really took.
    FixedStep {
        /// Frames per second.
        fps: u32,
    },
    /// Ask the loop to run at `fps` real ticks per second; logical time follows real time.
    TargetRate {
        /// Frames per second.
        fps: u32,
    },
}

impl FrameRateOverride {
    /// The override a session with these settings asks for.
    pub fn for_session(fps: u32, allow_slow_down: bool) -> Self {
        if allow_slow_down {
            Self::FixedStep { fps }
        } else {
            Self::TargetRate { fps }
        }
    }
}

/// Length of one frame at `fps`, truncated to whole nanoseconds.
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1)))
}

/// Counters for override transitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockStats {
    /// Times an override was applied.
    pub applied: u64,
    /// Times an override was cleared.
    pub cleared: u64,
}

#[derive(Debug, Default)]
struct ClockState {
    active: usize,
    current: FrameRateOverride,
    stats: ClockStats,
}

/// Shared pacing context for all capture sessions of one render loop.
///
/// The override is applied only when the active count goes 0 -> 1 and cleared only when it goes
/// 1 -> 0. The session that triggers the first edge picks the mode; later sessions do not change
/// it. All mutation happens on the render loop thread, so interior mutability through `RefCell`
/// is enough; a multi-threaded loop would need a `Mutex` around `ClockState`.
#[derive(Debug, Default)]
pub struct GlobalClock {
    state: RefCell<ClockState>,
}

impl GlobalClock {
    /// Clock with no active sessions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly active session, applying `request` if it is the first one.
    pub fn on_session_activated(&self, request: FrameRateOverride) {
        let mut st = self.state.borrow_mut();
        st.active += 1;
        if st.active == 1 {
            st.current = request;
            st.stats.applied += 1;
            tracing::debug!(?request, "frame rate override applied");
        } else if st.current != request {
            tracing::warn!(
                current = ?st.current,
                ignored = ?request,
                "capture sessions disagree on frame pacing; keeping the first session's mode"
            );
        }
    }

    /// Unregister an active session, clearing the override if it was the last one.
    pub fn on_session_deactivated(&self) {
        let mut st = self.state.borrow_mut();
        if st.active == 0 {
            tracing::warn!("session deactivated with no active sessions; ignoring");
            return;
        }
        st.active -= 1;
        if st.active == 0 {
            tracing::debug!(previous = ?st.current, "frame rate override cleared");
            st.current = FrameRateOverride::None;
            st.stats.cleared += 1;
        }
    }

    /// Sessions currently holding the clock.
    pub fn active_count(&self) -> usize {
        self.state.borrow().active
    }

    /// The override in force.
    pub fn current_override(&self) -> FrameRateOverride {
        self.state.borrow().current
    }

    /// Transition counters.
    pub fn stats(&self) -> ClockStats {
        self.state.borrow().stats
    }

    /// Logical time step for a tick that took `real_elapsed`.
    pub fn step(&self, real_elapsed: Duration) -> Duration {
        match self.current_override() {
            FrameRateOverride::FixedStep { fps } if fps > 0 => frame_interval(fps),
            _ => real_elapsed,
        }
    }

    /// Real-time interval the loop should aim for between ticks, if any.
    pub fn pacing_interval(&self) -> Option<Duration> {
        match self.current_override() {
            FrameRateOverride::TargetRate { fps } if fps > 0 => Some(frame_interval(fps)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLOW: FrameRateOverride = FrameRateOverride::FixedStep { fps: 30 };

    #[test]
    fn override_follows_first_and_last_edges_only() {
        let clock = GlobalClock::new();
        clock.on_session_activated(SLOW);
        assert_eq!(clock.current_override(), SLOW);
        clock.on_session_activated(FrameRateOverride::TargetRate { fps: 60 });
        assert_eq!(clock.current_override(), SLOW);
        clock.on_session_deactivated();
        assert_eq!(clock.current_override(), SLOW);
        clock.on_session_deactivated();
        assert_eq!(clock.current_override(), FrameRateOverride::None);
        assert_eq!(
            clock.stats(),
            ClockStats {
                applied: 1,
                cleared: 1
            }
        );
    }

    #[test]
    fn interleaved_sequences_apply_once_per_busy_run() {
        // 1 = activate, 0 = deactivate. Every prefix keeps the count non-negative.
        let seqs: [&[u8]; 4] = [
            &[1, 0, 1, 0],
            &[1, 1, 0, 1, 0, 0],
            &[1, 1, 1, 0, 0, 0, 1, 0],
            &[1, 0, 1, 1, 0, 0, 1, 1, 0],
        ];
        for seq in seqs {
            let clock = GlobalClock::new();
            let mut count = 0usize;
            let mut runs = 0u64;
            for &op in seq {
                if op == 1 {
                    if count == 0 {
                        runs += 1;
                    }
                    count += 1;
                    clock.on_session_activated(SLOW);
                } else {
                    count -= 1;
                    clock.on_session_deactivated();
                }
                assert_eq!(clock.active_count(), count);
            }
            let st = clock.stats();
            assert_eq!(st.applied, runs, "{seq:?}");
            let expected_cleared = if count == 0 { runs } else { runs - 1 };
            assert_eq!(st.cleared, expected_cleared, "{seq:?}");
        }
    }

    #[test]
    fn stray_deactivation_is_ignored() {
        let clock = GlobalClock::new();
        clock.on_session_deactivated();
        assert_eq!(clock.active_count(), 0);
        assert_eq!(clock.stats(), ClockStats::default());
    }

    #[test]
    fn fixed_step_ignores_real_time() {
        let clock = GlobalClock::new();
        let real = Duration::from_millis(250);
        assert_eq!(clock.step(real), real);
        assert_eq!(clock.pacing_interval(), None);

        clock.on_session_activated(FrameRateOverride::for_session(50, true));
        assert_eq!(clock.step(real), Duration::from_millis(20));
        assert_eq!(clock.pacing_interval(), None);
    }

    #[test]
    fn target_rate_paces_in_real_time() {
        let clock = GlobalClock::new();
        clock.on_session_activated(FrameRateOverride::for_session(25, false));
        let real = Duration::from_millis(70);
        assert_eq!(clock.step(real), real);
        assert_eq!(clock.pacing_interval(), Some(Duration::from_millis(40)));
    }
}
