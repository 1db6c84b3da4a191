//! Drive loops
//!
//! The poll controller repeatedly samples the screen until a target state or
//! timeout; the cycle pilot runs full perception-decision-action cycles.
//! Both are single-threaded and strictly sequential: one frame in flight at
//! a time, suspension only at the inter-cycle sleep, and a cooperative
//! cancellation check once per cycle boundary.

pub mod audit;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PilotConfig;
use crate::device::{ActionExecutor, FrameSource};
use crate::stealth::Humanizer;
use crate::vision::{ScreenClassifier, ScreenState, TemplateLibrary};
use crate::{Action, Pilot};

pub use audit::{AuditError, AuditSink, CycleRecord, JsonLinesAudit, NullAudit};

/// Cooperative cancellation signal, checked once per cycle boundary
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal value of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOutcome {
    pub success: bool,
    /// Number of capture attempts made
    pub cycles: u32,
    /// State observed on the last attempt
    pub final_state: ScreenState,
}

/// Why a session ended before running all requested cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// The executor failed this many consecutive times
    ActuatorDegraded { failures: u32 },
    Cancelled,
}

/// Record of a multi-cycle drive run
#[derive(Debug, Default)]
pub struct SessionReport {
    pub records: Vec<CycleRecord>,
    pub halted: Option<HaltReason>,
}

/// Bounded retry loop that samples the screen state until a target condition
/// or timeout.
///
/// Timeout accounting is deterministic: elapsed time is the accumulated
/// interval (attempts so far times the interval), not the wall clock. An
/// attempt whose accumulated elapsed time equals `max_wait` exactly is still
/// evaluated, so a target state observed at exactly `max_wait` counts as
/// success.
pub struct PollController<S: FrameSource> {
    source: S,
    classifier: ScreenClassifier,
    cancel: CancelToken,
}

impl<S: FrameSource> PollController<S> {
    pub fn new(source: S, config: &PilotConfig) -> Self {
        Self {
            source,
            classifier: ScreenClassifier::new(&config.classifier),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Poll until `target` holds for the classified state or `max_wait`
    /// elapses. A capture failure skips classification for that attempt and
    /// retries after `interval`; the attempt still counts.
    pub fn poll_until<P>(&mut self, target: P, interval: Duration, max_wait: Duration) -> PollOutcome
    where
        P: Fn(ScreenState) -> bool,
    {
        let mut elapsed = Duration::ZERO;
        let mut cycles = 0u32;
        let mut last_state = ScreenState::Unknown;

        loop {
            if self.cancel.is_cancelled() {
                log::info!("poll cancelled after {cycles} attempts");
                return PollOutcome {
                    success: false,
                    cycles,
                    final_state: last_state,
                };
            }

            cycles += 1;
            match self.source.capture_frame() {
                Ok(frame) => {
                    let classification = self.classifier.classify(&frame);
                    last_state = classification.state;
                    log::debug!(
                        "poll attempt {cycles}: {:?} ({:?})",
                        classification.state,
                        classification.confidence
                    );
                    if target(classification.state) {
                        return PollOutcome {
                            success: true,
                            cycles,
                            final_state: last_state,
                        };
                    }
                }
                Err(e) => {
                    log::warn!("poll attempt {cycles}: frame capture failed: {e}");
                    last_state = ScreenState::Unknown;
                }
            }

            if elapsed >= max_wait {
                log::info!("poll timed out after {cycles} attempts");
                return PollOutcome {
                    success: false,
                    cycles,
                    final_state: last_state,
                };
            }

            std::thread::sleep(interval);
            elapsed += interval;
        }
    }
}

/// Drives full capture -> classify -> locate -> decide -> execute cycles
pub struct CyclePilot<S: FrameSource, A: ActionExecutor> {
    source: S,
    executor: A,
    pilot: Pilot,
    humanizer: Humanizer,
    humanize: crate::config::HumanizeSettings,
    max_consecutive_failures: u32,
    audit: Box<dyn AuditSink>,
    cancel: CancelToken,
}

impl<S: FrameSource, A: ActionExecutor> CyclePilot<S, A> {
    pub fn new(source: S, executor: A, config: &PilotConfig, templates: TemplateLibrary) -> Self {
        Self {
            source,
            executor,
            pilot: Pilot::new(config, templates),
            humanizer: Humanizer::new(),
            humanize: config.humanize,
            max_consecutive_failures: config.actuator.max_consecutive_failures,
            audit: Box::new(NullAudit),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run up to `cycles` perception-decision-action cycles, sleeping
    /// `interval` between them. Every cycle appends one record to the audit
    /// sink and the report. Repeated consecutive tap failures halt the run
    /// as actuator-degraded instead of retrying forever.
    pub fn run_cycles(&mut self, cycles: u32, interval: Duration) -> SessionReport {
        let mut report = SessionReport::default();
        let mut consecutive_failures = 0u32;

        for cycle in 1..=cycles {
            if self.cancel.is_cancelled() {
                log::info!("session cancelled at cycle {cycle}");
                report.halted = Some(HaltReason::Cancelled);
                break;
            }

            let frame = match self.source.capture_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("cycle {cycle}: frame capture failed: {e}");
                    self.record(&mut report, CycleRecord::skipped(cycle));
                    self.sleep_between(cycle, cycles, interval);
                    continue;
                }
            };

            let observation = self.pilot.process_frame(&frame);
            log::info!(
                "cycle {cycle}: {:?}, tier {} -> {:?}",
                observation.classification.state,
                observation.decision.tier,
                observation.decision.action
            );

            let action_ok = match observation.decision.action {
                Action::Tap { x, y } => {
                    let (x, y) = self.humanized_target(x, y, frame.dimensions());
                    match self.executor.tap(x, y) {
                        Ok(()) => {
                            consecutive_failures = 0;
                            Some(true)
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            log::warn!(
                                "cycle {cycle}: tap failed ({consecutive_failures} in a row): {e}"
                            );
                            Some(false)
                        }
                    }
                }
                Action::Wait => None,
            };

            let (color, template, edge) = observation.candidates.counts();
            self.record(
                &mut report,
                CycleRecord {
                    cycle,
                    classification: Some(observation.classification),
                    color_candidates: color,
                    template_candidates: template,
                    edge_candidates: edge,
                    decision: Some(observation.decision),
                    action_ok,
                },
            );

            if self.max_consecutive_failures > 0
                && consecutive_failures >= self.max_consecutive_failures
            {
                log::error!("actuator degraded: {consecutive_failures} consecutive tap failures");
                report.halted = Some(HaltReason::ActuatorDegraded {
                    failures: consecutive_failures,
                });
                break;
            }

            self.sleep_between(cycle, cycles, interval);
        }

        report
    }

    fn record(&mut self, report: &mut SessionReport, record: CycleRecord) {
        if let Err(e) = self.audit.append(&record) {
            log::error!("audit append failed: {e}");
        }
        report.records.push(record);
    }

    fn humanized_target(&mut self, x: i32, y: i32, frame_size: (u32, u32)) -> (i32, i32) {
        if !self.humanize.enabled {
            return (x, y);
        }
        let (dx, dy) = self.humanizer.jitter_position(self.humanize.max_tap_offset);
        let max_x = frame_size.0.saturating_sub(1) as i32;
        let max_y = frame_size.1.saturating_sub(1) as i32;
        ((x + dx).clamp(0, max_x), (y + dy).clamp(0, max_y))
    }

    fn sleep_between(&mut self, cycle: u32, cycles: u32, interval: Duration) {
        if cycle >= cycles {
            return;
        }
        let delay = if self.humanize.enabled {
            Duration::from_millis(
                self.humanizer
                    .humanize_delay(interval.as_millis() as u64, self.humanize.delay_variance_percent),
            )
        } else {
            interval
        };
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CaptureError, TapError};
    use crate::vision::Frame;
    use image::{ImageBuffer, Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    fn fill_rect(img: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, color);
            }
        }
    }

    fn loading_frame() -> Frame {
        let mut img: RgbaImage = ImageBuffer::from_pixel(400, 300, Rgba([120, 40, 200, 255]));
        fill_rect(&mut img, 50, 250, 300, 30, Rgba([220, 180, 30, 255]));
        Frame::new(img)
    }

    fn lobby_frame() -> Frame {
        let mut img: RgbaImage = ImageBuffer::from_pixel(400, 300, Rgba([10, 10, 10, 255]));
        fill_rect(&mut img, 100, 75, 200, 150, Rgba([150, 90, 40, 255]));
        Frame::new(img)
    }

    struct ScriptedSource {
        frames: VecDeque<Result<Frame, CaptureError>>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<Frame, CaptureError>>) -> Self {
            Self {
                frames: frames.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
            self.frames
                .pop_front()
                .unwrap_or_else(|| Err(CaptureError::Failed("script exhausted".to_string())))
        }
    }

    struct RecordingExecutor {
        taps: Vec<(i32, i32)>,
        fail: bool,
    }

    impl RecordingExecutor {
        fn new(fail: bool) -> Self {
            Self {
                taps: Vec::new(),
                fail,
            }
        }
    }

    impl ActionExecutor for RecordingExecutor {
        fn tap(&mut self, x: i32, y: i32) -> Result<(), TapError> {
            if self.fail {
                return Err(TapError::Failed("executor offline".to_string()));
            }
            self.taps.push((x, y));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct SharedAudit {
        records: Rc<RefCell<Vec<CycleRecord>>>,
    }

    impl AuditSink for SharedAudit {
        fn append(&mut self, record: &CycleRecord) -> Result<(), AuditError> {
            self.records.borrow_mut().push(record.clone());
            Ok(())
        }
    }

    fn quiet_config() -> PilotConfig {
        PilotConfig {
            humanize: crate::config::HumanizeSettings {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_poll_succeeds_when_target_appears() {
        let source = ScriptedSource::new(vec![Ok(loading_frame()), Ok(lobby_frame())]);
        let mut poll = PollController::new(source, &quiet_config());

        let outcome = poll.poll_until(
            |state| state == ScreenState::Lobby,
            MS,
            Duration::from_millis(100),
        );
        assert!(outcome.success);
        assert_eq!(outcome.cycles, 2);
        assert_eq!(outcome.final_state, ScreenState::Lobby);
    }

    #[test]
    fn test_poll_success_at_exact_max_wait_counts() {
        // Attempts land at accumulated elapsed 0, 5, 10, 15 and 20 ms; the
        // fifth attempt sits exactly on max_wait and must still be evaluated.
        let mut frames: Vec<Result<Frame, CaptureError>> =
            (0..4).map(|_| Ok(loading_frame())).collect();
        frames.push(Ok(lobby_frame()));
        let source = ScriptedSource::new(frames);
        let mut poll = PollController::new(source, &quiet_config());

        let outcome = poll.poll_until(
            |state| state == ScreenState::Lobby,
            Duration::from_millis(5),
            Duration::from_millis(20),
        );
        assert!(outcome.success);
        assert_eq!(outcome.cycles, 5);
    }

    #[test]
    fn test_poll_times_out_after_boundary_attempt() {
        let frames: Vec<Result<Frame, CaptureError>> =
            (0..8).map(|_| Ok(loading_frame())).collect();
        let source = ScriptedSource::new(frames);
        let mut poll = PollController::new(source, &quiet_config());

        let outcome = poll.poll_until(
            |state| state == ScreenState::Lobby,
            Duration::from_millis(5),
            Duration::from_millis(20),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.cycles, 5);
        assert_eq!(outcome.final_state, ScreenState::Loading);
    }

    #[test]
    fn test_poll_recovers_from_capture_failure() {
        let source = ScriptedSource::new(vec![
            Err(CaptureError::Failed("transient".to_string())),
            Ok(lobby_frame()),
        ]);
        let mut poll = PollController::new(source, &quiet_config());

        let outcome = poll.poll_until(
            |state| state == ScreenState::Lobby,
            MS,
            Duration::from_millis(100),
        );
        assert!(outcome.success);
        assert_eq!(outcome.cycles, 2);
    }

    #[test]
    fn test_poll_cancellation_checked_at_cycle_boundary() {
        let source = ScriptedSource::new(vec![Ok(lobby_frame())]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut poll = PollController::new(source, &quiet_config()).with_cancel(cancel);

        let outcome = poll.poll_until(|_| true, MS, Duration::from_millis(100));
        assert!(!outcome.success);
        assert_eq!(outcome.cycles, 0);
    }

    #[test]
    fn test_run_cycles_taps_and_records() {
        let source = ScriptedSource::new(vec![Ok(lobby_frame()), Ok(lobby_frame())]);
        let executor = RecordingExecutor::new(false);
        let audit = SharedAudit::default();
        let audit_view = audit.clone();

        let mut driver = CyclePilot::new(source, executor, &quiet_config(), TemplateLibrary::new())
            .with_audit(Box::new(audit));
        let report = driver.run_cycles(2, MS);

        assert_eq!(report.records.len(), 2);
        assert!(report.halted.is_none());
        assert_eq!(audit_view.records.borrow().len(), 2);

        for record in &report.records {
            let classification = record.classification.as_ref().unwrap();
            assert_eq!(classification.state, ScreenState::Lobby);
            let decision = record.decision.as_ref().unwrap();
            assert!(matches!(decision.action, Action::Tap { .. }));
            assert_eq!(record.action_ok, Some(true));
        }
        assert_eq!(driver.executor.taps.len(), 2);
    }

    #[test]
    fn test_run_cycles_counts_failed_capture_cycles() {
        let source = ScriptedSource::new(vec![
            Err(CaptureError::Failed("transient".to_string())),
            Ok(lobby_frame()),
        ]);
        let executor = RecordingExecutor::new(false);
        let mut driver =
            CyclePilot::new(source, executor, &quiet_config(), TemplateLibrary::new());
        let report = driver.run_cycles(2, MS);

        assert_eq!(report.records.len(), 2);
        assert!(report.records[0].classification.is_none());
        assert!(report.records[1].classification.is_some());
    }

    #[test]
    fn test_actuator_degraded_halts_the_session() {
        let frames: Vec<Result<Frame, CaptureError>> =
            (0..10).map(|_| Ok(lobby_frame())).collect();
        let source = ScriptedSource::new(frames);
        let executor = RecordingExecutor::new(true);
        let mut driver =
            CyclePilot::new(source, executor, &quiet_config(), TemplateLibrary::new());
        let report = driver.run_cycles(10, MS);

        assert_eq!(
            report.halted,
            Some(HaltReason::ActuatorDegraded { failures: 3 })
        );
        assert_eq!(report.records.len(), 3);
        assert!(report
            .records
            .iter()
            .all(|r| r.action_ok == Some(false)));
    }

    #[test]
    fn test_cancelled_session_halts_immediately() {
        let source = ScriptedSource::new(vec![Ok(lobby_frame())]);
        let executor = RecordingExecutor::new(false);
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut driver = CyclePilot::new(source, executor, &quiet_config(), TemplateLibrary::new())
            .with_cancel(cancel);
        let report = driver.run_cycles(5, MS);

        assert!(report.records.is_empty());
        assert_eq!(report.halted, Some(HaltReason::Cancelled));
    }
}
