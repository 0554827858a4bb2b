//! Session loop
//!
//! Owns all mutable session state (history, idle snapshot, active wiring) and
//! alternates between the idle view and pipeline turns on one task. A turn
//! always runs to completion before the idle view is touched again.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;

use crate::display::Display;
use crate::hardware::WiringProfile;
use crate::history::TurnHistory;
use crate::idle::{IdleMonitor, TickReport};
use crate::input::{Trigger, TriggerSource};
use crate::pipeline::{InteractionPipeline, TurnInput, TurnReport};

/// Default pause between loop iterations
pub const LOOP_INTERVAL: Duration = Duration::from_millis(50);

/// Notice shown after the history was cleared
pub const RESET_NOTICE: &str = "(conversation cleared)";

/// What one loop iteration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// A pipeline turn ran
    Turn(TurnReport),
    /// History was cleared on request
    Reset,
    /// No trigger; the idle monitor ticked
    Idle { tick: TickReport, redrawn: bool },
}

/// The running assistant
pub struct Session {
    pipeline: InteractionPipeline,
    history: TurnHistory,
    idle: IdleMonitor,
    display: Box<dyn Display>,
    triggers: Box<dyn TriggerSource>,
    active_wiring: Option<WiringProfile>,
    loop_interval: Duration,
}

impl Session {
    #[must_use]
    pub fn new(
        pipeline: InteractionPipeline,
        history: TurnHistory,
        idle: IdleMonitor,
        display: Box<dyn Display>,
        triggers: Box<dyn TriggerSource>,
        active_wiring: Option<WiringProfile>,
    ) -> Self {
        Self {
            pipeline,
            history,
            idle,
            display,
            triggers,
            active_wiring,
            loop_interval: LOOP_INTERVAL,
        }
    }

    /// Pause between loop iterations
    #[must_use]
    pub const fn with_loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    #[must_use]
    pub const fn history(&self) -> &TurnHistory {
        &self.history
    }

    #[must_use]
    pub const fn idle(&self) -> &IdleMonitor {
        &self.idle
    }

    #[must_use]
    pub const fn pipeline(&self) -> &InteractionPipeline {
        &self.pipeline
    }

    /// Wiring profile of the panel in use; `None` when headless
    #[must_use]
    pub const fn active_wiring(&self) -> Option<&WiringProfile> {
        self.active_wiring.as_ref()
    }

    /// Show the boot screen and fetch the first weather reading
    pub async fn boot(&mut self, message: &str) {
        self.display.draw_boot(message);

        if self.idle.has_weather()
            && let Err(e) = self.idle.refresh_weather_now().await
        {
            tracing::warn!(error = %e, "initial weather fetch failed");
        }
        self.idle.invalidate();
    }

    /// One iteration: a trigger runs a turn, otherwise the idle view ticks
    pub async fn step(&mut self, now: Instant, wall: DateTime<Utc>) -> StepKind {
        let Some(trigger) = self.triggers.poll() else {
            let tick = self.idle.tick(now, wall);
            let redrawn = self.idle.take_redraw();
            if redrawn {
                self.display.draw_idle(self.idle.snapshot());
            }
            return StepKind::Idle { tick, redrawn };
        };

        let input = match trigger {
            Trigger::Reset => {
                self.reset_history();
                return StepKind::Reset;
            }
            Trigger::Text(text) => TurnInput::Text(text),
            Trigger::PushToTalk => TurnInput::Speech,
        };

        tracing::debug!(?input, "trigger received");
        let report = self
            .pipeline
            .run(input, &mut self.history, self.display.as_mut())
            .await;

        let dropped = self.triggers.drain();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped input received during turn");
        }
        self.idle.invalidate();

        StepKind::Turn(report)
    }

    /// Run until `shutdown` resolves
    ///
    /// Shutdown is only observed between steps, so a running turn finishes
    /// first.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.loop_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            wiring = self.active_wiring.as_ref().map_or("headless", |w| w.label.as_str()),
            "session started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            self.step(Instant::now(), Utc::now()).await;
        }

        tracing::info!(turns = self.history.pairs(), "session stopped");
    }

    /// Forget the conversation and say so on the display
    pub fn reset_history(&mut self) {
        let cleared = self.history.len();
        self.history.clear();
        self.display.draw_chat("", RESET_NOTICE);
        self.idle.invalidate();
        tracing::info!(cleared, "history cleared");
    }
}
