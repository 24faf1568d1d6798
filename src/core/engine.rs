/// The simulation engine: schedules a scenario's sequence and owns playback state.
///
/// Time only moves when the host calls [`SimulationEngine::advance`] or
/// [`SimulationEngine::advance_to`]. Every action fires from inside those
/// calls, in `(deadline, schedule order)` order.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::core::cache::ScenarioCache;
use crate::core::config::EngineConfig;
use crate::core::metrics::Metrics;
use crate::core::scheduler::Scheduler;
use crate::core::sequence::{Action, Sequence};
use crate::core::view::ViewState;
use crate::schema::flow::{Flow, FlowId, Step, StepId, ValidationError};
use crate::schema::message::{Message, Sender};
use crate::schema::scenario::{Scenario, ScenarioError, ScenarioType};

/// Wait between completion and the automatic restart of a looping demo.
pub const LOOP_RESTART_DELAY_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("no scenario loaded")]
    NoScenarioLoaded,
    #[error("no flow is active")]
    NoActiveFlow,
    #[error("input for step {got} but the flow is at step {expected}")]
    StepMismatch { expected: StepId, got: StepId },
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("speed must be a positive finite number, got {0}")]
    InvalidSpeed(f64),
}

/// Engine-level lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Idle,
    Loading,
    Playing,
    Paused,
    Completed,
}

/// The single mutable record of what the demo currently shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub scenario: Option<ScenarioType>,
    /// Number of messages in the visible transcript.
    pub message_phase: usize,
    pub is_typing: bool,
    pub typing_sender: Option<Sender>,
    pub flow_active: bool,
    pub current_flow: Option<FlowId>,
    pub current_step: Option<StepId>,
    pub flow_answers: FxHashMap<StepId, String>,
    pub speed: f64,
    pub is_paused: bool,
    pub is_complete: bool,
}

impl SimulationState {
    fn initial(scenario: Option<ScenarioType>, speed: f64) -> Self {
        Self {
            scenario,
            message_phase: 0,
            is_typing: false,
            typing_sender: None,
            flow_active: false,
            current_flow: None,
            current_step: None,
            flow_answers: FxHashMap::default(),
            speed,
            is_paused: false,
            is_complete: false,
        }
    }

    fn clear_flow(&mut self) {
        self.flow_active = false;
        self.current_flow = None;
        self.current_step = None;
    }

    fn clear_typing(&mut self) {
        self.is_typing = false;
        self.typing_sender = None;
    }
}

/// Result of answering the current flow step.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowProgress {
    /// The flow moved on to this step.
    Advanced(StepId),
    /// That was the last step; these are all collected answers.
    Completed(FxHashMap<StepId, String>),
}

type ScenarioHook = Box<dyn FnMut(ScenarioType)>;
type FlowHook = Box<dyn FnMut(&FlowId, &FxHashMap<StepId, String>)>;
type MessageHook = Box<dyn FnMut(&Message)>;

#[derive(Default)]
struct Hooks {
    on_scenario_complete: Option<ScenarioHook>,
    on_flow_complete: Option<FlowHook>,
    on_message_shown: Option<MessageHook>,
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    /// Index into the current sequence.
    Item(usize),
    LoopRestart,
}

/// Maps scheduler time to playback position. Rebased on every start/resume
/// so earlier speed changes don't distort the position.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    clock_ms: u64,
    position_ms: u64,
    speed: f64,
}

/// The top-level playback engine. Built via `SimulationEngine::builder()`.
pub struct SimulationEngine {
    cache: Arc<ScenarioCache>,
    config: EngineConfig,
    hooks: Hooks,
    scenario: Option<Arc<Scenario>>,
    sequence: Sequence,
    state: SimulationState,
    metrics: Metrics,
    status: PlaybackStatus,
    scheduler: Scheduler<Timer>,
    /// Sequence items already executed in this pass.
    cursor: usize,
    anchor: Anchor,
    paused_at: u64,
    /// Loop restart state: the scheduler deadline while armed, or the wait
    /// left when a completed pass was paused.
    restart: Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restart {
    None,
    Armed { at: u64 },
    Held { remaining: u64 },
}

/// Builder for constructing a `SimulationEngine`.
pub struct SimulationEngineBuilder {
    config: EngineConfig,
    hooks: Hooks,
}

impl SimulationEngine {
    pub fn builder() -> SimulationEngineBuilder {
        SimulationEngineBuilder {
            config: EngineConfig::default(),
            hooks: Hooks::default(),
        }
    }

    /// Load the configured initial scenario, if any.
    pub async fn init(&mut self) -> Result<(), EngineError> {
        match self.config.initial_scenario {
            Some(scenario) => self.load(scenario).await,
            None => Ok(()),
        }
    }

    /// Fetch a scenario, rebuild its sequence and reset playback.
    ///
    /// On failure the engine is left idle with nothing loaded.
    pub async fn load(&mut self, scenario: ScenarioType) -> Result<(), EngineError> {
        self.scheduler.cancel_all();
        self.restart = Restart::None;
        self.status = PlaybackStatus::Loading;
        debug!(scenario = %scenario, "engine loading scenario");

        let (loaded, sequence) = match self.fetch(scenario).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(scenario = %scenario, error = %e, "scenario unavailable, staying idle");
                self.scenario = None;
                self.sequence = Sequence::default();
                self.state = SimulationState::initial(None, self.state.speed);
                self.cursor = 0;
                self.status = PlaybackStatus::Idle;
                return Err(e.into());
            }
        };

        let previous = self.scenario.as_ref().map(|s| s.id);
        if previous != Some(scenario) {
            self.metrics = Metrics::default();
        }
        self.metrics.total_duration_ms = sequence.duration_ms;
        self.scenario = Some(loaded);
        self.sequence = sequence;
        self.state = SimulationState::initial(Some(scenario), self.state.speed);
        self.cursor = 0;
        self.status = PlaybackStatus::Idle;
        debug!(
            scenario = %scenario,
            actions = self.sequence.len(),
            duration_ms = self.sequence.duration_ms,
            "scenario ready"
        );

        if self.config.auto_play {
            self.start()?;
        }
        Ok(())
    }

    /// Switch the demo to another scenario.
    pub async fn change_scenario(&mut self, scenario: ScenarioType) -> Result<(), EngineError> {
        self.load(scenario).await
    }

    async fn fetch(
        &self,
        scenario: ScenarioType,
    ) -> Result<(Arc<Scenario>, Sequence), ScenarioError> {
        let loaded = self.cache.get(scenario).await?;
        let sequence = Sequence::generate(&loaded)?;
        Ok((loaded, sequence))
    }

    /// Begin a playback pass. No-op while playing, paused or loading; a
    /// completed pass is reset first.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.scenario.is_none() {
            return Err(EngineError::NoScenarioLoaded);
        }
        match self.status {
            PlaybackStatus::Playing | PlaybackStatus::Paused | PlaybackStatus::Loading => {
                return Ok(())
            }
            PlaybackStatus::Completed => self.reset(),
            PlaybackStatus::Idle => {}
        }

        self.scheduler.cancel_all();
        self.cursor = 0;
        self.anchor = Anchor {
            clock_ms: self.scheduler.now(),
            position_ms: 0,
            speed: self.state.speed,
        };
        self.schedule_remaining(0);
        self.state.is_paused = false;
        self.status = PlaybackStatus::Playing;
        self.metrics.playbacks_started += 1;
        debug!(scenario = ?self.state.scenario, speed = self.state.speed, "playback started");
        Ok(())
    }

    /// Stop all timers, keeping the transcript and flow state as they are.
    ///
    /// A completed pass waiting on its loop restart can be paused too; the
    /// rest of the restart delay is held until `resume`.
    pub fn pause(&mut self) {
        match (self.status, self.restart) {
            (PlaybackStatus::Playing, _) => {}
            (PlaybackStatus::Completed, Restart::Armed { at }) => {
                self.restart = Restart::Held {
                    remaining: at.saturating_sub(self.scheduler.now()),
                };
            }
            _ => return,
        }
        self.paused_at = self.position_ms();
        self.scheduler.cancel_all();
        self.state.is_paused = true;
        self.status = PlaybackStatus::Paused;
        debug!(position_ms = self.paused_at, "playback paused");
    }

    /// Continue from where `pause` stopped, at the current speed.
    pub fn resume(&mut self) {
        if self.status != PlaybackStatus::Paused {
            return;
        }
        if let Restart::Held { remaining } = self.restart {
            self.arm_restart(remaining);
            self.state.is_paused = false;
            self.status = PlaybackStatus::Completed;
            debug!(remaining_ms = remaining, "loop restart resumed");
            return;
        }
        self.anchor = Anchor {
            clock_ms: self.scheduler.now(),
            position_ms: self.paused_at,
            speed: self.state.speed,
        };
        self.schedule_remaining(self.paused_at);
        self.state.is_paused = false;
        self.status = PlaybackStatus::Playing;
        debug!(position_ms = self.paused_at, "playback resumed");
    }

    /// Cancel all timers and return to the scenario's initial snapshot.
    pub fn reset(&mut self) {
        self.scheduler.cancel_all();
        self.state = SimulationState::initial(self.state.scenario, self.state.speed);
        self.cursor = 0;
        self.paused_at = 0;
        self.restart = Restart::None;
        if self.status != PlaybackStatus::Loading {
            self.status = PlaybackStatus::Idle;
        }
    }

    /// Change the divisor applied to delays scheduled from now on.
    ///
    /// Timers already pending keep their deadlines; pause and resume to
    /// apply the new speed immediately.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), EngineError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(EngineError::InvalidSpeed(speed));
        }
        self.state.speed = speed;
        Ok(())
    }

    /// Answer the current step of the active flow.
    pub fn submit_flow_input(
        &mut self,
        step_id: &StepId,
        value: &str,
    ) -> Result<FlowProgress, EngineError> {
        let scenario = self.scenario.clone().ok_or(EngineError::NoScenarioLoaded)?;
        let flow = active_flow(&scenario, &self.state).ok_or(EngineError::NoActiveFlow)?;
        let current = self
            .state
            .current_step
            .clone()
            .ok_or(EngineError::NoActiveFlow)?;
        if &current != step_id {
            return Err(EngineError::StepMismatch {
                expected: current,
                got: step_id.clone(),
            });
        }
        if let Some(step) = flow.step(&current) {
            step.validate(value)?;
        }

        self.metrics.user_interactions += 1;
        Ok(self.advance_flow(flow, current, value.trim().to_string()))
    }

    /// Alias for [`submit_flow_input`](Self::submit_flow_input).
    pub fn handle_flow_input(
        &mut self,
        step_id: &StepId,
        value: &str,
    ) -> Result<FlowProgress, EngineError> {
        self.submit_flow_input(step_id, value)
    }

    /// Move virtual time forward by `delta_ms`, firing every due action.
    pub fn advance(&mut self, delta_ms: u64) {
        let target = self.scheduler.now().saturating_add(delta_ms);
        self.advance_to(target);
    }

    /// Move virtual time forward to `target_ms`. Earlier targets are ignored.
    pub fn advance_to(&mut self, target_ms: u64) {
        while let Some(timer) = self.scheduler.pop_due(target_ms) {
            self.fire(timer);
        }
        self.scheduler.settle(target_ms);
    }

    pub fn now(&self) -> u64 {
        self.scheduler.now()
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_deref()
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Messages revealed so far, in transcript order.
    pub fn visible_messages(&self) -> &[Message] {
        match &self.scenario {
            Some(s) => &s.messages[..self.state.message_phase.min(s.messages.len())],
            None => &[],
        }
    }

    pub fn current_flow(&self) -> Option<&Flow> {
        active_flow(self.scenario.as_ref()?, &self.state)
    }

    pub fn current_flow_step(&self) -> Option<&Step> {
        let step = self.state.current_step.as_ref()?;
        self.current_flow()?.step(step)
    }

    /// Share of the transcript revealed, as a percentage.
    pub fn progress(&self) -> f64 {
        let total = self.scenario.as_ref().map_or(0, |s| s.messages.len());
        if total == 0 {
            return if self.state.is_complete { 100.0 } else { 0.0 };
        }
        self.state.message_phase.min(total) as f64 / total as f64 * 100.0
    }

    /// Playback position in unscaled scenario time.
    pub fn position_ms(&self) -> u64 {
        match self.status {
            PlaybackStatus::Playing => {
                let elapsed = self.scheduler.now().saturating_sub(self.anchor.clock_ms);
                self.anchor
                    .position_ms
                    .saturating_add((elapsed as f64 * self.anchor.speed).round() as u64)
            }
            PlaybackStatus::Paused => self.paused_at,
            PlaybackStatus::Completed => self.sequence.duration_ms,
            PlaybackStatus::Idle | PlaybackStatus::Loading => 0,
        }
    }

    /// Serializable snapshot for presentation layers.
    pub fn view(&self) -> ViewState {
        ViewState::capture(self)
    }

    fn schedule_remaining(&mut self, position_ms: u64) {
        let speed = self.state.speed;
        for (index, item) in self.sequence.items.iter().enumerate().skip(self.cursor) {
            let wait = scale(item.delay_ms.saturating_sub(position_ms), speed);
            self.scheduler.schedule_in(wait, Timer::Item(index));
        }
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::Item(index) => {
                let Some(item) = self.sequence.items.get(index) else {
                    return;
                };
                let action = item.action.clone();
                self.cursor = index + 1;
                if self.config.debug {
                    debug!(action = action.name(), at_ms = item.delay_ms, "executing action");
                } else {
                    trace!(action = action.name(), at_ms = item.delay_ms, "executing action");
                }
                self.execute(action);
            }
            Timer::LoopRestart => {
                self.restart = Restart::None;
                debug!(scenario = ?self.state.scenario, "restarting looped playback");
                self.reset();
                if let Err(e) = self.start() {
                    warn!(error = %e, "loop restart failed");
                }
            }
        }
    }

    fn execute(&mut self, action: Action) {
        let Some(scenario) = self.scenario.clone() else {
            return;
        };
        if self.state.is_complete {
            return;
        }

        match action {
            Action::ShowMessage { index } => {
                if index < self.state.message_phase {
                    return;
                }
                let Some(message) = scenario.messages.get(index) else {
                    return;
                };
                self.state.message_phase = index + 1;
                self.metrics.messages_shown += 1;
                if let Some(hook) = self.hooks.on_message_shown.as_mut() {
                    hook(message);
                }
            }
            Action::StartTyping { sender } => {
                self.state.is_typing = true;
                self.state.typing_sender = Some(sender);
            }
            Action::StopTyping => self.state.clear_typing(),
            Action::ShowFlow { flow } => {
                let Some(first) = scenario.flow(&flow).and_then(Flow::first_step) else {
                    return;
                };
                self.state.flow_active = true;
                self.state.current_step = Some(first.id.clone());
                self.state.current_flow = Some(flow);
                self.state.flow_answers.clear();
            }
            Action::NextFlowStep { flow, step, value } => {
                if self.state.current_flow.as_ref() != Some(&flow)
                    || self.state.current_step.as_ref() != Some(&step)
                {
                    return;
                }
                let (Some(active), Some(current)) = (
                    active_flow(&scenario, &self.state),
                    self.state.current_step.clone(),
                ) else {
                    return;
                };
                self.advance_flow(active, current, value.unwrap_or_default());
            }
            Action::HideFlow { flow } => {
                if self.state.current_flow.as_ref() == Some(&flow) {
                    self.state.clear_flow();
                }
            }
            Action::Complete => self.complete(),
        }
    }

    fn complete(&mut self) {
        self.state.is_complete = true;
        self.state.clear_typing();
        self.state.clear_flow();
        self.status = PlaybackStatus::Completed;
        self.metrics.playbacks_completed += 1;

        if let Some(scenario) = self.state.scenario {
            debug!(scenario = %scenario, "playback complete");
            if let Some(hook) = self.hooks.on_scenario_complete.as_mut() {
                hook(scenario);
            }
        }
        if self.config.loop_playback {
            self.arm_restart(LOOP_RESTART_DELAY_MS);
        }
    }

    fn arm_restart(&mut self, wait_ms: u64) {
        self.scheduler.schedule_in(wait_ms, Timer::LoopRestart);
        self.restart = Restart::Armed {
            at: self.scheduler.now().saturating_add(wait_ms),
        };
    }

    /// Record `value` for `current` and step forward, finishing the flow
    /// after its last step.
    fn advance_flow(&mut self, flow: &Flow, current: StepId, value: String) -> FlowProgress {
        let next = flow.next_step_after(&current).map(|s| s.id.clone());
        self.state.flow_answers.insert(current, value);

        match next {
            Some(next) => {
                self.state.current_step = Some(next.clone());
                FlowProgress::Advanced(next)
            }
            None => {
                self.state.clear_flow();
                self.metrics.flows_completed += 1;
                let answers = self.state.flow_answers.clone();
                debug!(flow = %flow.id, answers = answers.len(), "flow completed");
                if let Some(hook) = self.hooks.on_flow_complete.as_mut() {
                    hook(&flow.id, &answers);
                }
                FlowProgress::Completed(answers)
            }
        }
    }
}

/// The flow `state` says is open, looked up in `scenario`.
fn active_flow<'a>(scenario: &'a Scenario, state: &SimulationState) -> Option<&'a Flow> {
    if !state.flow_active {
        return None;
    }
    scenario.flow(state.current_flow.as_ref()?)
}

/// Convert a scenario-time span into scheduler time at `speed`.
fn scale(ms: u64, speed: f64) -> u64 {
    (ms as f64 / speed).round() as u64
}

impl SimulationEngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initial_scenario(mut self, scenario: ScenarioType) -> Self {
        self.config.initial_scenario = Some(scenario);
        self
    }

    pub fn auto_play(mut self, auto_play: bool) -> Self {
        self.config.auto_play = auto_play;
        self
    }

    pub fn loop_playback(mut self, loop_playback: bool) -> Self {
        self.config.loop_playback = loop_playback;
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.config.speed = speed;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn on_scenario_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut(ScenarioType) + 'static,
    {
        self.hooks.on_scenario_complete = Some(Box::new(hook));
        self
    }

    pub fn on_flow_complete<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&FlowId, &FxHashMap<StepId, String>) + 'static,
    {
        self.hooks.on_flow_complete = Some(Box::new(hook));
        self
    }

    pub fn on_message_shown<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Message) + 'static,
    {
        self.hooks.on_message_shown = Some(Box::new(hook));
        self
    }

    pub fn build(self, cache: Arc<ScenarioCache>) -> Result<SimulationEngine, EngineError> {
        let speed = self.config.speed;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(EngineError::InvalidSpeed(speed));
        }
        Ok(SimulationEngine {
            cache,
            hooks: self.hooks,
            scenario: None,
            sequence: Sequence::default(),
            state: SimulationState::initial(None, speed),
            metrics: Metrics::default(),
            status: PlaybackStatus::Idle,
            scheduler: Scheduler::new(),
            cursor: 0,
            anchor: Anchor {
                clock_ms: 0,
                position_ms: 0,
                speed,
            },
            paused_at: 0,
            restart: Restart::None,
            config: self.config,
        })
    }
}
