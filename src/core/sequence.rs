/// Sequence generation — flattens a scenario into timed playback actions.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::schema::flow::{FlowId, StepId};
use crate::schema::message::Sender;
use crate::schema::scenario::{Scenario, ScenarioError};

/// One thing the engine does at a point in playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Reveal the message at `index`; the visible prefix grows to `index + 1`.
    ShowMessage { index: usize },
    StartTyping { sender: Sender },
    StopTyping,
    ShowFlow { flow: FlowId },
    /// Answer `step` with `value` and move on. Skipped unless `step` is
    /// still the current one, so answers given by hand are kept.
    NextFlowStep {
        flow: FlowId,
        step: StepId,
        value: Option<String>,
    },
    HideFlow { flow: FlowId },
    Complete,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShowMessage { .. } => "show-message",
            Self::StartTyping { .. } => "start-typing",
            Self::StopTyping => "stop-typing",
            Self::ShowFlow { .. } => "show-flow",
            Self::NextFlowStep { .. } => "next-flow-step",
            Self::HideFlow { .. } => "hide-flow",
            Self::Complete => "complete",
        }
    }
}

/// An action paired with its offset from playback start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceItem {
    pub delay_ms: u64,
    pub action: Action,
}

/// The full, time-ordered action list for one playback pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sequence {
    pub items: Vec<SequenceItem>,
    /// Offset of the terminal `Complete` action.
    pub duration_ms: u64,
}

impl Sequence {
    /// Build the playback sequence for a scenario.
    ///
    /// Pure: the result depends only on the scenario's declared data.
    /// Message times are clamped so no message appears before the one
    /// declared ahead of it. Items are ordered by `(delay, declaration order)`.
    pub fn generate(scenario: &Scenario) -> Result<Sequence, ScenarioError> {
        validate_flows(scenario)?;

        let mut items: Vec<SequenceItem> = Vec::new();
        let mut thread_delay = 0u64;

        for (index, message) in scenario.messages.iter().enumerate() {
            let delay = message.at_ms.max(thread_delay);

            if message.typing_ms > 0 {
                let typing_from = delay.saturating_sub(message.typing_ms).max(thread_delay);
                items.push(SequenceItem {
                    delay_ms: typing_from,
                    action: Action::StartTyping {
                        sender: message.sender,
                    },
                });
                items.push(SequenceItem {
                    delay_ms: delay,
                    action: Action::StopTyping,
                });
            }

            items.push(SequenceItem {
                delay_ms: delay,
                action: Action::ShowMessage { index },
            });

            if let Some(launch) = &message.launches {
                let flow = scenario.flow(&launch.flow).ok_or_else(|| {
                    ScenarioError::invalid(
                        scenario.id,
                        format!(
                            "message {} launches unknown flow {}",
                            message.id.0, launch.flow
                        ),
                    )
                })?;

                let shown_at = delay.saturating_add(launch.after_ms);
                items.push(SequenceItem {
                    delay_ms: shown_at,
                    action: Action::ShowFlow {
                        flow: flow.id.clone(),
                    },
                });

                if let Some(auto) = launch.auto_advance {
                    let mut at = shown_at;
                    for step in &flow.steps {
                        at = at.saturating_add(auto.step_ms);
                        items.push(SequenceItem {
                            delay_ms: at,
                            action: Action::NextFlowStep {
                                flow: flow.id.clone(),
                                step: step.id.clone(),
                                value: step.mock_value.clone(),
                            },
                        });
                    }
                    items.push(SequenceItem {
                        delay_ms: at,
                        action: Action::HideFlow {
                            flow: flow.id.clone(),
                        },
                    });
                }
            }

            thread_delay = delay;
        }

        let last = items.iter().map(|i| i.delay_ms).max().unwrap_or(0);
        let duration_ms = scenario.duration_ms.max(last);
        items.push(SequenceItem {
            delay_ms: duration_ms,
            action: Action::Complete,
        });

        // Stable sort keeps declaration order among equal delays.
        items.sort_by_key(|item| item.delay_ms);

        Ok(Sequence { items, duration_ms })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items still pending once the first `fired` items have run.
    pub fn remaining(&self, fired: usize) -> &[SequenceItem] {
        &self.items[fired.min(self.items.len())..]
    }
}

fn validate_flows(scenario: &Scenario) -> Result<(), ScenarioError> {
    let mut flow_ids = FxHashSet::default();
    for flow in &scenario.flows {
        if !flow_ids.insert(&flow.id) {
            return Err(ScenarioError::invalid(
                scenario.id,
                format!("duplicate flow id {}", flow.id),
            ));
        }
        if flow.steps.is_empty() {
            return Err(ScenarioError::invalid(
                scenario.id,
                format!("flow {} has no steps", flow.id),
            ));
        }
        let mut step_ids = FxHashSet::default();
        for step in &flow.steps {
            if !step_ids.insert(&step.id) {
                return Err(ScenarioError::invalid(
                    scenario.id,
                    format!("flow {} repeats step id {}", flow.id, step.id),
                ));
            }
        }
    }
    Ok(())
}
