/// Serializable snapshot of what a chat widget should render.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::engine::{PlaybackStatus, SimulationEngine};
use crate::core::metrics::Metrics;
use crate::schema::flow::{FlowId, Step, StepId};
use crate::schema::message::{Message, Sender};
use crate::schema::scenario::ScenarioType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowView {
    pub id: FlowId,
    pub title: String,
    pub step: Option<Step>,
    /// 1-based position of `step` within the flow.
    pub step_number: usize,
    pub step_count: usize,
    pub answers: BTreeMap<StepId, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub scenario: Option<ScenarioType>,
    pub title: Option<String>,
    pub status: PlaybackStatus,
    pub messages: Vec<Message>,
    pub typing: Option<Sender>,
    pub flow: Option<FlowView>,
    pub progress: f64,
    pub position_ms: u64,
    pub speed: f64,
    pub metrics: Metrics,
    pub completion_rate: f64,
}

impl ViewState {
    pub fn capture(engine: &SimulationEngine) -> ViewState {
        let state = engine.state();
        let flow = engine.current_flow().map(|flow| {
            let step = engine.current_flow_step().cloned();
            let step_number = step
                .as_ref()
                .and_then(|s| flow.steps.iter().position(|f| f.id == s.id))
                .map_or(0, |i| i + 1);
            FlowView {
                id: flow.id.clone(),
                title: flow.title.clone(),
                step,
                step_number,
                step_count: flow.steps.len(),
                answers: state
                    .flow_answers
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            }
        });
        let metrics = engine.metrics();

        ViewState {
            scenario: state.scenario,
            title: engine.scenario().map(|s| s.title.clone()),
            status: engine.status(),
            messages: engine.visible_messages().to_vec(),
            typing: if state.is_typing {
                state.typing_sender
            } else {
                None
            },
            flow,
            progress: engine.progress(),
            position_ms: engine.position_ms(),
            speed: state.speed,
            metrics,
            completion_rate: metrics.completion_rate(),
        }
    }
}
