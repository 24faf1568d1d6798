//! WASM bindings for chat-demo-engine — powers the embeddable web widget.
//!
//! The host drives time with `tick(delta_ms)` from `requestAnimationFrame`
//! and renders from the JSON returned by `view()`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use futures::executor::block_on;
use wasm_bindgen::prelude::*;

use chat_demo_engine::builtin;
use chat_demo_engine::core::config::EngineConfig;
use chat_demo_engine::core::engine::{FlowProgress, SimulationEngine};
use chat_demo_engine::schema::flow::StepId;
use chat_demo_engine::schema::scenario::ScenarioType;

// ---------------------------------------------------------------------------
// Events queued by engine hooks until the host drains them
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DemoEvent {
    MessageShown {
        id: String,
    },
    FlowCompleted {
        flow: String,
        answers: BTreeMap<String, String>,
    },
    ScenarioCompleted {
        scenario: ScenarioType,
    },
}

type EventQueue = Rc<RefCell<Vec<DemoEvent>>>;

#[derive(serde::Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum InputOutcome {
    Advanced { next_step: String },
    Completed { answers: BTreeMap<String, String> },
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn parse_scenario(tag: &str) -> Result<ScenarioType, JsError> {
    tag.parse::<ScenarioType>()
        .map_err(|e| js_err("Unknown scenario", e))
}

fn build_engine(config: EngineConfig, events: &EventQueue) -> Result<SimulationEngine, JsError> {
    let shown = Rc::clone(events);
    let flows = Rc::clone(events);
    let done = Rc::clone(events);
    SimulationEngine::builder()
        .config(config)
        .on_message_shown(move |m| {
            shown
                .borrow_mut()
                .push(DemoEvent::MessageShown { id: m.id.0.clone() })
        })
        .on_flow_complete(move |flow, answers| {
            flows.borrow_mut().push(DemoEvent::FlowCompleted {
                flow: flow.0.clone(),
                answers: answers
                    .iter()
                    .map(|(k, v)| (k.0.clone(), v.clone()))
                    .collect(),
            })
        })
        .on_scenario_complete(move |scenario| {
            done.borrow_mut()
                .push(DemoEvent::ScenarioCompleted { scenario })
        })
        .build(Arc::new(builtin::cache()))
        .map_err(|e| js_err("Engine build error", e))
}

// ---------------------------------------------------------------------------
// ChatDemo — the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct ChatDemo {
    engine: SimulationEngine,
    events: EventQueue,
}

#[wasm_bindgen]
impl ChatDemo {
    /// Create a demo for a built-in scenario tag, e.g. `"ecommerce-catalog"`.
    ///
    /// `config_json` may override any engine option:
    /// ```json
    /// { "auto_play": true, "loop_playback": true, "speed": 1.5, "debug": false }
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(scenario: &str, config_json: Option<String>) -> Result<ChatDemo, JsError> {
        let scenario = parse_scenario(scenario)?;
        let config: EngineConfig = match config_json.as_deref() {
            Some(json) if !json.trim().is_empty() => {
                serde_json::from_str(json).map_err(|e| js_err("Invalid config JSON", e))?
            }
            _ => EngineConfig::default(),
        };

        let events: EventQueue = Rc::new(RefCell::new(Vec::new()));
        let mut engine = build_engine(config, &events)?;
        block_on(engine.load(scenario)).map_err(|e| js_err("Scenario load error", e))?;
        Ok(ChatDemo { engine, events })
    }

    /// Advance the virtual clock by `delta_ms` of wall time.
    pub fn tick(&mut self, delta_ms: f64) {
        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.engine.advance(delta_ms.round() as u64);
        }
    }

    pub fn start(&mut self) -> Result<(), JsError> {
        self.engine.start().map_err(|e| js_err("Start error", e))
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    pub fn resume(&mut self) {
        self.engine.resume();
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), JsError> {
        self.engine
            .set_speed(speed)
            .map_err(|e| js_err("Speed error", e))
    }

    /// Switch to another built-in scenario.
    pub fn change_scenario(&mut self, scenario: &str) -> Result<(), JsError> {
        let scenario = parse_scenario(scenario)?;
        block_on(self.engine.change_scenario(scenario))
            .map_err(|e| js_err("Scenario load error", e))
    }

    /// Answer the active flow's current step. Returns JSON describing
    /// whether the flow advanced or completed.
    pub fn handle_flow_input(&mut self, step: &str, value: &str) -> Result<String, JsError> {
        let progress = self
            .engine
            .handle_flow_input(&StepId::new(step), value)
            .map_err(|e| js_err("Flow input rejected", e))?;
        let outcome = match progress {
            FlowProgress::Advanced(next) => InputOutcome::Advanced { next_step: next.0 },
            FlowProgress::Completed(answers) => InputOutcome::Completed {
                answers: answers.into_iter().map(|(k, v)| (k.0, v)).collect(),
            },
        };
        serde_json::to_string(&outcome).map_err(|e| js_err("Serialization error", e))
    }

    /// Return the current render state as JSON.
    pub fn view(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.engine.view()).map_err(|e| js_err("Serialization error", e))
    }

    /// Return and clear the events raised since the last call, as a JSON array.
    pub fn drain_events(&mut self) -> Result<String, JsError> {
        let drained: Vec<DemoEvent> = self.events.borrow_mut().drain(..).collect();
        serde_json::to_string(&drained).map_err(|e| js_err("Serialization error", e))
    }

    /// Return the session metrics as JSON.
    pub fn metrics(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.engine.metrics())
            .map_err(|e| js_err("Serialization error", e))
    }

    /// Return JSON array of built-in scenario tags.
    pub fn available_scenarios() -> String {
        let tags: Vec<&str> = ScenarioType::ALL.iter().map(|s| s.tag()).collect();
        serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo(config: &str) -> ChatDemo {
        ChatDemo::new("appointment-booking", Some(config.to_string()))
            .unwrap_or_else(|_| panic!("demo should build"))
    }

    #[test]
    fn lists_every_builtin() {
        let tags: Vec<String> = serde_json::from_str(&ChatDemo::available_scenarios()).unwrap();
        assert_eq!(
            tags,
            vec![
                "restaurant-reservation",
                "ecommerce-catalog",
                "loyalty-program",
                "appointment-booking"
            ]
        );
    }

    #[test]
    fn ticks_reveal_messages_and_queue_events() {
        let mut demo = demo(r#"{"speed": 2.0}"#);
        demo.tick(1_000.0);
        let events: serde_json::Value =
            serde_json::from_str(&demo.drain_events().unwrap_or_default()).unwrap();
        assert_eq!(events[0]["type"], "message_shown");
        assert_eq!(events[0]["id"], "ab-1");

        let empty: Vec<serde_json::Value> =
            serde_json::from_str(&demo.drain_events().unwrap_or_default()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn playing_to_the_end_reports_completion() {
        let mut demo = demo("");
        demo.tick(60_000.0);
        let view: serde_json::Value =
            serde_json::from_str(&demo.view().unwrap_or_default()).unwrap();
        assert_eq!(view["status"], "Completed");
        assert_eq!(view["progress"], 100.0);

        let events: Vec<serde_json::Value> =
            serde_json::from_str(&demo.drain_events().unwrap_or_default()).unwrap();
        assert!(events.iter().any(|e| e["type"] == "flow_completed"));
        assert_eq!(events.last().unwrap()["type"], "scenario_completed");
    }

    #[test]
    fn manual_flow_input() {
        let mut demo = demo(r#"{"auto_play": true}"#);
        // First flow step opens 700ms after ab-4 at 5800.
        demo.tick(6_600.0);
        let outcome: serde_json::Value = serde_json::from_str(
            &demo
                .handle_flow_input("day", "Friday")
                .unwrap_or_default(),
        )
        .unwrap();
        assert_eq!(outcome["outcome"], "advanced");
        assert_eq!(outcome["next_step"], "time");
    }
}
