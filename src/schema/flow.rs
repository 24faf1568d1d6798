use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Newtype wrapper for flow IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub String);

/// Newtype wrapper for flow step IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub String);

impl FlowId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl StepId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of input widget a step renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputKind {
    Text,
    Number,
    Date,
    Time,
    Select,
    Confirm,
}

/// Constraints checked against a submitted step value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub min_len: Option<usize>,
    #[serde(default)]
    pub max_len: Option<usize>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("step {0} requires a value")]
    Required(StepId),
    #[error("step {step}: expected at least {min} characters")]
    TooShort { step: StepId, min: usize },
    #[error("step {step}: expected at most {max} characters")]
    TooLong { step: StepId, max: usize },
    #[error("step {step}: '{value}' is not a number")]
    NotANumber { step: StepId, value: String },
    #[error("step {step}: {value} is outside {min:?}..={max:?}")]
    OutOfRange {
        step: StepId,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    #[error("step {step}: '{value}' is not one of the offered options")]
    UnknownOption { step: StepId, value: String },
}

/// One input prompt inside a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub input: InputKind,
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub validation: Validation,
    /// Value the demo fills in when the flow advances on its own.
    #[serde(default)]
    pub mock_value: Option<String>,
}

impl Step {
    /// Check a submitted value against this step's input kind and constraints.
    ///
    /// An empty value passes unless the step is `required`; the remaining
    /// checks only apply to non-empty input.
    pub fn validate(&self, value: &str) -> Result<(), ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            if self.validation.required {
                return Err(ValidationError::Required(self.id.clone()));
            }
            return Ok(());
        }

        let len = trimmed.chars().count();
        if let Some(min) = self.validation.min_len {
            if len < min {
                return Err(ValidationError::TooShort {
                    step: self.id.clone(),
                    min,
                });
            }
        }
        if let Some(max) = self.validation.max_len {
            if len > max {
                return Err(ValidationError::TooLong {
                    step: self.id.clone(),
                    max,
                });
            }
        }

        match self.input {
            InputKind::Number => {
                let number: f64 = trimmed.parse().map_err(|_| ValidationError::NotANumber {
                    step: self.id.clone(),
                    value: trimmed.to_string(),
                })?;
                if !number.is_finite() {
                    return Err(ValidationError::NotANumber {
                        step: self.id.clone(),
                        value: trimmed.to_string(),
                    });
                }
                let below = self.validation.min.is_some_and(|min| number < min);
                let above = self.validation.max.is_some_and(|max| number > max);
                if below || above {
                    return Err(ValidationError::OutOfRange {
                        step: self.id.clone(),
                        value: number,
                        min: self.validation.min,
                        max: self.validation.max,
                    });
                }
            }
            InputKind::Select | InputKind::Confirm if !self.options.is_empty() => {
                if !self.options.iter().any(|o| o == trimmed) {
                    return Err(ValidationError::UnknownOption {
                        step: self.id.clone(),
                        value: trimmed.to_string(),
                    });
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// An interactive step sequence embedded in a conversation, e.g. booking a table.
///
/// Flows are read-only templates. Progress through a flow lives in the
/// engine's state, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: FlowId,
    pub title: String,
    pub steps: Vec<Step>,
}

impl Flow {
    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }

    pub fn contains_step(&self, id: &StepId) -> bool {
        self.step(id).is_some()
    }

    /// The step following `id`, or `None` when `id` is last or unknown.
    pub fn next_step_after(&self, id: &StepId) -> Option<&Step> {
        let pos = self.steps.iter().position(|s| &s.id == id)?;
        self.steps.get(pos + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, input: InputKind) -> Step {
        Step {
            id: StepId::new(id),
            input,
            label: id.to_string(),
            options: Vec::new(),
            validation: Validation::default(),
            mock_value: None,
        }
    }

    fn booking_flow() -> Flow {
        Flow {
            id: FlowId::new("booking"),
            title: "Book a table".to_string(),
            steps: vec![
                step("date", InputKind::Date),
                step("guests", InputKind::Number),
                step("confirm", InputKind::Confirm),
            ],
        }
    }

    #[test]
    fn step_navigation() {
        let flow = booking_flow();
        assert_eq!(flow.first_step().unwrap().id, StepId::new("date"));
        assert_eq!(
            flow.next_step_after(&StepId::new("date")).unwrap().id,
            StepId::new("guests")
        );
        assert!(flow.next_step_after(&StepId::new("confirm")).is_none());
        assert!(flow.next_step_after(&StepId::new("missing")).is_none());
        assert!(flow.contains_step(&StepId::new("guests")));
        assert!(!flow.contains_step(&StepId::new("email")));
    }

    #[test]
    fn required_rejects_blank() {
        let mut s = step("name", InputKind::Text);
        s.validation.required = true;
        assert_eq!(
            s.validate("   "),
            Err(ValidationError::Required(StepId::new("name")))
        );
        assert!(s.validate("Ana").is_ok());
    }

    #[test]
    fn optional_blank_passes() {
        let s = step("notes", InputKind::Text);
        assert!(s.validate("").is_ok());
    }

    #[test]
    fn length_bounds() {
        let mut s = step("name", InputKind::Text);
        s.validation.min_len = Some(2);
        s.validation.max_len = Some(5);
        assert!(matches!(s.validate("A"), Err(ValidationError::TooShort { min: 2, .. })));
        assert!(matches!(s.validate("Alexandra"), Err(ValidationError::TooLong { max: 5, .. })));
        assert!(s.validate("Ana").is_ok());
    }

    #[test]
    fn number_range() {
        let mut s = step("guests", InputKind::Number);
        s.validation.min = Some(1.0);
        s.validation.max = Some(12.0);
        assert!(s.validate("4").is_ok());
        assert!(matches!(s.validate("0"), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(s.validate("20"), Err(ValidationError::OutOfRange { .. })));
        assert!(matches!(s.validate("four"), Err(ValidationError::NotANumber { .. })));
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let mut s = step("guests", InputKind::Number);
        s.validation.min = Some(1.0);
        s.validation.max = Some(12.0);
        for value in ["NaN", "inf", "-inf", "infinity"] {
            assert!(
                matches!(s.validate(value), Err(ValidationError::NotANumber { .. })),
                "{value} accepted"
            );
        }
        assert!(step("any", InputKind::Number).validate("NaN").is_err());
    }

    #[test]
    fn select_must_match_option() {
        let mut s = step("area", InputKind::Select);
        s.options = vec!["Terrace".to_string(), "Indoor".to_string()];
        assert!(s.validate("Terrace").is_ok());
        assert!(matches!(s.validate("Roof"), Err(ValidationError::UnknownOption { .. })));
    }

    #[test]
    fn select_without_options_accepts_anything() {
        let s = step("area", InputKind::Select);
        assert!(s.validate("Roof").is_ok());
    }
}
