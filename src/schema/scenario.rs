use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use super::flow::{Flow, FlowId};
use super::message::Message;

/// Errors raised while resolving, loading or validating a scenario.
///
/// `Clone` so a single failed load can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("unknown scenario type: {0}")]
    UnknownScenarioType(String),
    #[error("invalid scenario {scenario}: {reason}")]
    InvalidScenario { scenario: String, reason: String },
    #[error("failed to load scenario {scenario}: {reason}")]
    LoadFailure { scenario: String, reason: String },
}

/// Errors reading a scenario definition from disk or text.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl ScenarioError {
    pub fn invalid(scenario: ScenarioType, reason: impl Into<String>) -> Self {
        Self::InvalidScenario {
            scenario: scenario.tag().to_string(),
            reason: reason.into(),
        }
    }

    pub fn load_failure(scenario: ScenarioType, reason: impl std::fmt::Display) -> Self {
        Self::LoadFailure {
            scenario: scenario.tag().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The statically known set of demo conversations.
///
/// Serialized as its kebab-case tag in both RON and JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScenarioType {
    RestaurantReservation,
    EcommerceCatalog,
    LoyaltyProgram,
    AppointmentBooking,
}

impl ScenarioType {
    pub const ALL: [ScenarioType; 4] = [
        Self::RestaurantReservation,
        Self::EcommerceCatalog,
        Self::LoyaltyProgram,
        Self::AppointmentBooking,
    ];

    /// The kebab-case tag used in URLs, config files and the JS boundary.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RestaurantReservation => "restaurant-reservation",
            Self::EcommerceCatalog => "ecommerce-catalog",
            Self::LoyaltyProgram => "loyalty-program",
            Self::AppointmentBooking => "appointment-booking",
        }
    }
}

impl std::fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<ScenarioType> for String {
    fn from(ty: ScenarioType) -> Self {
        ty.tag().to_string()
    }
}

impl TryFrom<String> for ScenarioType {
    type Error = ScenarioError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl FromStr for ScenarioType {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.tag() == s)
            .ok_or_else(|| ScenarioError::UnknownScenarioType(s.to_string()))
    }
}

/// A complete scripted conversation: messages, the flows they open, and
/// how long one playback pass lasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioType,
    pub title: String,
    #[serde(default)]
    pub business: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    pub duration_ms: u64,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Scenario, DefinitionError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a scenario from a RON string.
    pub fn parse_ron(input: &str) -> Result<Scenario, DefinitionError> {
        Ok(ron::from_str(input)?)
    }

    pub fn flow(&self, id: &FlowId) -> Option<&Flow> {
        self.flows.iter().find(|f| &f.id == id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_through_from_str() {
        for ty in ScenarioType::ALL {
            assert_eq!(ty.tag().parse::<ScenarioType>().unwrap(), ty);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert_eq!(
            "pizza-party".parse::<ScenarioType>(),
            Err(ScenarioError::UnknownScenarioType("pizza-party".to_string()))
        );
    }

    #[test]
    fn serde_uses_tag_strings() {
        let ty: ScenarioType = ron::from_str("\"loyalty-program\"").unwrap();
        assert_eq!(ty, ScenarioType::LoyaltyProgram);
        assert_eq!(
            ron::to_string(&ScenarioType::LoyaltyProgram).unwrap(),
            "\"loyalty-program\""
        );
        assert!(ron::from_str::<ScenarioType>("\"bakery\"").is_err());
    }

    #[test]
    fn parse_minimal_scenario() {
        let scenario = Scenario::parse_ron(
            r#"(
                id: "restaurant-reservation",
                title: "Table for two",
                messages: [
                    (id: "m1", sender: Customer, content: Text("Hi"), at_ms: 1000),
                ],
                duration_ms: 4000,
            )"#,
        )
        .unwrap();
        assert_eq!(scenario.id, ScenarioType::RestaurantReservation);
        assert_eq!(scenario.message_count(), 1);
        assert!(scenario.flows.is_empty());
        assert!(scenario.flow(&FlowId::new("booking")).is_none());
    }
}
