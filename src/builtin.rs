//! Scenario definitions shipped with the crate.

use crate::core::cache::ScenarioCache;
use crate::core::registry::{EmbeddedRon, ScenarioRegistry};
use crate::schema::scenario::ScenarioType;

pub const RESTAURANT_RESERVATION: &str =
    include_str!("../scenario_data/restaurant_reservation.ron");
pub const ECOMMERCE_CATALOG: &str = include_str!("../scenario_data/ecommerce_catalog.ron");
pub const LOYALTY_PROGRAM: &str = include_str!("../scenario_data/loyalty_program.ron");
pub const APPOINTMENT_BOOKING: &str = include_str!("../scenario_data/appointment_booking.ron");

/// Raw RON source of the built-in definition for `scenario`.
pub fn source(scenario: ScenarioType) -> &'static str {
    match scenario {
        ScenarioType::RestaurantReservation => RESTAURANT_RESERVATION,
        ScenarioType::EcommerceCatalog => ECOMMERCE_CATALOG,
        ScenarioType::LoyaltyProgram => LOYALTY_PROGRAM,
        ScenarioType::AppointmentBooking => APPOINTMENT_BOOKING,
    }
}

/// A registry with every built-in scenario.
pub fn registry() -> ScenarioRegistry {
    ScenarioType::ALL
        .into_iter()
        .fold(ScenarioRegistry::new(), |registry, scenario| {
            registry.with(scenario, EmbeddedRon(source(scenario)))
        })
}

/// A fresh cache over [`registry`].
pub fn cache() -> ScenarioCache {
    ScenarioCache::new(registry())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence::{Action, Sequence};
    use crate::schema::scenario::Scenario;
    use futures::executor::block_on;

    #[test]
    fn every_builtin_parses_and_generates() {
        for scenario in ScenarioType::ALL {
            let parsed = Scenario::parse_ron(source(scenario))
                .unwrap_or_else(|e| panic!("{scenario}: {e}"));
            assert_eq!(parsed.id, scenario);
            assert!(!parsed.messages.is_empty(), "{scenario} has no messages");

            let sequence = Sequence::generate(&parsed).unwrap();
            assert_eq!(
                sequence.items.last().map(|i| &i.action),
                Some(&Action::Complete)
            );
            assert!(sequence.duration_ms >= parsed.duration_ms);
        }
    }

    #[test]
    fn every_builtin_flow_mock_passes_validation() {
        for scenario in ScenarioType::ALL {
            let parsed = Scenario::parse_ron(source(scenario)).unwrap();
            for flow in &parsed.flows {
                for step in &flow.steps {
                    if let Some(value) = &step.mock_value {
                        assert_eq!(step.validate(value), Ok(()), "{scenario}/{}", step.id);
                    }
                }
            }
        }
    }

    #[test]
    fn cache_preloads_all_builtins() {
        let cache = cache();
        let loaded = block_on(cache.preload_all());
        assert_eq!(loaded.len(), ScenarioType::ALL.len());
        assert!(loaded.iter().all(|(_, result)| result.is_ok()));
        assert_eq!(cache.len(), 4);
    }
}
