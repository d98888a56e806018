//! Scenario contract and the case registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::{audit, connectivity, controls, monitoring, rejections, thresholds};

/// One entry of the compliance catalogue.
///
/// Bodies are thin: they drive the session and the risk monitor, log what
/// they observe, and leave the evidence in the logs and counters. They run
/// on the single task-execution thread, so blocking waits are fine.
pub trait Scenario: Send + Sync {
    /// Catalogue identifier, e.g. `2.3.1.1`.
    fn id(&self) -> &'static str;
    /// Short description logged when the case starts.
    fn title(&self) -> &'static str;
    fn run(&self, ctx: &CaseContext) -> CaseResult<()>;
}

/// Immutable id -> scenario table, built once at startup.
pub struct CaseRegistry {
    cases: BTreeMap<&'static str, Arc<dyn Scenario>>,
}

impl CaseRegistry {
    /// The full catalogue.
    #[must_use]
    pub fn standard() -> Self {
        let scenarios: Vec<Arc<dyn Scenario>> = vec![
            Arc::new(connectivity::Connectivity),
            Arc::new(connectivity::OpenPosition),
            Arc::new(connectivity::ClosePosition),
            Arc::new(connectivity::CancelRoundTrip),
            Arc::new(monitoring::ConnectionStatus),
            Arc::new(monitoring::LinkProbe::DISCONNECT),
            Arc::new(monitoring::LinkProbe::RECONNECT),
            Arc::new(monitoring::OrderCounting),
            Arc::new(monitoring::CancelCounting),
            Arc::new(monitoring::RepeatOrders::OPEN),
            Arc::new(monitoring::RepeatOrders::CLOSE),
            Arc::new(monitoring::RepeatCancel),
            Arc::new(thresholds::OrderThreshold),
            Arc::new(thresholds::CancelThreshold),
            Arc::new(thresholds::RepeatThreshold),
            Arc::new(rejections::BadSymbol),
            Arc::new(rejections::BadTick),
            Arc::new(rejections::OversizeVolume),
            Arc::new(rejections::InsufficientFunds),
            Arc::new(rejections::PositionShortfall),
            Arc::new(rejections::MarketClosed),
            Arc::new(controls::TradingHalt::PERMISSION),
            Arc::new(controls::TradingHalt::PAUSE),
            Arc::new(controls::CancelOne),
            Arc::new(controls::CancelAll),
            Arc::new(audit::LogReview),
        ];

        let mut cases = BTreeMap::new();
        for scenario in scenarios {
            cases.insert(scenario.id(), scenario);
        }
        Self { cases }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Scenario>> {
        self.cases.get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.cases.contains_key(id)
    }

    /// All case ids in catalogue order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.cases.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_catalogue() {
        let registry = CaseRegistry::standard();
        let expected = [
            "2.1.1", "2.1.2.1", "2.1.2.2", "2.1.2.3", "2.2.1.1", "2.2.1.2", "2.2.1.3",
            "2.2.2.1", "2.2.2.2", "2.2.3.1", "2.2.3.2", "2.2.3.3", "2.3.1.1", "2.3.1.3",
            "2.3.1.5", "2.4.1.1", "2.4.1.2", "2.4.1.3", "2.4.2.1", "2.4.2.2", "2.4.2.3",
            "2.5.1.1", "2.5.1.2", "2.5.2.1", "2.5.2.2", "2.6.1",
        ];
        assert_eq!(registry.len(), expected.len());
        for id in expected {
            assert!(registry.contains(id), "missing case {id}");
        }
    }

    #[test]
    fn test_ids_are_sorted_and_unique() {
        let registry = CaseRegistry::standard();
        let ids = registry.ids();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_unknown_id_is_absent() {
        let registry = CaseRegistry::standard();
        assert!(registry.get("9.9.9").is_none());
    }

    #[test]
    fn test_registered_id_matches_scenario_id() {
        let registry = CaseRegistry::standard();
        for id in registry.ids() {
            let scenario = registry.get(id).unwrap();
            assert_eq!(scenario.id(), id);
        }
    }
}
