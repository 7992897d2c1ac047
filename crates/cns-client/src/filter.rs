//! IP configuration state filters
//!
//! Predicates used by IP allocation to pick candidate addresses in a given
//! lifecycle state (e.g. "available" for new pods, "pending release" when
//! shrinking the pool).

use crate::models::{IPConfigState, IPConfigurationStatus};
use std::collections::HashMap;

/// Tests whether an IP configuration is in some state.
pub type IPConfigStatePredicate = fn(&IPConfigurationStatus) -> bool;

fn is_allocated(config: &IPConfigurationStatus) -> bool {
    config.state == IPConfigState::Allocated
}

fn is_available(config: &IPConfigurationStatus) -> bool {
    config.state == IPConfigState::Available
}

fn is_pending_programming(config: &IPConfigurationStatus) -> bool {
    config.state == IPConfigState::PendingProgramming
}

fn is_pending_release(config: &IPConfigurationStatus) -> bool {
    config.state == IPConfigState::PendingRelease
}

pub const STATE_ALLOCATED: IPConfigStatePredicate = is_allocated;
pub const STATE_AVAILABLE: IPConfigStatePredicate = is_available;
pub const STATE_PENDING_PROGRAMMING: IPConfigStatePredicate = is_pending_programming;
pub const STATE_PENDING_RELEASE: IPConfigStatePredicate = is_pending_release;

/// Predicate matching exactly `state`.
pub fn predicate_for_state(state: IPConfigState) -> IPConfigStatePredicate {
    match state {
        IPConfigState::Allocated => STATE_ALLOCATED,
        IPConfigState::Available => STATE_AVAILABLE,
        IPConfigState::PendingProgramming => STATE_PENDING_PROGRAMMING,
        IPConfigState::PendingRelease => STATE_PENDING_RELEASE,
    }
}

fn matches_any_ip_config_state(
    config: &IPConfigurationStatus,
    predicates: &[IPConfigStatePredicate],
) -> bool {
    predicates.iter().any(|predicate| predicate(config))
}

/// Returns every configuration in `configs` matching at least one predicate.
///
/// The result follows the map's iteration order, which is unspecified.
/// An empty map or an empty predicate set yields an empty result.
pub fn match_any_ip_config_state(
    configs: &HashMap<String, IPConfigurationStatus>,
    predicates: &[IPConfigStatePredicate],
) -> Vec<IPConfigurationStatus> {
    if predicates.is_empty() || configs.is_empty() {
        return Vec::new();
    }

    configs
        .values()
        .filter(|config| matches_any_ip_config_state(config, predicates))
        .cloned()
        .collect()
}

/// Maps state names to predicates.
///
/// Names that are not a known `IPConfigState` are dropped without error, so
/// an unknown state simply matches nothing.
pub fn predicates_for_states<I, S>(states: I) -> Vec<IPConfigStatePredicate>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    states
        .into_iter()
        .filter_map(|name| name.as_ref().parse::<IPConfigState>().ok())
        .map(predicate_for_state)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_statuses() -> Vec<IPConfigurationStatus> {
        vec![
            IPConfigurationStatus::new("allocated", IPConfigState::Allocated),
            IPConfigurationStatus::new("available", IPConfigState::Available),
            IPConfigurationStatus::new("pending-programming", IPConfigState::PendingProgramming),
            IPConfigurationStatus::new("pending-release", IPConfigState::PendingRelease),
        ]
    }

    fn status_map() -> HashMap<String, IPConfigurationStatus> {
        test_statuses()
            .into_iter()
            .enumerate()
            .map(|(i, status)| (i.to_string(), status))
            .collect()
    }

    fn sorted_ids(mut statuses: Vec<IPConfigurationStatus>) -> Vec<String> {
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses.into_iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_matches_any_ip_config_state() {
        let statuses = test_statuses();
        for (i, status) in statuses.iter().enumerate() {
            let other = &statuses[(i + 1) % statuses.len()];
            let predicate = predicate_for_state(status.state);
            assert!(matches_any_ip_config_state(status, &[predicate]));
            assert!(!matches_any_ip_config_state(other, &[predicate]));
        }
    }

    #[test]
    fn test_match_any_ip_config_state_single_predicate() {
        let configs = status_map();
        for status in test_statuses() {
            let filtered = match_any_ip_config_state(&configs, &[predicate_for_state(status.state)]);
            assert_eq!(filtered, vec![status]);
        }
    }

    #[test]
    fn test_match_any_ip_config_state_is_logical_or() {
        let configs = status_map();
        let filtered = match_any_ip_config_state(&configs, &[STATE_AVAILABLE, STATE_PENDING_RELEASE]);
        assert_eq!(sorted_ids(filtered), vec!["available", "pending-release"]);
    }

    #[test]
    fn test_match_any_ip_config_state_empty_inputs() {
        let configs = status_map();
        assert!(match_any_ip_config_state(&configs, &[]).is_empty());
        assert!(match_any_ip_config_state(&HashMap::new(), &[STATE_ALLOCATED]).is_empty());
    }

    #[test]
    fn test_predicates_for_states_drops_unknown_names() {
        let predicates = predicates_for_states(["Allocated", "bogus"]);
        assert_eq!(predicates.len(), 1);

        let filtered = match_any_ip_config_state(&status_map(), &predicates);
        assert_eq!(sorted_ids(filtered), vec!["allocated"]);
    }

    #[test]
    fn test_predicates_for_states_all_known() {
        let names: Vec<String> = IPConfigState::ALL.iter().map(|s| s.to_string()).collect();
        let predicates = predicates_for_states(&names);
        assert_eq!(predicates.len(), 4);
        assert_eq!(match_any_ip_config_state(&status_map(), &predicates).len(), 4);
    }
}
