use crate::model::StationView;
use signal_types::StationMode;
use std::collections::HashMap;

/// An instruction the route server wants delivered to `initiator` as
/// `RELAYWITH(target)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOrder {
    pub initiator: String,
    pub target: String,
}

/// Plans relays to establish when `new_addr` registers (§4.5.1). Pure
/// function over a snapshot so it is trivially testable without a running
/// server.
pub fn plan_relay(stations: &HashMap<String, StationView>, new_addr: &str) -> Vec<RelayOrder> {
    let Some(new_station) = stations.get(new_addr) else {
        return Vec::new();
    };

    // Exact-match against the configured role, not a bitmask test: a
    // newly-registering station is planned for the one role it was
    // configured with (§4.5.1's implementation note). The periodic trunk
    // audit below classifies existing stations with a bitmask AND test
    // instead — the two are intentionally different.
    if new_station.station_mode == StationMode::TRUNK {
        plan_trunk_join(stations, new_addr)
    } else if new_station.station_mode == StationMode::BRANCH {
        plan_branch_join(stations, new_addr)
    } else {
        Vec::new()
    }
}

fn plan_trunk_join(stations: &HashMap<String, StationView>, new_addr: &str) -> Vec<RelayOrder> {
    let mut existing: Vec<&String> = stations
        .keys()
        .filter(|addr| addr.as_str() != new_addr && stations[*addr].is_trunk())
        .collect();
    existing.sort();

    let mut orders = Vec::with_capacity(existing.len());
    for (i, addr) in existing.into_iter().enumerate() {
        // Alternate which side initiates so dialing load balances across
        // direction rather than always falling on the new station. With a
        // single pre-existing trunk (i=0) the existing station initiates.
        let order = if i % 2 == 0 {
            RelayOrder { initiator: addr.clone(), target: new_addr.to_string() }
        } else {
            RelayOrder { initiator: new_addr.to_string(), target: addr.clone() }
        };
        orders.push(order);
    }
    orders
}

fn plan_branch_join(stations: &HashMap<String, StationView>, new_addr: &str) -> Vec<RelayOrder> {
    let mut candidates: Vec<(&String, &StationView)> = stations
        .iter()
        .filter(|(addr, view)| addr.as_str() != new_addr && !view.is_leaf())
        .collect();
    candidates.sort_by_key(|(addr, _)| (*addr).clone());

    candidates
        .into_iter()
        .min_by_key(|(_, view)| view.non_trunk_relay_count())
        .map(|(addr, _)| vec![RelayOrder { initiator: new_addr.to_string(), target: addr.clone() }])
        .unwrap_or_default()
}

/// Audits the trunk overlay for any unordered pair missing a relay in
/// either direction (§4.5.2). Idempotent: re-running before an ordered
/// relay completes just re-issues the same order.
pub fn audit_trunk_mesh(stations: &HashMap<String, StationView>) -> Vec<RelayOrder> {
    let mut trunks: Vec<&String> = stations.keys().filter(|addr| stations[*addr].is_trunk()).collect();
    trunks.sort();

    let mut orders = Vec::new();
    for i in 0..trunks.len() {
        for j in (i + 1)..trunks.len() {
            let a = trunks[i];
            let b = trunks[j];
            if !stations[a].has_trunk_pair_either_direction(b) {
                orders.push(RelayOrder { initiator: a.clone(), target: b.clone() });
            }
        }
    }
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_types::{ServerInfo, ServiceMode};

    fn insert(stations: &mut HashMap<String, StationView>, addr: &str, mode: StationMode) {
        let info = ServerInfo::new(addr, "10.0.0.1", 25152, ServiceMode::STATION, mode);
        stations.insert(addr.to_string(), StationView::new(addr.to_string(), info, addr.to_string(), 0));
    }

    #[test]
    fn trunk_join_alternates_initiator_across_existing_trunks() {
        let mut stations = HashMap::new();
        insert(&mut stations, "a:1", StationMode::TRUNK);
        insert(&mut stations, "b:1", StationMode::TRUNK);
        insert(&mut stations, "new:1", StationMode::TRUNK);

        let orders = plan_relay(&stations, "new:1");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0], RelayOrder { initiator: "a:1".into(), target: "new:1".into() });
        assert_eq!(orders[1], RelayOrder { initiator: "new:1".into(), target: "b:1".into() });
    }

    #[test]
    fn branch_join_picks_fewest_non_trunk_relays() {
        let mut stations = HashMap::new();
        insert(&mut stations, "trunk:1", StationMode::TRUNK);
        insert(&mut stations, "leaf:1", StationMode::LEAF);
        insert(&mut stations, "new:1", StationMode::BRANCH);

        let orders = plan_relay(&stations, "new:1");
        assert_eq!(orders, vec![RelayOrder { initiator: "new:1".into(), target: "trunk:1".into() }]);
    }

    #[test]
    fn leaf_join_plans_nothing() {
        let mut stations = HashMap::new();
        insert(&mut stations, "trunk:1", StationMode::TRUNK);
        insert(&mut stations, "new:1", StationMode::LEAF);

        assert!(plan_relay(&stations, "new:1").is_empty());
    }

    #[test]
    fn audit_skips_pairs_already_linked_in_either_direction() {
        let mut stations = HashMap::new();
        insert(&mut stations, "a:1", StationMode::TRUNK);
        insert(&mut stations, "b:1", StationMode::TRUNK);
        insert(&mut stations, "c:1", StationMode::TRUNK);

        stations.get_mut("b:1").unwrap().trunk_relays.insert(
            signal_types::RouteCmd::pair_key("a:1", "b:1"),
            crate::model::RelayRecord { from_sid: "a".into(), to_sid: "b".into(), is_trunk: true, time: 0 },
        );

        let orders = audit_trunk_mesh(&stations);
        // a-b already linked; a-c and b-c are still missing.
        assert_eq!(orders.len(), 2);
        assert!(orders.contains(&RelayOrder { initiator: "a:1".into(), target: "c:1".into() }));
        assert!(orders.contains(&RelayOrder { initiator: "b:1".into(), target: "c:1".into() }));
    }
}
