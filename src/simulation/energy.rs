//! Per-round energy consumption model.
//!
//! A round has two phases: every connected sensor harvests first, then the
//! harvested data units travel hop by hop in FIFO order. Each hop is paid
//! independently, so a relay forwarding N units pays N receptions and N
//! transmissions. Batteries are clamped at zero and sinks never pay.

use std::collections::{BTreeSet, VecDeque};

use super::types::{Network, NodeId, SimulationClock};
use crate::common::config::SimulationConfig;

/// What happened during one round.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundReport {
    /// Sensors that paid the harvest cost and produced a data unit.
    pub senders: usize,
    /// Sensors whose battery ran out while harvesting.
    pub exhausted: usize,
    /// Successful transmissions, each paid by the sender.
    pub hops: usize,
    /// Transmissions received by a sensor, each paid by the receiver.
    pub relayed: usize,
    /// Data units that reached a sink.
    pub delivered: usize,
    /// Data units lost to a missing route or an empty battery.
    pub dropped: usize,
    /// Total battery removed from sensors during the round.
    pub debited: f64,
}

/// Simulate one round of harvesting and forwarding.
///
/// # Parameters
///
/// * `network` - Network with routes assigned; batteries are debited in place
/// * `disconnected` - Sensors that neither harvest nor send this round
/// * `config` - Energy costs and harvest interval
/// * `clock` - Advanced by `config.harvest_interval`
///
/// # Returns
///
/// Counters of the round.
pub fn consume_round(network: &mut Network, disconnected: &BTreeSet<NodeId>, config: &SimulationConfig, clock: &mut SimulationClock) -> RoundReport {
    let before = network.total_sensor_battery();
    let mut report = RoundReport::default();
    let mut queue: VecDeque<NodeId> = VecDeque::new();

    for id in 0..network.node_count() {
        if disconnected.contains(&id) {
            continue;
        }
        let node = network.node_mut(id);
        if node.is_sink() || node.battery <= 0.0 {
            continue;
        }
        node.battery -= config.harvest_cost;
        if node.battery > 0.0 {
            report.senders += 1;
            queue.push_back(id);
        } else {
            node.battery = 0.0;
            report.exhausted += 1;
        }
    }

    while let Some(sender) = queue.pop_front() {
        let Some(destination) = network.node(sender).route.next_hop() else {
            report.dropped += 1;
            continue;
        };
        let destination_is_sink = network.node(destination).is_sink();

        if network.node(sender).battery - config.transmit_cost < 0.0 {
            network.node_mut(sender).battery = 0.0;
            report.dropped += 1;
        } else if !destination_is_sink && network.node(destination).battery - config.receive_cost < 0.0 {
            network.node_mut(destination).battery = 0.0;
            report.dropped += 1;
        } else {
            if destination_is_sink {
                report.delivered += 1;
            } else {
                network.node_mut(destination).battery -= config.receive_cost;
                report.relayed += 1;
                queue.push_back(destination);
            }
            network.node_mut(sender).battery -= config.transmit_cost;
            report.hops += 1;
        }
    }

    clock.advance(config.harvest_interval);
    report.debited = before - network.total_sensor_battery();
    log::trace!(
        "Round {}: {} senders, {} hops, {} delivered, {} dropped",
        clock.duration_of_life,
        report.senders,
        report.hops,
        report.delivered,
        report.dropped
    );
    report
}
