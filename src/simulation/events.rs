//! Progress notifications and observation hooks of the simulation core.
//!
//! The core never performs I/O. It reports coarse phases through a bounded
//! embassy-sync channel (fire-and-forget, events are dropped when the
//! consumer lags behind) and hands network snapshots and statistics to
//! caller-provided hook implementations.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::Serialize;
use std::time::Duration;

use super::types::{CycleResult, Network};
use crate::common::config::SimulationConfig;

pub const SIMULATION_EVENT_CHANNEL_SIZE: usize = 100;
pub type SimulationEventChannel = embassy_sync::channel::Channel<CriticalSectionRawMutex, SimulationEvent, SIMULATION_EVENT_CHANNEL_SIZE>;
pub type SimulationEventSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, SimulationEvent, SIMULATION_EVENT_CHANNEL_SIZE>;
pub type SimulationEventReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, SimulationEvent, SIMULATION_EVENT_CHANNEL_SIZE>;

/// Notification kinds emitted by the cycle driver and the dominating set selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// A new cycle is starting with the given rotation interval.
    Initialization { cycle: usize, interval: f64 },
    /// Dominating set repair: components still to merge and a rough time estimate.
    SubgraphCount { remaining: usize, estimated_remaining: Option<Duration> },
    /// A round completed; `percent` is the share of disconnected nodes.
    RoundProgress { cycle: usize, percent: u8 },
    /// A state snapshot was handed to the recorder.
    NewState { state: usize, total: usize },
    CycleFinished { cycle: usize, result: CycleResult },
    SimulationFinished { elapsed: Duration },
}

/// Optional sending side of the event channel.
#[derive(Clone, Copy)]
pub struct ProgressReporter {
    sender: Option<SimulationEventSender>,
}

impl ProgressReporter {
    pub fn new(sender: SimulationEventSender) -> Self {
        ProgressReporter { sender: Some(sender) }
    }

    /// Reporter that discards every event.
    pub fn disabled() -> Self {
        ProgressReporter { sender: None }
    }

    /// Send without waiting; a full channel drops the event.
    pub fn emit(&self, event: SimulationEvent) {
        if let Some(sender) = &self.sender {
            if let Err(err) = sender.try_send(event) {
                log::trace!("Progress channel full, dropping {:?}", err);
            }
        }
    }
}

/// Observational sample taken whenever a state is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StateStatistics {
    pub average_remaining_battery: f64,
    pub connected_nodes: usize,
    pub cycle: usize,
    pub simulation_time: u64,
}

/// Durable storage of network states, called after each role rotation and at end-of-life.
pub trait StateRecorder {
    fn record_state(&mut self, state: usize, cycle: usize, network: &Network);
}

/// Aggregator of per-state statistics and per-cycle results.
pub trait StatisticsSink {
    fn record_statistics(&mut self, sample: StateStatistics);

    fn record_result(&mut self, _cycle: usize, _result: CycleResult) {}
}

/// Hook implementation that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl StateRecorder for NullRecorder {
    fn record_state(&mut self, _state: usize, _cycle: usize, _network: &Network) {}
}

impl StatisticsSink for NullRecorder {
    fn record_statistics(&mut self, _sample: StateStatistics) {}
}

/// Everything a simulation run needs besides the network itself.
pub struct SimulationContext<'a> {
    pub config: SimulationConfig,
    pub progress: ProgressReporter,
    pub recorder: &'a mut dyn StateRecorder,
    pub statistics: &'a mut dyn StatisticsSink,
}

impl<'a> SimulationContext<'a> {
    pub fn new(config: SimulationConfig, progress: ProgressReporter, recorder: &'a mut dyn StateRecorder, statistics: &'a mut dyn StatisticsSink) -> Self {
        SimulationContext {
            config,
            progress,
            recorder,
            statistics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_drops_events_when_channel_is_full() {
        let channel: &'static SimulationEventChannel = Box::leak(Box::new(SimulationEventChannel::new()));
        let reporter = ProgressReporter::new(channel.sender());
        for cycle in 0..SIMULATION_EVENT_CHANNEL_SIZE + 5 {
            reporter.emit(SimulationEvent::RoundProgress { cycle, percent: 0 });
        }
        let receiver = channel.receiver();
        let mut received = 0;
        while let Ok(event) = receiver.try_receive() {
            if received == 0 {
                assert_eq!(event, SimulationEvent::RoundProgress { cycle: 0, percent: 0 });
            }
            received += 1;
        }
        assert_eq!(received, SIMULATION_EVENT_CHANNEL_SIZE);
    }

    #[test]
    fn disabled_reporter_is_silent() {
        ProgressReporter::disabled().emit(SimulationEvent::SimulationFinished { elapsed: Duration::ZERO });
    }
}
