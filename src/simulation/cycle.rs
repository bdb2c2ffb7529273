//! Cycle driver: hill-climb over the role-rotation interval.
//!
//! Each cycle depletes a fresh copy of the starting network under one
//! rotation interval and records the achieved lifetime. The interval of the
//! next cycle is derived from the recorded history, and the search stops on
//! diminishing returns or when the cycle cap is reached.

use std::time::{Duration, Instant};

use super::energy::consume_round;
use super::events::{SimulationContext, SimulationEvent, StateStatistics};
use super::lifetime::evaluate_lifetime;
use super::routing::configure_topology;
use super::types::{CycleResult, Network, NodeId, RepairOutcome, SimulationClock};

/// Phase of the interval search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Searching,
    Converged,
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The second cycle did not improve enough on the first one.
    NoImprovement,
    /// Neither of the last two cycles improved enough on the best earlier one.
    NoGainOverBase,
    /// `max-cycles` was reached.
    CycleLimit,
}

/// Error type for runs rejected before the first cycle completes.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    UnbridgeableComponents(Vec<Vec<NodeId>>),
}

impl std::fmt::Display for SimulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationError::UnbridgeableComponents(components) => {
                write!(f, "Dominating set cannot be connected, {} components are unreachable: {:?}", components.len(), components)
            }
        }
    }
}

impl std::error::Error for SimulationError {}

/// Result of a complete interval search.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    /// Final network of the cycle that lived longest.
    pub best_network: Network,
    pub best: CycleResult,
    /// Results in recorded order, after the best-last swaps of the search.
    pub history: Vec<CycleResult>,
    /// Number of states handed to the recorder, the starting state excluded.
    pub states: usize,
    pub stop_reason: StopReason,
    pub simulation_time: u64,
    pub elapsed: Duration,
}

/// Interval of the next cycle, derived from the results so far.
///
/// - no result: `0` (fixed topology)
/// - one result: half of the first lifetime
/// - even count: the best of the last two results is moved last (from the
///   fourth result on), then its interval grows by `growth`
/// - odd count: the interval before last shrinks by `shrink`
pub fn next_interval(history: &mut [CycleResult], growth: f64, shrink: f64) -> f64 {
    let len = history.len();
    match len {
        0 => 0.0,
        1 => history[0].lifetime as f64 / 2.0,
        _ if len % 2 == 0 => {
            if len > 2 && history[len - 1].lifetime < history[len - 2].lifetime {
                history.swap(len - 1, len - 2);
            }
            history[len - 1].interval * growth
        }
        _ => history[len - 2].interval * shrink,
    }
}

/// Relative gain of `result` over `base`, measured against `result`.
fn relative_gain(result: u64, base: u64) -> f64 {
    if result == 0 {
        return f64::NEG_INFINITY;
    }
    (result as f64 - base as f64) / result as f64
}

/// Diminishing-returns stopping rule.
///
/// After two cycles, stop if the second is not better than the first by at
/// least `threshold`. From six cycles on, after every even count, stop if the
/// last two both fail to beat the result recorded before them.
pub fn search_converged(history: &[CycleResult], threshold: f64) -> Option<StopReason> {
    let len = history.len();
    if len == 2 {
        let previous = history[0].lifetime;
        let last = history[1].lifetime;
        if last <= previous || relative_gain(last, previous) < threshold {
            return Some(StopReason::NoImprovement);
        }
    } else if len > 4 && len % 2 == 0 {
        let base = history[len - 3].lifetime;
        let before_last = history[len - 2].lifetime;
        let last = history[len - 1].lifetime;
        if last <= base && before_last <= base {
            return Some(StopReason::NoGainOverBase);
        }
        if relative_gain(last, base) < threshold && relative_gain(before_last, base) < threshold {
            return Some(StopReason::NoGainOverBase);
        }
    }
    None
}

/// Runs cycles until the interval search converges.
pub struct CycleDriver<'a> {
    context: SimulationContext<'a>,
    history: Vec<CycleResult>,
    clock: SimulationClock,
    state: SearchState,
    states: usize,
}

impl<'a> CycleDriver<'a> {
    pub fn new(context: SimulationContext<'a>) -> Self {
        CycleDriver {
            context,
            history: Vec::new(),
            clock: SimulationClock::default(),
            state: SearchState::Searching,
            states: 0,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    pub fn history(&self) -> &[CycleResult] {
        &self.history
    }

    /// Search the rotation interval that maximizes the lifetime of `pristine`.
    ///
    /// # Parameters
    ///
    /// * `pristine` - Starting network, cloned at the start of every cycle
    ///
    /// # Returns
    ///
    /// The best cycle and its final network, or an error when `strict-repair`
    /// is set and the starting dominating set cannot be connected.
    pub fn run(&mut self, pristine: &Network) -> Result<SimulationOutcome, SimulationError> {
        let started = Instant::now();
        let config = self.context.config.clone();
        self.context.recorder.record_state(0, 0, pristine);

        let mut best: Option<(CycleResult, Network)> = None;
        let mut cycle = 0usize;
        let stop_reason = loop {
            if let Some(reason) = search_converged(&self.history, config.performance_threshold) {
                break reason;
            }
            if self.history.len() >= config.max_cycles {
                break StopReason::CycleLimit;
            }

            let interval = next_interval(&mut self.history, config.interval_growth, config.interval_shrink);
            let (result, network) = self.run_cycle(cycle, interval, pristine)?;
            if best.as_ref().is_none_or(|(known, _)| result.lifetime > known.lifetime) {
                best = Some((result, network));
            }
            cycle += 1;
        };
        self.state = SearchState::Converged;

        let elapsed = started.elapsed();
        self.context.progress.emit(SimulationEvent::SimulationFinished { elapsed });

        // The loop runs at least once because an empty history never converges.
        let (best, best_network) = best.unwrap_or_else(|| (CycleResult { interval: 0.0, lifetime: 0 }, pristine.clone()));
        log::info!(
            "Search converged after {} cycles ({:?}): best interval {:.2} with lifetime {}",
            self.history.len(),
            stop_reason,
            best.interval,
            best.lifetime
        );

        Ok(SimulationOutcome {
            best_network,
            best,
            history: self.history.clone(),
            states: self.states,
            stop_reason,
            simulation_time: self.clock.simulation_time,
            elapsed,
        })
    }

    /// Deplete one copy of `pristine` under `interval`.
    fn run_cycle(&mut self, cycle: usize, interval: f64, pristine: &Network) -> Result<(CycleResult, Network), SimulationError> {
        let config = self.context.config.clone();
        let progress = self.context.progress;
        progress.emit(SimulationEvent::Initialization { cycle, interval });
        log::info!("Cycle {} starting with rotation interval {:.2}", cycle, interval);

        let mut network = pristine.clone();
        configure_topology(&mut network, &progress);
        if cycle == 0 && config.strict_repair {
            if let Some(RepairOutcome::Partial { unreachable }) = network.dominating().map(|view| view.outcome.clone()) {
                return Err(SimulationError::UnbridgeableComponents(unreachable));
            }
        }

        self.clock.start_cycle();
        let mut report = evaluate_lifetime(&network, interval, config.end_of_life_ratio);
        let mut last_rotation = 0u64;

        while !report.end_of_life {
            let duration = self.clock.duration_of_life;
            if duration >= config.max_rounds_per_cycle {
                log::warn!("Cycle {} stopped after {} rounds without reaching end-of-life", cycle, duration);
                break;
            }
            if interval > 0.0 && (duration == 0 || (duration - last_rotation) as f64 >= interval) {
                last_rotation = duration;
                configure_topology(&mut network, &progress);
                self.record_state(cycle, interval, &network);
            }

            consume_round(&mut network, &report.disconnected, &config, &mut self.clock);
            report = evaluate_lifetime(&network, interval, config.end_of_life_ratio);
            progress.emit(SimulationEvent::RoundProgress {
                cycle,
                percent: (report.ratio * 100.0).round().min(100.0) as u8,
            });
        }

        self.record_state(cycle, interval, &network);
        let result = CycleResult {
            interval,
            lifetime: self.clock.duration_of_life,
        };
        self.history.push(result);
        self.context.statistics.record_result(cycle, result);
        progress.emit(SimulationEvent::CycleFinished { cycle, result });
        progress.emit(SimulationEvent::RoundProgress { cycle, percent: 100 });
        log::info!("Cycle {} reached end-of-life after {} rounds", cycle, result.lifetime);

        self.clock.simulation_time += config.harvest_interval * config.cycle_separator;
        Ok((result, network))
    }

    /// Hand the current state to the recorder and the statistics sink.
    fn record_state(&mut self, cycle: usize, interval: f64, network: &Network) {
        self.states += 1;
        self.context.recorder.record_state(self.states, cycle, network);

        let sensors = network.sensor_count();
        let disconnected = evaluate_lifetime(network, interval, self.context.config.end_of_life_ratio).disconnected.len();
        self.context.statistics.record_statistics(StateStatistics {
            average_remaining_battery: network.total_sensor_battery() / sensors as f64,
            connected_nodes: sensors - disconnected,
            cycle,
            simulation_time: self.clock.simulation_time,
        });
        self.context.progress.emit(SimulationEvent::NewState {
            state: self.states,
            total: self.states + 1,
        });
    }
}
