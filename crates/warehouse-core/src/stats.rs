use serde::{Deserialize, Serialize};

use crate::Tick;

/// Aggregate counters sampled at the start of each tick, before anyone acts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub tick: Tick,
    pub total_movements: u64,
    pub boxes_stacked: u64,
    pub robots_carrying: usize,
    /// Boxes still lying on the floor.
    pub boxes_remaining: usize,
}

/// Events emitted after processing a world tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TickEvents {
    pub tick: Tick,
    pub pickups: usize,
    pub placements: usize,
    pub moves: usize,
    /// Robots that had no legal action.
    pub idle: usize,
    /// The termination check fired during this tick.
    pub finished: bool,
}

/// Sink invoked with each tick summary.
pub trait TickObserver: Send {
    fn on_tick(&mut self, summary: &TickSummary);
}

/// No-op observer.
#[derive(Debug, Default)]
pub struct NullObserver;

impl TickObserver for NullObserver {
    fn on_tick(&mut self, _summary: &TickSummary) {}
}
