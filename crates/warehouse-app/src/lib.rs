//! Reporting helpers shared by the `warehouse-app` binary.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;
use warehouse_core::{
    Cell, Entity, RobotSnapshot, ShelfSnapshot, TickSummary, WarehouseConfig, World,
};

/// Load a JSON config file; missing fields fall back to defaults.
pub fn load_config(path: &Path) -> Result<WarehouseConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

/// Final state of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub ticks: u64,
    pub finished: bool,
    pub total_movements: u64,
    pub total_stacked: u64,
    pub num_boxes: usize,
    pub robots: Vec<RobotSnapshot>,
    pub shelves: Vec<ShelfSnapshot>,
    pub history: Vec<TickSummary>,
}

impl RunReport {
    #[must_use]
    pub fn capture(world: &World) -> Self {
        Self {
            ticks: world.tick().0,
            finished: !world.is_running(),
            total_movements: world.total_movements(),
            total_stacked: world.total_stacked(),
            num_boxes: world.num_boxes(),
            robots: world.robots().collect(),
            shelves: world.shelves().collect(),
            history: world.history().copied().collect(),
        }
    }
}

/// Step `world` until it finishes or `max_ticks` elapse, logging every `log_every` ticks.
pub fn drive(world: &mut World, max_ticks: u64, log_every: u64) -> Result<()> {
    while world.is_running() && world.tick().0 < max_ticks {
        let events = world.step().context("tick failed")?;
        if log_every > 0 && events.tick.0 % log_every == 0 {
            info!(
                tick = events.tick.0,
                stacked = world.total_stacked(),
                movements = world.total_movements(),
                pickups = events.pickups,
                placements = events.placements,
                "progress"
            );
        }
    }
    Ok(())
}

/// One character per cell, rows top to bottom.
///
/// `#` obstacle, `R` idle robot, `C` robot carrying a box, shelf stack height as a digit
/// (`+` past nine), `b` loose box, `.` empty.
#[must_use]
pub fn render_ascii(world: &World) -> String {
    let grid = world.grid();
    let mut frame = String::with_capacity((grid.width() as usize + 1) * grid.height() as usize);
    for y in 0..grid.height() as i32 {
        for x in 0..grid.width() as i32 {
            frame.push(cell_glyph(world, Cell::new(x, y)));
        }
        frame.push('\n');
    }
    frame
}

fn cell_glyph(world: &World, cell: Cell) -> char {
    let Ok(contents) = world.grid().cell_contents(cell) else {
        return ' ';
    };
    let entities: Vec<&Entity> = contents
        .iter()
        .filter_map(|&id| world.entities().get(id))
        .collect();
    if entities.iter().any(|e| matches!(e, Entity::Obstacle(_))) {
        return '#';
    }
    if let Some(robot) = entities.iter().find_map(|e| e.as_robot()) {
        return if robot.carrying_box() { 'C' } else { 'R' };
    }
    if let Some(shelf) = entities.iter().find_map(|e| e.as_shelf()) {
        return char::from_digit(shelf.stack_height(), 10).unwrap_or('+');
    }
    if entities.iter().any(|e| matches!(e, Entity::Parcel(_))) {
        return 'b';
    }
    '.'
}

/// Outcome of one seed in a sweep.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SweepResult {
    pub seed: u64,
    pub ticks: u64,
    pub finished: bool,
    pub total_movements: u64,
}

/// Run one independent world per seed in parallel.
pub fn sweep(
    base: &WarehouseConfig,
    seeds: impl IntoParallelIterator<Item = u64>,
    max_ticks: u64,
) -> Result<Vec<SweepResult>> {
    let mut results = seeds
        .into_par_iter()
        .map(|seed| -> Result<SweepResult> {
            let config = WarehouseConfig {
                rng_seed: Some(seed),
                ..base.clone()
            };
            let mut world =
                World::new(config).with_context(|| format!("failed to build world {seed}"))?;
            let outcome = world
                .run(max_ticks)
                .with_context(|| format!("run {seed} failed"))?;
            Ok(SweepResult {
                seed,
                ticks: world.tick().0,
                finished: outcome.finished,
                total_movements: world.total_movements(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    results.sort_by_key(|result| result.seed);
    Ok(results)
}

/// Mean ticks over finished runs.
#[must_use]
pub fn mean_ticks(results: &[SweepResult]) -> Option<f64> {
    let finished: Vec<u64> = results
        .iter()
        .filter(|r| r.finished)
        .map(|r| r.ticks)
        .collect();
    if finished.is_empty() {
        return None;
    }
    Some(finished.iter().sum::<u64>() as f64 / finished.len() as f64)
}

/// Plain-text sweep table.
#[must_use]
pub fn format_sweep(results: &[SweepResult]) -> String {
    let mut out = String::new();
    for result in results {
        let _ = writeln!(
            out,
            "seed {:>6}  ticks {:>6}  moves {:>8}  {}",
            result.seed,
            result.ticks,
            result.total_movements,
            if result.finished { "finished" } else { "timed out" }
        );
    }
    match mean_ticks(results) {
        Some(mean) => {
            let _ = writeln!(out, "mean ticks to completion: {mean:.1}");
        }
        None => {
            let _ = writeln!(out, "no run finished");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use warehouse_core::{RetrievalPolicy, Topology};

    fn small() -> WarehouseConfig {
        WarehouseConfig {
            width: 4,
            height: 3,
            topology: Topology::Bounded,
            num_robots: 0,
            num_boxes: 0,
            shelf_positions: Vec::new(),
            rng_seed: Some(1),
            ..WarehouseConfig::default()
        }
    }

    #[test]
    fn ascii_frame_marks_every_kind() {
        let mut world = World::blank(small()).expect("world");
        world.spawn_obstacle(Cell::new(0, 0), 0).expect("obstacle");
        world.spawn_robot(Cell::new(1, 0)).expect("robot");
        world.spawn_shelf(Cell::new(2, 1), 3).expect("shelf");
        world.spawn_parcel(Cell::new(3, 2)).expect("box");
        assert_eq!(render_ascii(&world), "#R..\n..0.\n...b\n");
    }

    #[test]
    fn wide_frame_has_one_break_per_row() {
        let config = WarehouseConfig {
            width: 65_536,
            height: 2,
            ..small()
        };
        let world = World::blank(config).expect("world");
        let frame = render_ascii(&world);
        assert_eq!(frame.len(), (65_536 + 1) * 2);
        assert!(frame.lines().all(|row| row.len() == 65_536));
    }

    #[test]
    fn sweep_is_ordered_and_deterministic() {
        let config = WarehouseConfig {
            width: 8,
            height: 8,
            num_robots: 2,
            num_boxes: 3,
            shelf_positions: warehouse_core::default_shelf_positions(8, 8),
            retrieval_policy: RetrievalPolicy::SeekNearest,
            ..WarehouseConfig::default()
        };
        let first = sweep(&config, 0..6_u64, 2_000).expect("sweep");
        let second = sweep(&config, 0..6_u64, 2_000).expect("sweep");
        assert_eq!(first, second);
        let seeds: Vec<u64> = first.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn mean_ignores_unfinished_runs() {
        let results = [
            SweepResult {
                seed: 0,
                ticks: 10,
                finished: true,
                total_movements: 3,
            },
            SweepResult {
                seed: 1,
                ticks: 500,
                finished: false,
                total_movements: 90,
            },
            SweepResult {
                seed: 2,
                ticks: 20,
                finished: true,
                total_movements: 7,
            },
        ];
        assert_eq!(mean_ticks(&results), Some(15.0));
        assert!(format_sweep(&results).contains("timed out"));
        assert_eq!(mean_ticks(&results[1..2]), None);
    }
}
