use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};
use warehouse_app::{RunReport, drive, format_sweep, load_config, render_ascii, sweep};
use warehouse_core::{
    RetrievalPolicy, TargetSearch, Topology, WarehouseConfig, World, default_shelf_positions,
};

#[derive(Parser, Debug)]
#[command(
    name = "warehouse-app",
    version,
    about = "Run the warehouse robots simulation headlessly"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one world until every box is stacked or the tick limit is hit.
    Run {
        #[command(flatten)]
        world: WorldArgs,
        /// Log progress every N ticks (0 disables).
        #[arg(long, default_value_t = 100)]
        log_every: u64,
        /// Print the final report as JSON.
        #[arg(long)]
        json: bool,
        /// Print an ASCII frame of the final grid.
        #[arg(long)]
        render: bool,
    },
    /// Run many seeds in parallel and report ticks to completion.
    Sweep {
        #[command(flatten)]
        world: WorldArgs,
        /// Number of seeds to run.
        #[arg(long, default_value_t = 16)]
        runs: u64,
        /// First seed of the sweep.
        #[arg(long, default_value_t = 0)]
        base_seed: u64,
    },
}

#[derive(Args, Debug)]
struct WorldArgs {
    /// JSON config file; flags below override its fields.
    #[arg(long, env = "WAREHOUSE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    robots: Option<usize>,
    #[arg(long)]
    boxes: Option<usize>,
    #[arg(long)]
    shelf_height: Option<u32>,
    #[arg(long, value_enum)]
    topology: Option<TopologyArg>,
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,
    /// Use bucketed target search with this bucket size.
    #[arg(long)]
    bucket_size: Option<u32>,
    /// Limit target searches to this Manhattan radius.
    #[arg(long)]
    vision_radius: Option<u32>,
    #[arg(long, env = "WAREHOUSE_SEED")]
    seed: Option<u64>,
    /// Stop after this many ticks even if boxes remain.
    #[arg(long, default_value_t = 10_000)]
    max_ticks: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TopologyArg {
    Bounded,
    Toroidal,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Explore,
    SeekNearest,
}

impl WorldArgs {
    fn resolve(&self) -> Result<WarehouseConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => WarehouseConfig::default(),
        };
        let resized = self.width.is_some() || self.height.is_some();
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        // The built-in layout follows the grid; a file layout is kept as written.
        if resized && self.config.is_none() {
            config.shelf_positions = default_shelf_positions(config.width, config.height);
        }
        if let Some(robots) = self.robots {
            config.num_robots = robots;
        }
        if let Some(boxes) = self.boxes {
            config.num_boxes = boxes;
        }
        if let Some(height) = self.shelf_height {
            config.shelf_max_height = height;
        }
        if let Some(topology) = self.topology {
            config.topology = match topology {
                TopologyArg::Bounded => Topology::Bounded,
                TopologyArg::Toroidal => Topology::Toroidal,
            };
        }
        if let Some(policy) = self.policy {
            config.retrieval_policy = match policy {
                PolicyArg::Explore => RetrievalPolicy::Explore,
                PolicyArg::SeekNearest => RetrievalPolicy::SeekNearest,
            };
        }
        if let Some(cell_size) = self.bucket_size {
            config.target_search = TargetSearch::Bucketed { cell_size };
        }
        if self.vision_radius.is_some() {
            config.vision_radius = self.vision_radius;
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            world,
            log_every,
            json,
            render,
        } => run(&world, log_every, json, render),
        Command::Sweep {
            world,
            runs,
            base_seed,
        } => run_sweep(&world, runs, base_seed),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run(args: &WorldArgs, log_every: u64, json: bool, render: bool) -> Result<()> {
    let config = args.resolve()?;
    let mut world = World::new(config).context("failed to create world")?;
    drive(&mut world, args.max_ticks, log_every)?;

    if world.is_running() {
        warn!(
            ticks = world.tick().0,
            stacked = world.total_stacked(),
            boxes = world.num_boxes(),
            "tick limit reached before every box was stacked"
        );
    } else {
        info!(
            ticks = world.tick().0,
            movements = world.total_movements(),
            "run complete"
        );
    }

    if render {
        print!("{}", render_ascii(&world));
    }
    let report = RunReport::capture(&world);
    if json {
        let body = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{body}");
    } else {
        println!(
            "ticks={} finished={} stacked={}/{} movements={}",
            report.ticks,
            report.finished,
            report.total_stacked,
            report.num_boxes,
            report.total_movements
        );
    }
    Ok(())
}

fn run_sweep(args: &WorldArgs, runs: u64, base_seed: u64) -> Result<()> {
    let config = args.resolve()?;
    let end = base_seed
        .checked_add(runs)
        .context("seed range overflows u64")?;
    info!(runs, base_seed, "starting sweep");
    let results = sweep(&config, base_seed..end, args.max_ticks)?;
    print!("{}", format_sweep(&results));
    Ok(())
}
