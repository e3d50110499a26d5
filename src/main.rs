#![allow(clippy::cognitive_complexity, clippy::cast_precision_loss)]
#![warn(clippy::unwrap_in_result, clippy::unwrap_used)]
#![warn(
    rust_2018_idioms,
    rust_2021_compatibility,
    arithmetic_overflow,
    nonstandard_style,
    clippy::disallowed_types,
    clippy::nursery,
    // clippy::pedantic
)]
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use human_repr::{HumanCount, HumanDuration};
use roadnav::{
    common::RelativeTime,
    event::Event,
    model::RoadGraph,
    route::{ExpansionPolicy, Route, RoutePlanner},
};
use serde::{Deserialize, Serialize};
use shadow_rs::shadow;
use tracing::*;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

shadow!(build);

/// Route computation described by a TOML file
#[derive(Deserialize, Serialize, Debug)]
#[serde(deny_unknown_fields)]
struct Job {
    graph: PathBuf,
    start: [f32; 2],
    end: [f32; 2],
    #[serde(default)]
    policy: ExpansionPolicy,
    #[serde(default)]
    json: bool,
    #[serde(default)]
    quiet: bool,
}

impl Job {
    fn load(path: &Path) -> Result<Self> {
        Ok(toml::from_str(&fs_err::read_to_string(path)?)?)
    }

    fn run(self, status_interval: Duration) -> Result<Option<Route>> {
        let graph = RoadGraph::load(&self.graph)?;
        let [start_x, start_y] = self.start;
        let [end_x, end_y] = self.end;
        let mut planner =
            RoutePlanner::new(&graph, start_x, start_y, end_x, end_y)?
                .with_policy(self.policy);
        planner.status_interval = status_interval;
        planner.set_callback(Box::new(|event: &Event| {
            info!("{event}");
            Ok(())
        }));
        let route = planner.run_search()?.cloned();
        let dt = planner.stats().map(|s| s.elapsed).unwrap_or_default();
        match route.as_ref() {
            Some(route) if self.json => {
                println!("{}", serde_json::to_string_pretty(route)?);
            }
            Some(route) => print_route(dt, route, self.quiet),
            None => warn!("No route found"),
        }
        Ok(route)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum Policy {
    /// Never revisit a node once it has been discovered
    #[default]
    FirstDiscovery,
    /// Update discovered nodes when a shorter path to them is found
    Relax,
}

impl From<Policy> for ExpansionPolicy {
    fn from(val: Policy) -> Self {
        match val {
            Policy::FirstDiscovery => Self::FirstDiscovery,
            Policy::Relax => Self::Relax,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Compute route between two points
    #[command(allow_negative_numbers = true)]
    Route {
        /// Road network in JSON format
        #[arg(long, short)]
        graph: PathBuf,
        /// How to treat nodes that were already discovered
        #[arg(long, short, value_enum, default_value_t)]
        policy: Policy,
        /// Print route as JSON
        #[arg(long, short)]
        json: bool,
        /// Don't print computed route when done
        #[arg(long, short)]
        quiet: bool,
        /// Start X coordinate (0-100)
        start_x: f32,
        /// Start Y coordinate (0-100)
        start_y: f32,
        /// End X coordinate (0-100)
        end_x: f32,
        /// End Y coordinate (0-100)
        end_y: f32,
    },
    /// Run route computation described by a TOML job file
    Job {
        /// Path of the job file
        path: PathBuf,
    },
}

fn long_version() -> String {
    use std::fmt::Write;
    let mut ret = version();
    ret.push('\n');
    if !build::TAG.is_empty() {
        writeln!(&mut ret, "tag: {}", build::TAG)
            .unwrap_or_else(|_| unreachable!());
    }
    writeln!(&mut ret, "rustc {},{}", build::RUST_VERSION, build::RUST_CHANNEL)
        .unwrap_or_else(|_| unreachable!());
    ret
}

fn version() -> String {
    format!(
        "v{} ({} {})",
        build::PKG_VERSION,
        build::SHORT_COMMIT,
        build::BUILD_TIME
    )
}

#[derive(Parser, Debug)]
#[command(author, about, long_about = None, version = version(), long_version = long_version())]
struct Cli {
    /// Minimum time between printing progress updates
    #[arg(short = 'i', long, default_value_t = 0.5)]
    progress_interval: f64,
    /// Command to run
    #[command(subcommand)]
    cmd: Option<Command>,
}

fn print_route(dt: Duration, route: &Route, quiet: bool) {
    use yansi::Paint;
    info!(
        "Route computed in {}: {} nodes, {}",
        dt.human_duration(),
        route.nodes.len(),
        route.distance.human_count("m")
    );
    if !quiet {
        let last = route.nodes.len().saturating_sub(1);
        for (n, node) in route.nodes.iter().enumerate() {
            let name = format!("{node}");
            if n == 0 || n == last {
                println!("<{n}> {}", name.green().bold());
            } else {
                println!(" {n}  {name}");
            }
        }
    }
    println!("Distance: {} meters", route.distance);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .event_format(fmt::format().with_ansi(yansi::is_enabled()))
                .with_timer(RelativeTime::default())
                .compact(),
        )
        .with(
            EnvFilter::try_from_env("ROADNAV_LOG")
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

fn run() -> Result<()> {
    let args = Cli::parse();
    init_tracing();
    let status_interval = Duration::from_secs_f64(args.progress_interval);
    let Some(cmd) = args.cmd else {
        Cli::command().print_long_help()?;
        return Ok(());
    };
    let job = match cmd {
        Command::Route {
            graph,
            policy,
            json,
            quiet,
            start_x,
            start_y,
            end_x,
            end_y,
        } => Job {
            graph,
            start: [start_x, start_y],
            end: [end_x, end_y],
            policy: policy.into(),
            json,
            quiet,
        },
        Command::Job { path } => Job::load(&path)?,
    };
    debug!("{job:?}");
    job.run(status_interval)?;
    Ok(())
}

fn main() -> Result<()> {
    use yansi::Condition;
    color_eyre::install()?;
    yansi::whenever(Condition::DEFAULT);
    run()?;
    Ok(())
}
