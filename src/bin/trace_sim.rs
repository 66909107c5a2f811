use clap::Parser;
use reconfigsim_rs::trace::{self, RunSummary};
use reconfigsim_rs::{NetWorld, SimTime, Simulator, TopologyManager};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(
    name = "trace-sim",
    about = "Run a reconfigurable-network trace on the analytical simulator"
)]
struct Args {
    /// Path to the trace file
    trace: PathBuf,

    /// Run until this simulated time (ns); defaults to running until completion
    #[arg(long)]
    until_ns: Option<u64>,

    /// Write per-chunk arrivals and the finish time as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let raw = match fs::read_to_string(&args.trace) {
        Ok(raw) => raw,
        Err(err) => {
            eprintln!(
                "failed to open trace file {}: {err}",
                args.trace.display()
            );
            process::exit(1);
        }
    };

    let spec = match trace::parse(&raw) {
        Ok(spec) => spec,
        Err(err) => {
            eprintln!("invalid trace file {}: {err}", args.trace.display());
            process::exit(1);
        }
    };

    let mut sim = Simulator::default();
    let mut tm = TopologyManager::new(spec.npus_count, spec.npus_count, BTreeMap::new());
    tm.set_reconfig_latency(spec.reconfig_latency_ns as f64);
    let mut world = NetWorld::new(tm);

    let arrivals = trace::replay(&spec, &mut sim, &mut world, args.until_ns.map(SimTime));

    for record in &arrivals {
        println!(
            "A chunk arrived at destination at time: {} ns",
            record.arrived_at_ns
        );
    }
    println!("Total NPUs Count: {}", spec.npus_count);
    println!("Simulation finished at time: {} ns", sim.now().0);

    if let Some(path) = args.summary_json {
        let summary = RunSummary {
            npus_count: spec.npus_count,
            finish_time_ns: sim.now().0,
            delivered_chunks: world.tm.stats.delivered_chunks,
            delivered_bytes: world.tm.stats.delivered_bytes,
            arrivals,
        };
        let json = serde_json::to_string_pretty(&summary).expect("serialize run summary");
        fs::write(&path, json).expect("write summary json");
        eprintln!("wrote run summary to {}", path.display());
    }
}
