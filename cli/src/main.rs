use std::{
    fs::File,
    io::{stdout, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use cache_sim::{
    config::{Geometry, GeometryConfig},
    common::TraceRecord,
    sim::{Accesses, Simulator, Summary},
    trace::parse_trace,
};
use clap::Parser;

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

/// Replays a valgrind memory trace against a set-associative LRU cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of set index bits (2^s sets)
    #[arg(short)]
    s: Option<u32>,
    /// Associativity (number of lines per set)
    #[arg(short = 'E', value_name = "E")]
    e: Option<usize>,
    /// Number of block offset bits (2^b bytes per block)
    #[arg(short)]
    b: Option<u32>,
    /// File path to the trace to replay
    #[arg(short, long)]
    trace: PathBuf,
    /// File path to a JSON geometry (`{"s": .., "E": .., "b": ..}`); flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Print the outcome of every data reference
    #[arg(short, long)]
    verbose: bool,
    /// Also write `hits misses evictions` to this file
    #[arg(long)]
    results: Option<PathBuf>,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
    let geometry = read_geometry(&args)?;
    let trace = read_trace(&args.trace)?;
    let records = parse_trace(&trace)?;
    log::info!("finished parsing trace. # of records: {}", records.len());

    let mut sim = Simulator::new(geometry)?;
    let mut out = stdout().lock();
    for r in &records {
        let accesses = sim.step(r);
        if args.verbose {
            if let Some(line) = verbose_line(r, &accesses) {
                writeln!(out, "{line}")?;
            }
        }
    }
    output_stat(&sim);
    let summary = sim.finish();

    if args.json {
        writeln!(out, "{}", serde_json::to_string(&summary)?)?;
    } else {
        writeln!(out, "{summary}")?;
    }
    if let Some(path) = args.results {
        write_results(&path, &summary)?;
    }
    Ok(())
}

/// `K addr,size outcome[ outcome]`; instruction fetches print nothing.
fn verbose_line(record: &TraceRecord, accesses: &Accesses) -> Option<String> {
    if accesses.is_empty() {
        None
    } else {
        Some(format!("{record} {accesses}"))
    }
}

fn read_geometry(args: &Cli) -> Result<Geometry> {
    let mut config = match &args.config {
        Some(p) => {
            let file = File::open(p).with_context(|| format!("cannot open {}", p.display()))?;
            GeometryConfig::deser(file)?
        }
        None => Default::default(),
    };
    config.merge(GeometryConfig {
        s: args.s,
        e: args.e,
        b: args.b,
    });
    let geometry = config.into_geometry()?;
    log::info!("cache geometry: {geometry}");
    Ok(geometry)
}

fn read_trace(path: &Path) -> Result<String> {
    let mut buf = String::new();
    let mut file =
        File::open(path).with_context(|| format!("cannot open trace file {}", path.display()))?;
    file.read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_results(path: &Path, summary: &Summary) -> Result<()> {
    let c = summary.counters;
    let mut out = File::create(path)?;
    writeln!(out, "{} {} {}", c.hits, c.misses, c.evictions)?;
    Ok(())
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().framed(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}
