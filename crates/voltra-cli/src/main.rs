//! Voltra command-line interface.

mod output;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use voltra_parser::parse;
use voltra_solver::{Simulation, TransientParams};

#[derive(Parser)]
#[command(name = "voltra")]
#[command(about = "A time-domain lumped-circuit simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Input netlist file
    #[arg(value_name = "NETLIST")]
    netlist: PathBuf,

    /// Override the netlist's output file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbose progress output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let text = fs::read_to_string(&cli.netlist)
        .with_context(|| format!("cannot read netlist {}", cli.netlist.display()))?;
    let base_dir = cli.netlist.parent().unwrap_or_else(|| Path::new("."));

    let parsed = parse(&text, base_dir)
        .with_context(|| format!("cannot parse {}", cli.netlist.display()))?;

    let Some(transient) = parsed.analysis.transient else {
        bail!("{}: no .transient directive", cli.netlist.display());
    };
    let params = TransientParams {
        t_start: transient.t_start,
        t_stop: transient.t_stop,
        dt: transient.dt,
    };
    if params.dt <= 0.0 || params.steps() < 2 {
        bail!(
            "{}: .transient window yields {} steps",
            cli.netlist.display(),
            params.steps()
        );
    }

    if cli.verbose {
        log::info!(
            "{}: {} elements, {} nodes, {} branch currents, {} steps",
            cli.netlist.display(),
            parsed.circuit.elements.len(),
            parsed.circuit.num_nodes(),
            parsed.circuit.num_currents(),
            params.steps(),
        );
    }

    let mut simulation = Simulation::new(parsed.circuit, params, parsed.analysis.perform_dc);
    simulation.run().context("simulation failed")?;

    let output_path = cli
        .output
        .clone()
        .or(parsed.analysis.output_file)
        .unwrap_or_else(|| PathBuf::from("datadump.txt"));
    output::write_table(&output_path, &simulation)
        .with_context(|| format!("cannot write {}", output_path.display()))?;

    output::write_graph_tables(&output_path, &simulation, &parsed.analysis.graphs)
        .context("cannot write graph tables")?;

    Ok(())
}
