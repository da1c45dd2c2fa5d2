mod tracing;

use crate::tracing::Tracer;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use itertools::Itertools;
use pennylane::serialize::load_json_file;
use pennylane::simulator::{simulate, McmMethod, SimulationConfig};
use pennylane::transforms::{decompose, DecomposeOptions, GateSet, PostselectMode};

/// Simulate circuits with mid-circuit measurements.
#[derive(Parser, Debug)]
#[clap(version = "1.0", long_about = None)]
#[clap(about = "Simulate a quantum circuit given in JSON format.")]
struct CmdLineArgs {
    /// Input circuit file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Input. A quantum circuit in JSON format."
    )]
    input: PathBuf,
    /// Output results file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Output. The simulation results as JSON. Printed to stdout if missing."
    )]
    output: Option<PathBuf>,
    /// Number of shots, overriding the circuit.
    #[arg(short, long, value_name = "SHOTS", help = "Number of shots.")]
    shots: Option<usize>,
    /// Random seed.
    #[arg(long, value_name = "SEED", help = "Seed for sampling.")]
    seed: Option<u64>,
    /// Mid-circuit measurement method.
    #[arg(
        short,
        long = "mcm-method",
        default_value = "tree",
        value_name = "METHOD",
        help = "How mid-circuit measurements are simulated: tree or one-shot."
    )]
    mcm_method: McmMethod,
    /// Postselection mode of the one-shot method.
    #[arg(
        long = "postselect-mode",
        default_value = "hw-like",
        value_name = "MODE",
        help = "Handling of rejected shots in one-shot mode: hw-like, fill-shots or pad-invalid-samples."
    )]
    postselect_mode: PostselectMode,
    /// Gate set to decompose into before simulating.
    #[arg(
        short,
        long = "gate-set",
        value_delimiter = ',',
        value_name = "GATES",
        help = "Decompose the circuit into these gates before simulating, e.g. RX,RZ,CNOT."
    )]
    gate_set: Vec<String>,
    /// Use the graph-based decomposition.
    #[arg(long, help = "Choose decompositions with the decomposition graph.")]
    graph: bool,
    /// Maximum decomposition depth.
    #[arg(long = "max-expansion", value_name = "DEPTH", help = "Maximum decomposition depth.")]
    max_expansion: Option<usize>,
    /// Log output file
    #[arg(
        short,
        long,
        value_name = "LOGFILE",
        help = "Logfile for the simulation and decomposition events."
    )]
    logfile: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = CmdLineArgs::parse();

    // We need to keep the object around to keep the logging active.
    let _tracer = Tracer::setup_tracing(opts.logfile)?;

    let mut circ = load_json_file(&opts.input)?;
    if let Some(shots) = opts.shots {
        circ = circ.with_shots(shots);
    }

    if !opts.gate_set.is_empty() {
        eprintln!("Decomposing into {}...", opts.gate_set.iter().join(", "));
        let options = DecomposeOptions {
            gate_set: Some(GateSet::names(&opts.gate_set)),
            max_expansion: opts.max_expansion,
            graph: opts.graph,
            ..Default::default()
        };
        let mut out = decompose(&circ, &options)?;
        let decomposed = out.circuits.pop().ok_or("decompose returned no circuit")?;
        eprintln!(
            "{} operations before, {} after.",
            circ.num_operations(),
            decomposed.num_operations()
        );
        circ = decomposed;
    }

    let config = SimulationConfig {
        seed: opts.seed,
        mcm_method: opts.mcm_method,
        postselect_mode: opts.postselect_mode,
    };
    let results = simulate(&circ, &config)?;

    let mut writer: Box<dyn Write> = match &opts.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    serde_json::to_writer_pretty(&mut writer, &results)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
