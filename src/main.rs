// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// main.rs
//
// This file contains the main entry point for the pipeline simulator.
// It parses the command line, runs one simulation over the given trace and
// writes the report next to the trace file as `<trace>.out`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;

use procsim_rust::errors::SimulatorError;
use procsim_rust::pipeline::config::PipelineOptions;
use procsim_rust::pipeline::simulator::Pipeline;
use procsim_rust::report::write_report;
use procsim_rust::utils::parser::parse_trace;

#[derive(Parser)]
#[command(name = "procsim_rust")]
#[command(about = "A cycle-accurate out-of-order superscalar pipeline simulator")]
#[command(version)]
struct Cli {
    /// Result bus count
    #[arg(short = 'r')]
    r: usize,

    /// Fetch / dispatch width
    #[arg(short = 'f')]
    f: usize,

    /// Number of type-0 functional units
    #[arg(short = 'j')]
    j: usize,

    /// Number of type-1 functional units
    #[arg(short = 'k')]
    k: usize,

    /// Number of type-2 functional units
    #[arg(short = 'l')]
    l: usize,

    /// Trace file
    #[arg(short = 'i')]
    input: Option<PathBuf>,

    /// Trace file as a positional argument (when -i is not given)
    trace: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    if let Err(err) = run(&cli) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), SimulatorError> {
    let trace_path = cli
        .input
        .as_ref()
        .or(cli.trace.as_ref())
        .cloned()
        .ok_or(SimulatorError::MissingTraceArgument)?;

    let options = PipelineOptions::new(cli.f, cli.j, cli.k, cli.l, cli.r);
    options.validate()?;

    let trace = parse_trace(&trace_path)?;
    info!(
        "simulating {} instructions (F={}, J={}, K={}, L={}, R={})",
        trace.len(),
        options.f,
        options.j,
        options.k,
        options.l,
        options.r
    );

    let mut pipeline = Pipeline::new(trace, options)?;
    let stats = pipeline.run();

    let out_path = report_path(&trace_path);
    let file = File::create(&out_path)?;
    let mut writer = BufWriter::new(file);
    write_report(&mut writer, pipeline.options(), pipeline.ledger(), &stats)?;

    println!("Report written to {}", out_path.display());
    Ok(())
}

/// Report lands next to the trace as `<trace>.out`.
fn report_path(trace_path: &std::path::Path) -> PathBuf {
    let mut name = trace_path.as_os_str().to_os_string();
    name.push(".out");
    PathBuf::from(name)
}
