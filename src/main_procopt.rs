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

// main_procopt.rs
//
// Parameter-sweep driver. For every trace given on the command line it runs
// the full grid of pipeline configurations, ranks them by IPC and reports
// the cheapest configuration within 95% of the best, the same procedure the
// classic procopt tool used. Each run owns its own pipeline; nothing is
// shared between configurations.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use colored::Colorize;
use serde::Serialize;

use procsim_rust::errors::SimulatorError;
use procsim_rust::pipeline::config::PipelineOptions;
use procsim_rust::pipeline::simulator::Pipeline;
use procsim_rust::utils::parser::parse_trace;

/// Keep configurations whose IPC is at least this fraction of the best.
const TARGET_RATIO: f64 = 0.95;

#[derive(Parser)]
#[command(name = "procopt")]
#[command(about = "Sweep pipeline configurations and pick the cheapest near-optimal one")]
#[command(version)]
struct Cli {
    /// Trace files to optimize over
    #[arg(required = true)]
    traces: Vec<PathBuf>,

    /// Human-readable results file
    #[arg(long, default_value = "procopt.out")]
    output: PathBuf,

    /// Full per-configuration data, as JSON
    #[arg(long, default_value = "procopt.full.json")]
    full_output: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Serialize)]
struct PipelineRun {
    f: usize,
    j: usize,
    k: usize,
    l: usize,
    r: usize,
    ipc: f64,
    prediction_accuracy: f64,
}

impl PipelineRun {
    /// Hardware cost proxy used to break ties among the candidates.
    fn cost(&self) -> usize {
        self.j + self.k + self.l + self.r
    }
}

#[derive(Debug, Serialize)]
struct TraceSweep {
    trace: String,
    runs: Vec<PipelineRun>,
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
    let mut outfile = BufWriter::new(File::create(&cli.output)?);
    let mut sweeps = Vec::new();

    for trace_path in &cli.traces {
        let trace = parse_trace(trace_path)?;
        println!("{} {}", "Optimizing".green().bold(), trace_path.display());

        let runs = sweep(&trace)?;
        report_trace(&mut outfile, &trace_path.display().to_string(), &runs)?;

        sweeps.push(TraceSweep {
            trace: trace_path.display().to_string(),
            runs,
        });

        println!("{} {}", "Completed".green(), trace_path.display());
    }

    let full = File::create(&cli.full_output)?;
    serde_json::to_writer_pretty(BufWriter::new(full), &sweeps)
        .map_err(|e| SimulatorError::IoError(e.into()))?;

    println!(
        "Results in {} and {}",
        cli.output.display().to_string().cyan(),
        cli.full_output.display().to_string().cyan()
    );
    Ok(())
}

/// Run the whole configuration grid over one trace.
fn sweep(trace: &[procsim_rust::Instruction]) -> Result<Vec<PipelineRun>, SimulatorError> {
    let mut runs = Vec::with_capacity(160);

    for f in [4, 8] {
        for j in 1..=2 {
            for k in 1..=2 {
                for l in 1..=2 {
                    for r in 1..=10 {
                        let options = PipelineOptions::new(f, j, k, l, r);
                        let mut pipeline = Pipeline::new(trace.to_vec(), options)?;
                        let stats = pipeline.run();

                        runs.push(PipelineRun {
                            f,
                            j,
                            k,
                            l,
                            r,
                            ipc: stats.avg_inst_retired,
                            prediction_accuracy: stats.prediction_accuracy,
                        });
                    }
                }
            }
        }
    }

    Ok(runs)
}

fn report_trace<W: Write>(
    out: &mut W,
    trace_name: &str,
    runs: &[PipelineRun],
) -> std::io::Result<()> {
    let mut ranked: Vec<&PipelineRun> = runs.iter().collect();
    ranked.sort_by(|a, b| b.ipc.partial_cmp(&a.ipc).unwrap_or(std::cmp::Ordering::Equal));

    let best_ipc = ranked[0].ipc;
    let mut candidates: Vec<&PipelineRun> = ranked
        .iter()
        .copied()
        .filter(|run| run.ipc > TARGET_RATIO * best_ipc)
        .collect();

    writeln!(out, "# Results for {}", trace_name)?;
    writeln!(out, "====================================================")?;
    writeln!(out)?;
    writeln!(out, "* >95% of Best IPC ({:.4})", best_ipc)?;
    for run in &candidates {
        writeln!(
            out,
            "- F: {} J: {} K: {} L: {} R: {}",
            run.f, run.j, run.k, run.l, run.r
        )?;
        writeln!(out, "--- Prediction accuracy: {:.2}%", run.prediction_accuracy * 100.0)?;
        writeln!(
            out,
            "--- Best IPC: {:.4}, Found IPC: {:.4} ({:.2}%)",
            best_ipc,
            run.ipc,
            run.ipc / best_ipc * 100.0
        )?;
    }

    // Cheapest configuration among the candidates.
    candidates.sort_by_key(|run| run.cost());
    let cheapest = candidates[0];

    writeln!(out)?;
    writeln!(out, "* Cheapest Configuration")?;
    writeln!(
        out,
        "- F: {} J: {} K: {} L: {} R: {}",
        cheapest.f, cheapest.j, cheapest.k, cheapest.l, cheapest.r
    )?;
    writeln!(out, "--- Prediction accuracy: {:.2}%", cheapest.prediction_accuracy * 100.0)?;
    writeln!(
        out,
        "--- Best IPC: {:.4}, Found IPC: {:.4} ({:.2}%)",
        best_ipc,
        cheapest.ipc,
        cheapest.ipc / best_ipc * 100.0
    )?;
    writeln!(out, "====================================================")?;
    writeln!(out)?;

    Ok(())
}
