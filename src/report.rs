// report.rs
//
// Text report writer. The report mirrors the classic simulator output: a
// settings header, one tab-separated row per retired instruction with its
// one-based stage-entry cycles, and the aggregate statistics block.

use std::io::Write;

use crate::pipeline::config::PipelineOptions;
use crate::pipeline::stats::ProcStats;
use crate::pipeline::status::{Stage, StatusLedger};

/// Render the full report for one finished run.
pub fn write_report<W: Write>(
    out: &mut W,
    options: &PipelineOptions,
    ledger: &StatusLedger,
    stats: &ProcStats,
) -> std::io::Result<()> {
    writeln!(out, "Processor Settings")?;
    writeln!(out, "R: {}", options.r)?;
    writeln!(out, "k0: {}", options.j)?;
    writeln!(out, "k1: {}", options.k)?;
    writeln!(out, "k2: {}", options.l)?;
    writeln!(out, "F: {}", options.f)?;
    writeln!(out)?;

    writeln!(out, "INST\tFETCH\tDISP\tSCHED\tEXEC\tSTATE")?;
    for (row_no, row) in ledger.report_rows().enumerate() {
        write!(out, "{}", row_no + 1)?;
        for stage in [
            Stage::Fetch,
            Stage::Dispatch,
            Stage::Schedule,
            Stage::Execute,
            Stage::StateUpdate,
        ] {
            match row.cycle_entered(stage) {
                // Cycles are stored zero-based; the report is one-based.
                Some(cycle) => write!(out, "\t{}", cycle + 1)?,
                None => write!(out, "\t-")?,
            }
        }
        writeln!(out)?;
    }
    writeln!(out)?;

    writeln!(out, "{}", stats)?;
    Ok(())
}

/// Render the report into a string (used by the determinism tests).
pub fn report_string(
    options: &PipelineOptions,
    ledger: &StatusLedger,
    stats: &ProcStats,
) -> String {
    let mut buf = Vec::new();
    write_report(&mut buf, options, ledger, stats).expect("writing to a Vec cannot fail");
    String::from_utf8(buf).expect("report is valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::stats::StatsAccumulator;
    use crate::pipeline::status::StatusLedger;

    #[test]
    fn report_rows_are_one_based() {
        let options = PipelineOptions::new(4, 1, 1, 1, 2);
        let mut ledger = StatusLedger::new();
        ledger.open(0, 0, false);
        ledger.record(0, Stage::Fetch, 0);
        ledger.record(0, Stage::Dispatch, 1);
        ledger.record(0, Stage::Schedule, 2);
        ledger.record(0, Stage::Execute, 3);
        ledger.record(0, Stage::StateUpdate, 4);
        ledger.mark_retired(0);

        let stats = StatsAccumulator::new().finalize(5);
        let text = report_string(&options, &ledger, &stats);

        assert!(text.contains("Processor Settings"));
        assert!(text.contains("INST\tFETCH\tDISP\tSCHED\tEXEC\tSTATE"));
        assert!(text.contains("1\t1\t2\t3\t4\t5"));
        assert!(text.contains("Total run time (cycles): 5"));
    }

    #[test]
    fn squashed_rows_are_omitted() {
        let options = PipelineOptions::new(4, 1, 1, 1, 2);
        let mut ledger = StatusLedger::new();
        ledger.open(0, 0, false);
        ledger.record(0, Stage::Fetch, 0);
        ledger.mark_retired(0);
        ledger.open(1, 1, true);
        ledger.record(1, Stage::Fetch, 1);
        ledger.mark_squashed(1);

        let stats = StatsAccumulator::new().finalize(5);
        let text = report_string(&options, &ledger, &stats);

        assert_eq!(text.matches("\n1\t").count(), 1);
        assert!(!text.contains("\n2\t"));
    }
}
