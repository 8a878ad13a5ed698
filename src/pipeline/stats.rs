// stats.rs
//
// Aggregate throughput and prediction statistics, accumulated per cycle and
// finalized once the trace has drained.

use std::fmt;

use serde::Serialize;

/// Final statistics for one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcStats {
    pub total_branches: u64,
    pub correct_predictions: u64,
    pub prediction_accuracy: f64,
    pub avg_disp_queue_size: f64,
    pub max_disp_queue_size: u64,
    pub avg_inst_issue: f64,
    pub avg_inst_retired: f64,
    pub retired_count: u64,
    pub cycle_count: u64,
}

/// Running counters owned by the pipeline while it ticks.
#[derive(Debug, Default)]
pub struct StatsAccumulator {
    pub total_branches: u64,
    pub correct_predictions: u64,
    pub total_disp_queue_size: u64,
    pub max_disp_queue_size: u64,
    pub issued: u64,
    pub retired: u64,
}

impl StatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the dispatch queue occupancy once per cycle.
    pub fn sample_disp_queue(&mut self, size: usize) {
        let size = size as u64;
        self.total_disp_queue_size += size;
        self.max_disp_queue_size = self.max_disp_queue_size.max(size);
    }

    pub fn record_retired_branch(&mut self, correct: bool) {
        self.total_branches += 1;
        if correct {
            self.correct_predictions += 1;
        }
    }

    /// Fold the counters into per-cycle averages. A branch-free run reports
    /// an accuracy of 0 rather than NaN.
    pub fn finalize(&self, cycle_count: u64) -> ProcStats {
        let cycles = cycle_count.max(1) as f64;
        let prediction_accuracy = if self.total_branches == 0 {
            0.0
        } else {
            self.correct_predictions as f64 / self.total_branches as f64
        };

        ProcStats {
            total_branches: self.total_branches,
            correct_predictions: self.correct_predictions,
            prediction_accuracy,
            avg_disp_queue_size: self.total_disp_queue_size as f64 / cycles,
            max_disp_queue_size: self.max_disp_queue_size,
            avg_inst_issue: self.issued as f64 / cycles,
            avg_inst_retired: self.retired as f64 / cycles,
            retired_count: self.retired,
            cycle_count,
        }
    }
}

impl fmt::Display for ProcStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processor stats:")?;
        writeln!(f, "Total branch instructions: {}", self.total_branches)?;
        writeln!(
            f,
            "Total correct predicted branch instructions: {}",
            self.correct_predictions
        )?;
        writeln!(f, "prediction accuracy: {:.6}", self.prediction_accuracy)?;
        writeln!(f, "Avg Dispatch queue size: {:.6}", self.avg_disp_queue_size)?;
        writeln!(f, "Maximum Dispatch queue size: {}", self.max_disp_queue_size)?;
        writeln!(f, "Avg inst Issue per cycle: {:.6}", self.avg_inst_issue)?;
        writeln!(f, "Avg inst retired per cycle: {:.6}", self.avg_inst_retired)?;
        write!(f, "Total run time (cycles): {}", self.cycle_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_free_accuracy_is_zero() {
        let acc = StatsAccumulator::new();
        let stats = acc.finalize(10);
        assert_eq!(stats.prediction_accuracy, 0.0);
        assert_eq!(stats.total_branches, 0);
    }

    #[test]
    fn averages_divide_by_cycle_count() {
        let mut acc = StatsAccumulator::new();
        acc.issued = 20;
        acc.retired = 10;
        acc.sample_disp_queue(4);
        acc.sample_disp_queue(8);
        acc.record_retired_branch(true);
        acc.record_retired_branch(false);

        let stats = acc.finalize(10);
        assert_eq!(stats.avg_inst_issue, 2.0);
        assert_eq!(stats.avg_inst_retired, 1.0);
        assert_eq!(stats.max_disp_queue_size, 8);
        assert_eq!(stats.avg_disp_queue_size, 1.2);
        assert_eq!(stats.prediction_accuracy, 0.5);
    }
}
