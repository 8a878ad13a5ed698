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

// config.rs
//
// This file contains the configuration struct for the pipeline simulator.
// The five parameters mirror the classic simulator knobs: fetch width F,
// per-type functional unit counts J/K/L, and result bus count R.

use serde::Serialize;

use crate::errors::SimulatorError;

/// Pipeline sizing parameters.
///
/// The scheduling queue holds `2 * (J + K + L)` reservation stations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineOptions {
    /// Fetch / dispatch width (instructions per cycle).
    pub f: usize,
    /// Type-0 functional units.
    pub j: usize,
    /// Type-1 functional units.
    pub k: usize,
    /// Type-2 functional units.
    pub l: usize,
    /// Result (common data) buses.
    pub r: usize,
}

impl PipelineOptions {
    pub fn new(f: usize, j: usize, k: usize, l: usize, r: usize) -> Self {
        Self { f, j, k, l, r }
    }

    /// Reject configurations the core cannot run: a widthless front end, no
    /// result buses, or an empty scheduling queue.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.f < 1 {
            return Err(SimulatorError::InvalidFetchWidth(self.f));
        }
        if self.r < 1 {
            return Err(SimulatorError::InvalidResultBusCount(self.r));
        }
        if self.j + self.k + self.l < 1 {
            return Err(SimulatorError::EmptySchedulingQueue);
        }
        Ok(())
    }

    /// Functional unit count for a type in 0..3.
    pub fn fu_count(&self, fu_type: usize) -> usize {
        match fu_type {
            0 => self.j,
            1 => self.k,
            _ => self.l,
        }
    }

    /// Capacity of the scheduling queue.
    pub fn sched_queue_size(&self) -> usize {
        2 * (self.j + self.k + self.l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_minimal_configuration() {
        assert!(PipelineOptions::new(1, 0, 1, 0, 1).validate().is_ok());
    }

    #[test]
    fn rejects_zero_width_and_zero_buses() {
        assert!(PipelineOptions::new(0, 1, 1, 1, 1).validate().is_err());
        assert!(PipelineOptions::new(4, 1, 1, 1, 0).validate().is_err());
    }

    #[test]
    fn rejects_empty_scheduling_queue() {
        assert!(PipelineOptions::new(4, 0, 0, 0, 2).validate().is_err());
    }

    #[test]
    fn sched_queue_is_twice_the_unit_count() {
        let opt = PipelineOptions::new(4, 1, 2, 1, 2);
        assert_eq!(opt.sched_queue_size(), 8);
        assert_eq!(opt.fu_count(1), 2);
    }
}
