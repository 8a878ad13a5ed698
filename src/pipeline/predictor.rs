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

// predictor.rs
//
// This file contains the GShare branch predictor used by the pipeline. It
// keeps a table of 2-bit saturating counters indexed by a hash of the branch
// address and the global history register.

/// GShare predictor: `rows` address-hashed rows, each holding one saturating
/// counter per global-history pattern.
///
/// Counters start at the weakly-not-taken value 1 and the GHR starts at 0,
/// so a cold predictor says not-taken.
pub struct BranchPredictor {
    table: Vec<Vec<u8>>,
    rows: usize,
    counter_bits: u32,
    ghr: usize,
    ghr_bits: u32,
}

/// Table rows used by the reference configuration.
pub const PREDICTOR_ROWS: usize = 128;
/// Global history register width in bits.
pub const GHR_BITS: u32 = 3;
/// Saturating counter width in bits.
pub const COUNTER_BITS: u32 = 2;

impl BranchPredictor {
    pub fn new() -> Self {
        Self::with_geometry(PREDICTOR_ROWS, GHR_BITS, COUNTER_BITS)
    }

    pub fn with_geometry(rows: usize, ghr_bits: u32, counter_bits: u32) -> Self {
        let columns = 1usize << ghr_bits;
        Self {
            table: vec![vec![1u8; columns]; rows],
            rows,
            counter_bits,
            ghr: 0,
            ghr_bits,
        }
    }

    fn row_of(&self, addr: u32) -> usize {
        (addr as usize / 4) % self.rows
    }

    /// Predict the outcome of a branch at `addr` with the current history.
    pub fn predict(&self, addr: u32) -> bool {
        let counter = self.table[self.row_of(addr)][self.ghr];
        u32::from(counter) >= (1 << (self.counter_bits - 1))
    }

    /// Train the counter selected by `addr` and the current history, then
    /// shift the actual outcome into the history register.
    pub fn update(&mut self, addr: u32, taken: bool) {
        let row = self.row_of(addr);
        let counter = &mut self.table[row][self.ghr];
        let max = ((1u32 << self.counter_bits) - 1) as u8;

        if taken {
            if *counter < max {
                *counter += 1;
            }
        } else if *counter > 0 {
            *counter -= 1;
        }

        self.ghr = ((self.ghr << 1) | usize::from(taken)) & ((1 << self.ghr_bits) - 1);
    }

    pub fn ghr(&self) -> usize {
        self.ghr
    }
}

impl Default for BranchPredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_predictor_says_not_taken() {
        let bp = BranchPredictor::new();
        assert!(!bp.predict(0x1000));
        assert!(!bp.predict(0x0));
    }

    #[test]
    fn counter_saturates_at_zero() {
        let mut bp = BranchPredictor::new();
        // A not-taken run keeps the history at zero, so the same counter
        // is decremented every time and must stop at 0.
        for _ in 0..8 {
            bp.update(0x1000, false);
        }
        assert!(!bp.predict(0x1000));
        assert_eq!(bp.ghr(), 0);
        // One taken update from the floor is not enough to flip it.
        bp.update(0x1000, true);
        bp.update(0x1000, false);
        assert!(!bp.predict(0x1000));
    }

    #[test]
    fn always_taken_branch_is_learned_after_history_fills() {
        let mut bp = BranchPredictor::new();
        // Each taken update trains the column the history selected and
        // shifts a 1 in: GHR walks 0 -> 1 -> 3 -> 7 and stays at 7.
        // Three updates leave the GHR=7 column cold; the fourth trains it.
        for _ in 0..3 {
            bp.update(0x40, true);
        }
        assert!(!bp.predict(0x40));
        bp.update(0x40, true);
        assert!(bp.predict(0x40));
    }

    #[test]
    fn addresses_128_words_apart_share_a_row() {
        let mut bp = BranchPredictor::new();
        for _ in 0..4 {
            bp.update(0x0, true);
        }
        // 0x200 / 4 = 128 aliases onto row 0 and sees the trained counter;
        // a neighboring row stays cold.
        assert!(bp.predict(0x200));
        assert!(!bp.predict(0x4));
    }

    #[test]
    fn ghr_is_masked_to_width() {
        let mut bp = BranchPredictor::new();
        for _ in 0..10 {
            bp.update(0x10, true);
        }
        assert!(bp.ghr() < 1 << GHR_BITS);
        assert_eq!(bp.ghr(), 0b111);
    }
}
