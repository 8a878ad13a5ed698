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

// instruction.rs
//
// This file contains the decoded trace record type. A trace line decodes into
// an Instruction; the pipeline clones one instance per fetch (re-fetches after
// a squash and shadow dummies get their own instance with a fresh index).

/// Number of architectural registers visible to the trace format.
pub const NUM_REGS: usize = 128;

/// A decoded trace record.
///
/// `ip` is the position of the line in the trace file and never changes.
/// `idx` identifies one fetched instance of the line: an instruction that is
/// squashed and fetched again gets a new `idx`, as does every shadow dummy.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub idx: usize,
    pub ip: usize,
    pub addr: u32,
    /// Functional unit type in 0..3. A `-1` in the trace is normalized to 1
    /// at decode for compatibility with the reference traces.
    pub fu_type: usize,
    pub dest_reg: Option<usize>,
    pub src_regs: [Option<usize>; 2],
    /// Branch target address; `Some` iff the trace line is a branch.
    pub branch_addr: Option<u32>,
    /// Actual branch outcome from the trace.
    pub taken: bool,
    /// Prediction made at dispatch. Meaningless until dispatched.
    pub predicted: bool,
    /// Fetched under an unresolved misprediction (or beyond a mispredicted
    /// branch in its fetch group).
    pub speculative: bool,
}

impl Instruction {
    /// A shadow dummy occupying fetch, dispatch and scheduling bandwidth
    /// while a mispredicted branch resolves. The unit type is biased toward
    /// the predicted direction so the shadow stream exerts the same
    /// structural pressure the wrong-path instructions would have.
    pub fn dummy(idx: usize, ip: usize, predicted_taken: bool) -> Self {
        Self {
            idx,
            ip,
            addr: 0,
            fu_type: if predicted_taken { 1 } else { 2 },
            dest_reg: None,
            src_regs: [None, None],
            branch_addr: None,
            taken: false,
            predicted: false,
            speculative: true,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.branch_addr.is_some()
    }

    pub fn mispredicted(&self) -> bool {
        self.is_branch() && self.predicted != self.taken
    }
}
