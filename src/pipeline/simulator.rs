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

// simulator.rs
//
// This file contains the pipeline controller. One call to `tick` advances
// the whole machine by a single cycle, evaluating the stages in reverse
// pipeline order (Retire, CDB-snoop, State-Update, Execute, Wake-up/Issue,
// Dispatch, Fetch) so that a resource freed downstream is visible to work
// moving up within the same cycle, while work admitted to a queue this
// cycle can only advance on the next one.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::errors::SimulatorError;
use crate::instruction::Instruction;
use crate::pipeline::components::{FuPool, ResultBusSet, SchedulingQueue};
use crate::pipeline::config::PipelineOptions;
use crate::pipeline::predictor::BranchPredictor;
use crate::pipeline::queues::{PipelineEntry, StageQueue};
use crate::pipeline::regfile::RegisterFile;
use crate::pipeline::rob::{ReorderBuffer, RobEntry};
use crate::pipeline::stats::{ProcStats, StatsAccumulator};
use crate::pipeline::status::{Stage, StatusLedger};

/// Controller state entered when a branch mispredicts at dispatch. The
/// variant records the predicted direction, which biases the unit type of
/// the shadow stream fetched until the branch resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speculation {
    None,
    Taken,
    NotTaken,
}

impl Speculation {
    pub fn is_active(&self) -> bool {
        *self != Speculation::None
    }
}

/// The out-of-order pipeline.
pub struct Pipeline {
    options: PipelineOptions,
    trace: Vec<Instruction>,

    // Fetched instances, indexed by `idx`. Grows past the trace length when
    // shadow dummies are fetched or squashed instructions come back around.
    insts: Vec<Instruction>,
    ledger: StatusLedger,

    predictor: BranchPredictor,
    regs: RegisterFile,
    sched: SchedulingQueue,
    fus: FuPool,
    buses: ResultBusSet,
    rob: ReorderBuffer,

    dispatch_q: VecDeque<usize>,
    sched_q: StageQueue,
    exec_q: StageQueue,
    update_q: StageQueue,

    clock: u64,
    fetch_ptr: usize,
    next_tag: u64,
    speculating: Speculation,

    stats: StatsAccumulator,
    last_retired_ip: Option<usize>,
}

impl Pipeline {
    pub fn new(trace: Vec<Instruction>, options: PipelineOptions) -> Result<Self, SimulatorError> {
        options.validate()?;
        if trace.is_empty() {
            return Err(SimulatorError::EmptyTrace);
        }

        Ok(Self {
            insts: Vec::with_capacity(trace.len()),
            ledger: StatusLedger::new(),
            predictor: BranchPredictor::new(),
            regs: RegisterFile::new(),
            sched: SchedulingQueue::new(&options),
            fus: FuPool::new(&options),
            buses: ResultBusSet::new(&options),
            rob: ReorderBuffer::new(),
            dispatch_q: VecDeque::new(),
            sched_q: StageQueue::new(),
            exec_q: StageQueue::new(),
            update_q: StageQueue::new(),
            clock: 0,
            fetch_ptr: 0,
            next_tag: 0,
            speculating: Speculation::None,
            stats: StatsAccumulator::new(),
            last_retired_ip: None,
            trace,
            options,
        })
    }

    /// Run the whole trace to retirement and return the final statistics.
    pub fn run(&mut self) -> ProcStats {
        // A stuck pipeline is a bug, never a data condition; abort loudly
        // rather than spin.
        let cycle_limit = 64 * self.trace.len() as u64 + 10_000;

        while !self.is_done() {
            self.tick();
            assert!(
                self.clock < cycle_limit,
                "pipeline made no progress after {} cycles; this is a simulator bug",
                self.clock
            );
        }

        debug!(
            "trace drained: {} instructions in {} cycles",
            self.stats.retired,
            self.cycle_count()
        );
        self.stats.finalize(self.cycle_count())
    }

    /// True once every trace instruction has retired.
    pub fn is_done(&self) -> bool {
        self.stats.retired as usize == self.trace.len()
    }

    /// Advance one cycle.
    pub fn tick(&mut self) {
        self.retire();
        self.sched.cdb_snoop(&self.buses);
        self.state_update();
        self.execute();
        self.wake_up_issue();
        self.dispatch();
        self.fetch();

        self.stats.sample_disp_queue(self.dispatch_q.len());
        self.clock += 1;
    }

    // ---- stage 1: retire -------------------------------------------------

    fn retire(&mut self) {
        while let Some(head) = self.rob.head() {
            if !head.complete {
                break;
            }
            if head.mispredicted() {
                self.squash();
                break;
            }
            let entry = self.rob.pop_head().expect("non-empty ROB has a head");
            self.retire_entry(&entry);
        }
    }

    fn retire_entry(&mut self, entry: &RobEntry) {
        trace!("cycle {}: retire ip={} tag={}", self.clock, entry.ip, entry.tag);
        self.sched.free(entry.rs_idx);
        self.ledger.mark_retired(entry.inst_idx);
        self.stats.retired += 1;
        if entry.is_branch {
            self.stats.record_retired_branch(entry.predicted == entry.taken);
        }
        debug_assert!(
            self.last_retired_ip.map_or(true, |last| entry.ip > last),
            "retirement left program order"
        );
        self.last_retired_ip = Some(entry.ip);
    }

    // ---- stage 3: state update -------------------------------------------

    fn state_update(&mut self) {
        for entry in self.update_q.drain_ready(self.clock) {
            let rb_idx = self
                .buses
                .find_tag(entry.tag)
                .expect("an update ticket always has a broadcast in flight");
            let (dest_reg, value) = {
                let rb = self.buses.get(rb_idx);
                (rb.dest_reg, rb.value)
            };
            if let Some(reg) = dest_reg {
                // A stale broadcast (rename overwritten by a younger
                // producer) is dropped by the file; RS consumers already
                // matched it during the snoop.
                let _ = self.regs.apply_broadcast(reg, entry.tag, value);
            }
            self.buses.release(rb_idx);
            self.rob.complete(entry.tag);
        }
    }

    // ---- stage 4: execute ------------------------------------------------

    fn execute(&mut self) {
        for entry in self.exec_q.drain_ready(self.clock) {
            // Buses go to the oldest tag first; once allocation fails the
            // younger entries cannot acquire one either.
            let Some(rb_idx) = self.buses.acquire() else {
                self.exec_q.push(entry);
                continue;
            };

            let fu_id = self
                .fus
                .find_by_tag(entry.tag)
                .expect("an executing instruction owns a functional unit");
            let dest_reg = self.sched.get(entry.rs_idx).dest_reg;

            self.buses
                .broadcast(rb_idx, entry.tag, -1, dest_reg, entry.inst_idx, fu_id, entry.speculative);
            self.fus.release(fu_id);

            // End of execute resolves the branch; real branches train the
            // predictor here, shadow work never touches it.
            let inst = &self.insts[entry.inst_idx];
            if inst.is_branch() && !entry.speculative {
                self.predictor.update(inst.addr, inst.taken);
            }

            self.ledger.record(entry.inst_idx, Stage::StateUpdate, self.clock + 1);
            self.update_q.push(PipelineEntry { ready_cycle: self.clock + 1, ..entry });
        }
    }

    // ---- stage 5: wake-up / issue ----------------------------------------

    fn wake_up_issue(&mut self) {
        for entry in self.sched_q.drain_ready(self.clock) {
            let rs = self.sched.get(entry.rs_idx);
            if !rs.operands_ready() {
                self.sched_q.push(entry);
                continue;
            }
            let Some(fu_id) = self.fus.find_free(rs.fu_type) else {
                self.sched_q.push(entry);
                continue;
            };

            self.fus
                .occupy(fu_id, entry.tag, rs.dest_reg, entry.inst_idx, entry.speculative);
            self.stats.issued += 1;
            self.ledger.record(entry.inst_idx, Stage::Execute, self.clock + 1);
            self.exec_q.push(PipelineEntry { ready_cycle: self.clock + 1, ..entry });
        }
    }

    // ---- stage 6: dispatch -----------------------------------------------

    fn dispatch(&mut self) {
        for _ in 0..self.options.f {
            let Some(&inst_idx) = self.dispatch_q.front() else {
                break;
            };

            let inst = self.insts[inst_idx].clone();
            let tag = self.next_tag;
            let Some(rs_idx) = self.sched.insert(&inst, tag, &self.regs) else {
                // Scheduling queue full: dispatch stalls.
                break;
            };
            self.next_tag += 1;
            let _ = self.dispatch_q.pop_front();

            if let Some(dest) = inst.dest_reg {
                self.regs.rename(dest, tag);
            }

            let mut predicted = false;
            if inst.is_branch() && !inst.speculative {
                predicted = self.predictor.predict(inst.addr);
                self.insts[inst_idx].predicted = predicted;
            }

            self.rob.push(RobEntry {
                inst_idx,
                ip: inst.ip,
                tag,
                rs_idx,
                dest_reg: inst.dest_reg,
                is_branch: inst.is_branch(),
                predicted,
                taken: inst.taken,
                complete: false,
                branch_addr: inst.branch_addr,
                speculative: inst.speculative,
            });

            self.ledger.record(inst_idx, Stage::Schedule, self.clock + 1);
            self.sched_q.push(PipelineEntry {
                inst_idx,
                rs_idx,
                tag,
                ready_cycle: self.clock + 1,
                speculative: inst.speculative,
            });

            if inst.is_branch() && !inst.speculative && predicted != inst.taken {
                self.enter_speculation(predicted, inst.ip);
                break;
            }
        }
    }

    fn enter_speculation(&mut self, predicted: bool, branch_ip: usize) {
        debug!(
            "cycle {}: branch at ip={} mispredicted ({} predicted), entering shadow fetch",
            self.clock,
            branch_ip,
            if predicted { "taken" } else { "not taken" }
        );
        self.speculating = if predicted { Speculation::Taken } else { Speculation::NotTaken };

        // Everything still queued sits beyond the branch in its fetch
        // group: wrong-path work from here on.
        for &idx in self.dispatch_q.iter() {
            self.insts[idx].speculative = true;
            self.ledger.mark_speculative(idx);
        }
    }

    // ---- stage 7: fetch --------------------------------------------------

    fn fetch(&mut self) {
        for _ in 0..self.options.f {
            let inst = match self.speculating {
                Speculation::None => {
                    if self.fetch_ptr >= self.trace.len() {
                        break;
                    }
                    let mut inst = self.trace[self.fetch_ptr].clone();
                    inst.idx = self.insts.len();
                    inst.speculative = false;
                    self.fetch_ptr += 1;
                    inst
                },
                mode => Instruction::dummy(
                    self.insts.len(),
                    self.fetch_ptr,
                    mode == Speculation::Taken,
                ),
            };

            self.ledger.open(inst.idx, inst.ip, inst.speculative);
            self.ledger.record(inst.idx, Stage::Fetch, self.clock);
            self.ledger.record(inst.idx, Stage::Dispatch, self.clock + 1);
            self.dispatch_q.push_back(inst.idx);
            self.insts.push(inst);
        }
    }

    // ---- squash ----------------------------------------------------------

    /// Unwind a resolved misprediction. The ROB head is the offending
    /// branch; everything younger is wrong-path and disappears, the branch
    /// itself retires, and fetch restarts at the next trace line.
    fn squash(&mut self) {
        let branch = self.rob.head().expect("squash runs on the ROB head").clone();
        debug!(
            "cycle {}: squash at ip={} tag={}, resuming fetch at ip={}",
            self.clock,
            branch.ip,
            branch.tag,
            branch.ip + 1
        );

        self.speculating = Speculation::None;
        self.fetch_ptr = branch.ip + 1;

        // Wrong-path work never reaches the report.
        for idx in self.dispatch_q.drain(..) {
            self.ledger.mark_squashed(idx);
        }
        for entry in self.sched_q.remove_speculative() {
            self.ledger.mark_squashed(entry.inst_idx);
        }
        for entry in self.exec_q.remove_speculative() {
            self.ledger.mark_squashed(entry.inst_idx);
        }
        for entry in self.update_q.remove_speculative() {
            self.ledger.mark_squashed(entry.inst_idx);
        }

        self.fus.release_speculative();
        self.buses.release_speculative();

        let evicted = self.sched.free_speculative();
        for rs in &evicted {
            self.ledger.mark_squashed(rs.inst_idx);
        }

        for entry in self.rob.squash_after(branch.tag) {
            self.ledger.mark_squashed(entry.inst_idx);
        }

        let branch = self.rob.pop_head().expect("the branch is still the ROB head");
        self.retire_entry(&branch);

        // Undo speculative renames: repoint each clobbered register at its
        // youngest surviving producer, or mark it ready when none remains.
        // Stations live until retirement, so the surviving producers are
        // exactly the still-occupied stations. This must run after the
        // branch has retired and released its own station.
        for rs in &evicted {
            if let Some(reg) = rs.dest_reg {
                if self.regs.read(reg).tag == Some(rs.dest_tag) {
                    let producer = self.sched.youngest_producer(reg);
                    self.regs.restore(reg, producer);
                }
            }
        }
    }

    // ---- accessors -------------------------------------------------------

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn ledger(&self) -> &StatusLedger {
        &self.ledger
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Reported run time: the raw clock minus the trailing retire tick and
    /// the final increment.
    pub fn cycle_count(&self) -> u64 {
        self.clock.saturating_sub(2)
    }

    pub fn speculating(&self) -> Speculation {
        self.speculating
    }

    // ---- invariant checking ----------------------------------------------

    /// Verify the structural invariants that must hold at every cycle
    /// boundary. Test-oracle hook; a violation is always a simulator bug.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.check_tag_uniqueness()?;
        self.check_capacities()?;
        self.check_stage_monotonicity()?;
        self.check_retirement_order()?;
        self.check_rob_order()?;
        self.check_register_producers()?;
        Ok(())
    }

    fn check_tag_uniqueness(&self) -> Result<(), String> {
        fn all_unique(tags: &mut Vec<u64>, what: &str) -> Result<(), String> {
            tags.sort_unstable();
            let before = tags.len();
            tags.dedup();
            if tags.len() != before {
                return Err(format!("duplicate tag among {}", what));
            }
            Ok(())
        }

        let mut rs_tags: Vec<u64> = self.sched.occupied().map(|(_, rs)| rs.dest_tag).collect();
        all_unique(&mut rs_tags, "reservation stations")?;
        let mut fu_tags: Vec<u64> =
            self.fus.iter().filter(|fu| fu.busy).map(|fu| fu.tag).collect();
        all_unique(&mut fu_tags, "functional units")?;
        let mut rb_tags: Vec<u64> =
            self.buses.iter().filter(|rb| rb.busy).map(|rb| rb.tag).collect();
        all_unique(&mut rb_tags, "result buses")?;
        let mut rob_tags: Vec<u64> = self.rob.iter().map(|e| e.tag).collect();
        all_unique(&mut rob_tags, "ROB entries")?;
        Ok(())
    }

    fn check_capacities(&self) -> Result<(), String> {
        if self.buses.busy_count() > self.options.r {
            return Err("more busy result buses than R".to_string());
        }
        for fu_type in 0..3 {
            if self.fus.busy_count(fu_type) > self.options.fu_count(fu_type) {
                return Err(format!("too many busy type-{} functional units", fu_type));
            }
        }
        if self.sched.occupied_count() > self.sched.capacity() {
            return Err("scheduling queue over capacity".to_string());
        }
        Ok(())
    }

    fn check_stage_monotonicity(&self) -> Result<(), String> {
        for row in self.ledger.iter() {
            let stamps = [
                row.cycle_entered(Stage::Fetch),
                row.cycle_entered(Stage::Dispatch),
                row.cycle_entered(Stage::Schedule),
                row.cycle_entered(Stage::Execute),
                row.cycle_entered(Stage::StateUpdate),
            ];
            let mut last = None;
            for stamp in stamps.into_iter().flatten() {
                if last.map_or(false, |l| stamp < l) {
                    return Err(format!("stage cycles not monotone for inst {}", row.inst_idx));
                }
                last = Some(stamp);
            }
        }
        Ok(())
    }

    fn check_retirement_order(&self) -> Result<(), String> {
        let mut last_ip = None;
        for row in self.ledger.report_rows() {
            if last_ip.map_or(false, |l| row.ip <= l) {
                return Err(format!("inst ip={} retired out of program order", row.ip));
            }
            last_ip = Some(row.ip);
        }
        Ok(())
    }

    fn check_rob_order(&self) -> Result<(), String> {
        let mut last = None;
        for entry in self.rob.iter() {
            if last.map_or(false, |l| entry.tag <= l) {
                return Err("ROB is not tag-ordered".to_string());
            }
            last = Some(entry.tag);
        }
        Ok(())
    }

    fn check_register_producers(&self) -> Result<(), String> {
        for reg in self.regs.iter() {
            match (reg.ready, reg.tag) {
                (true, Some(_)) | (false, None) => {
                    return Err(format!("register {} ready bit disagrees with its tag", reg.num));
                },
                (false, Some(tag)) => {
                    let producers = self
                        .sched
                        .occupied()
                        .filter(|(_, rs)| rs.dest_tag == tag && rs.dest_reg == Some(reg.num))
                        .count();
                    if producers != 1 {
                        return Err(format!(
                            "register {} waits on tag {} with {} live producers",
                            reg.num, tag, producers
                        ));
                    }
                },
                (true, None) => {},
            }
        }
        Ok(())
    }
}
