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

// components.rs
//
// This file contains the execution resources of the pipeline: the scheduling
// queue of reservation stations, the functional unit pool, and the result
// bus set. All cross-references between them are integer handles (rs_idx,
// fu_id, rb_idx, tag); no component holds a reference to another.

use crate::instruction::Instruction;
use crate::pipeline::config::PipelineOptions;
use crate::pipeline::regfile::RegisterFile;

/// One source operand slot of a reservation station.
#[derive(Debug, Clone, Copy)]
pub struct Operand {
    pub ready: bool,
    pub tag: Option<u64>,
    pub value: i64,
}

impl Operand {
    /// An absent source (-1 in the trace) is always ready.
    fn absent() -> Self {
        Self { ready: true, tag: None, value: -1 }
    }
}

/// Reservation station: one entry in the scheduling queue. Occupied from
/// dispatch until the owning instruction retires (or is squashed).
#[derive(Debug, Clone)]
pub struct ReservationStation {
    pub empty: bool,
    pub fu_type: usize,
    pub dest_reg: Option<usize>,
    pub dest_tag: u64,
    pub operands: [Operand; 2],
    pub inst_idx: usize,
    pub speculative: bool,
}

impl ReservationStation {
    fn vacant() -> Self {
        Self {
            empty: true,
            fu_type: 0,
            dest_reg: None,
            dest_tag: 0,
            operands: [Operand::absent(); 2],
            inst_idx: 0,
            speculative: false,
        }
    }

    pub fn operands_ready(&self) -> bool {
        self.operands[0].ready && self.operands[1].ready
    }
}

/// Fixed array of `2 * (J + K + L)` reservation stations.
pub struct SchedulingQueue {
    stations: Vec<ReservationStation>,
}

impl SchedulingQueue {
    pub fn new(options: &PipelineOptions) -> Self {
        Self {
            stations: vec![ReservationStation::vacant(); options.sched_queue_size()],
        }
    }

    /// Insert a dispatched instruction into the lowest-indexed free slot,
    /// reading operand readiness from the register file at this moment.
    /// Returns the slot index, or `None` when the queue is full (dispatch
    /// stalls).
    pub fn insert(
        &mut self,
        inst: &Instruction,
        dest_tag: u64,
        regs: &RegisterFile,
    ) -> Option<usize> {
        let rs_idx = self.stations.iter().position(|rs| rs.empty)?;

        let rs = &mut self.stations[rs_idx];
        rs.empty = false;
        rs.fu_type = inst.fu_type;
        rs.dest_reg = inst.dest_reg;
        rs.dest_tag = dest_tag;
        rs.inst_idx = inst.idx;
        rs.speculative = inst.speculative;

        for (slot, src) in rs.operands.iter_mut().zip(inst.src_regs.iter()) {
            *slot = match src {
                None => Operand::absent(),
                Some(reg) => {
                    let r = regs.read(*reg);
                    if r.ready {
                        Operand { ready: true, tag: None, value: r.value }
                    } else {
                        Operand { ready: false, tag: r.tag, value: -1 }
                    }
                },
            };
        }

        Some(rs_idx)
    }

    /// Walk every occupied station and mark ready any operand whose awaited
    /// tag is currently broadcast on a busy result bus.
    pub fn cdb_snoop(&mut self, buses: &ResultBusSet) {
        for rs in self.stations.iter_mut().filter(|rs| !rs.empty) {
            for op in rs.operands.iter_mut() {
                if op.ready {
                    continue;
                }
                if let Some(tag) = op.tag {
                    if let Some(rb_idx) = buses.find_tag(tag) {
                        op.ready = true;
                        op.value = buses.get(rb_idx).value;
                    }
                }
            }
        }
    }

    pub fn free(&mut self, rs_idx: usize) {
        self.stations[rs_idx] = ReservationStation::vacant();
    }

    pub fn get(&self, rs_idx: usize) -> &ReservationStation {
        &self.stations[rs_idx]
    }

    pub fn occupied(&self) -> impl Iterator<Item = (usize, &ReservationStation)> {
        self.stations.iter().enumerate().filter(|(_, rs)| !rs.empty)
    }

    pub fn occupied_count(&self) -> usize {
        self.stations.iter().filter(|rs| !rs.empty).count()
    }

    pub fn capacity(&self) -> usize {
        self.stations.len()
    }

    /// Empty every speculative station, returning the evicted contents so
    /// the squash path can undo their renames and close their ledger rows.
    pub fn free_speculative(&mut self) -> Vec<ReservationStation> {
        let mut freed = Vec::new();
        for idx in 0..self.stations.len() {
            if !self.stations[idx].empty && self.stations[idx].speculative {
                freed.push(std::mem::replace(
                    &mut self.stations[idx],
                    ReservationStation::vacant(),
                ));
            }
        }
        freed
    }

    /// Youngest live producer of `reg` among non-speculative stations, used
    /// to repair the register file after a squash. Stations live until
    /// retirement, so every in-flight producer still has one.
    pub fn youngest_producer(&self, reg: usize) -> Option<u64> {
        self.stations
            .iter()
            .filter(|rs| !rs.empty && !rs.speculative && rs.dest_reg == Some(reg))
            .map(|rs| rs.dest_tag)
            .max()
    }
}

/// A single-cycle execution slot.
#[derive(Debug, Clone)]
pub struct FunctionalUnit {
    pub id: usize,
    pub fu_type: usize,
    pub busy: bool,
    pub tag: u64,
    pub dest_reg: Option<usize>,
    pub inst_idx: usize,
    pub speculative: bool,
}

/// Pool of J type-0, K type-1 and L type-2 units.
pub struct FuPool {
    units: Vec<FunctionalUnit>,
}

impl FuPool {
    pub fn new(options: &PipelineOptions) -> Self {
        let mut units = Vec::new();
        let mut id = 0;
        for fu_type in 0..3 {
            for _ in 0..options.fu_count(fu_type) {
                units.push(FunctionalUnit {
                    id,
                    fu_type,
                    busy: false,
                    tag: 0,
                    dest_reg: None,
                    inst_idx: 0,
                    speculative: false,
                });
                id += 1;
            }
        }
        Self { units }
    }

    /// Any free unit of the requested type.
    pub fn find_free(&self, fu_type: usize) -> Option<usize> {
        self.units
            .iter()
            .find(|fu| fu.fu_type == fu_type && !fu.busy)
            .map(|fu| fu.id)
    }

    /// The busy unit currently executing `tag`, if any.
    pub fn find_by_tag(&self, tag: u64) -> Option<usize> {
        self.units
            .iter()
            .find(|fu| fu.busy && fu.tag == tag)
            .map(|fu| fu.id)
    }

    pub fn occupy(&mut self, fu_id: usize, tag: u64, dest_reg: Option<usize>, inst_idx: usize, speculative: bool) {
        let fu = &mut self.units[fu_id];
        fu.busy = true;
        fu.tag = tag;
        fu.dest_reg = dest_reg;
        fu.inst_idx = inst_idx;
        fu.speculative = speculative;
    }

    pub fn release(&mut self, fu_id: usize) {
        self.units[fu_id].busy = false;
    }

    pub fn release_speculative(&mut self) {
        for fu in self.units.iter_mut().filter(|fu| fu.busy && fu.speculative) {
            fu.busy = false;
        }
    }

    pub fn get(&self, fu_id: usize) -> &FunctionalUnit {
        &self.units[fu_id]
    }

    pub fn busy_count(&self, fu_type: usize) -> usize {
        self.units.iter().filter(|fu| fu.busy && fu.fu_type == fu_type).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionalUnit> {
        self.units.iter()
    }
}

/// One common data bus: broadcasts a (tag, value, dest-reg) triple for
/// exactly one cycle.
#[derive(Debug, Clone)]
pub struct ResultBus {
    pub busy: bool,
    pub tag: u64,
    pub value: i64,
    pub dest_reg: Option<usize>,
    pub inst_idx: usize,
    pub fu_id: usize,
    pub speculative: bool,
}

/// Fixed pool of R result buses.
pub struct ResultBusSet {
    buses: Vec<ResultBus>,
}

impl ResultBusSet {
    pub fn new(options: &PipelineOptions) -> Self {
        let buses = vec![
            ResultBus {
                busy: false,
                tag: 0,
                value: -1,
                dest_reg: None,
                inst_idx: 0,
                fu_id: 0,
                speculative: false,
            };
            options.r
        ];
        Self { buses }
    }

    /// Index of a free bus, if any. Callers allocate in tag order, which
    /// gives the oldest-first policy.
    pub fn acquire(&self) -> Option<usize> {
        self.buses.iter().position(|rb| !rb.busy)
    }

    pub fn broadcast(
        &mut self,
        rb_idx: usize,
        tag: u64,
        value: i64,
        dest_reg: Option<usize>,
        inst_idx: usize,
        fu_id: usize,
        speculative: bool,
    ) {
        self.buses[rb_idx] = ResultBus { busy: true, tag, value, dest_reg, inst_idx, fu_id, speculative };
    }

    /// Bus currently broadcasting `tag`, or `None`.
    pub fn find_tag(&self, tag: u64) -> Option<usize> {
        self.buses.iter().position(|rb| rb.busy && rb.tag == tag)
    }

    pub fn release(&mut self, rb_idx: usize) {
        self.buses[rb_idx].busy = false;
    }

    /// Drop in-flight speculative broadcasts so a squashed producer cannot
    /// pin a bus.
    pub fn release_speculative(&mut self) {
        for rb in self.buses.iter_mut().filter(|rb| rb.busy && rb.speculative) {
            rb.busy = false;
        }
    }

    pub fn get(&self, rb_idx: usize) -> &ResultBus {
        &self.buses[rb_idx]
    }

    pub fn busy_count(&self) -> usize {
        self.buses.iter().filter(|rb| rb.busy).count()
    }

    pub fn capacity(&self) -> usize {
        self.buses.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultBus> {
        self.buses.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Instruction;

    fn options() -> PipelineOptions {
        PipelineOptions::new(4, 1, 1, 1, 2)
    }

    fn inst(idx: usize, dest: Option<usize>, srcs: [Option<usize>; 2]) -> Instruction {
        Instruction {
            idx,
            ip: idx,
            addr: 0x1000 + (idx as u32) * 4,
            fu_type: 1,
            dest_reg: dest,
            src_regs: srcs,
            branch_addr: None,
            taken: false,
            predicted: false,
            speculative: false,
        }
    }

    #[test]
    fn insert_reads_register_state_at_dispatch() {
        let opt = options();
        let mut sched = SchedulingQueue::new(&opt);
        let mut regs = RegisterFile::new();
        regs.rename(3, 7);

        let i = inst(0, Some(4), [Some(3), None]);
        let rs_idx = sched.insert(&i, 8, &regs).unwrap();
        let rs = sched.get(rs_idx);
        assert!(!rs.operands[0].ready);
        assert_eq!(rs.operands[0].tag, Some(7));
        assert!(rs.operands[1].ready);
        assert!(!rs.operands_ready());
    }

    #[test]
    fn insert_fills_lowest_free_slot_and_overflows() {
        let opt = PipelineOptions::new(4, 0, 1, 0, 1); // two stations
        let mut sched = SchedulingQueue::new(&opt);
        let regs = RegisterFile::new();

        assert_eq!(sched.insert(&inst(0, None, [None, None]), 0, &regs), Some(0));
        assert_eq!(sched.insert(&inst(1, None, [None, None]), 1, &regs), Some(1));
        assert_eq!(sched.insert(&inst(2, None, [None, None]), 2, &regs), None);

        sched.free(0);
        assert_eq!(sched.insert(&inst(3, None, [None, None]), 3, &regs), Some(0));
    }

    #[test]
    fn snoop_wakes_matching_operands() {
        let opt = options();
        let mut sched = SchedulingQueue::new(&opt);
        let mut regs = RegisterFile::new();
        regs.rename(3, 7);

        let rs_idx = sched.insert(&inst(0, None, [Some(3), Some(3)]), 8, &regs).unwrap();

        let mut buses = ResultBusSet::new(&opt);
        buses.broadcast(0, 7, 99, Some(3), 5, 0, false);
        sched.cdb_snoop(&buses);

        let rs = sched.get(rs_idx);
        assert!(rs.operands_ready());
        assert_eq!(rs.operands[0].value, 99);
        assert_eq!(rs.operands[1].value, 99);
    }

    #[test]
    fn fu_pool_is_typed() {
        let opt = PipelineOptions::new(4, 1, 2, 0, 1);
        let mut fus = FuPool::new(&opt);
        assert_eq!(fus.find_free(0), Some(0));
        assert!(fus.find_free(2).is_none());

        let k0 = fus.find_free(1).unwrap();
        fus.occupy(k0, 1, None, 0, false);
        let k1 = fus.find_free(1).unwrap();
        assert_ne!(k0, k1);
        fus.occupy(k1, 2, None, 1, false);
        assert!(fus.find_free(1).is_none());
        assert_eq!(fus.busy_count(1), 2);

        fus.release(k0);
        assert_eq!(fus.find_free(1), Some(k0));
    }

    #[test]
    fn bus_tag_lookup_and_release() {
        let opt = options();
        let mut buses = ResultBusSet::new(&opt);
        let rb = buses.acquire().unwrap();
        buses.broadcast(rb, 5, -1, None, 0, 0, false);
        assert_eq!(buses.find_tag(5), Some(rb));
        assert_eq!(buses.find_tag(6), None);
        buses.release(rb);
        assert_eq!(buses.find_tag(5), None);
    }

    #[test]
    fn speculative_cleanup_spares_real_work() {
        let opt = options();
        let mut sched = SchedulingQueue::new(&opt);
        let regs = RegisterFile::new();

        let real = inst(0, Some(1), [None, None]);
        let mut shadow = inst(1, Some(2), [None, None]);
        shadow.speculative = true;

        let real_rs = sched.insert(&real, 0, &regs).unwrap();
        sched.insert(&shadow, 1, &regs).unwrap();

        let freed = sched.free_speculative();
        assert_eq!(freed.len(), 1);
        assert_eq!(freed[0].inst_idx, 1);
        assert!(!sched.get(real_rs).empty);
        assert_eq!(sched.occupied_count(), 1);
        assert_eq!(sched.youngest_producer(1), Some(0));
        assert_eq!(sched.youngest_producer(2), None);
    }
}
