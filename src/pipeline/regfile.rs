// regfile.rs
//
// Architectural register file with rename state. Each register remembers the
// tag of its newest in-flight producer; a register with no outstanding
// producer is ready and holds the last committed value.

use crate::instruction::NUM_REGS;

/// Register as stored in the register file.
#[derive(Debug, Clone)]
pub struct Register {
    pub num: usize,
    pub tag: Option<u64>,
    pub value: i64,
    pub ready: bool,
}

pub struct RegisterFile {
    regs: Vec<Register>,
}

impl RegisterFile {
    pub fn new() -> Self {
        let regs = (0..NUM_REGS)
            .map(|num| Register { num, tag: None, value: -1, ready: true })
            .collect();
        Self { regs }
    }

    /// Rename `reg` to a new producer. The register is unready until the
    /// producer's broadcast arrives (or a squash repairs the rename).
    pub fn rename(&mut self, reg: usize, tag: u64) {
        let r = &mut self.regs[reg];
        r.tag = Some(tag);
        r.ready = false;
    }

    pub fn read(&self, reg: usize) -> &Register {
        &self.regs[reg]
    }

    /// Deliver a broadcast to the file. The write lands only if `tag` is
    /// still the register's current rename; a stale broadcast (overwritten
    /// by a younger producer) is ignored here, though consumers waiting on
    /// the tag in the scheduling queue still pick it up.
    pub fn apply_broadcast(&mut self, reg: usize, tag: u64, value: i64) -> bool {
        let r = &mut self.regs[reg];
        if r.tag == Some(tag) {
            r.value = value;
            r.ready = true;
            r.tag = None;
            true
        } else {
            false
        }
    }

    /// Repoint `reg` at an older still-live producer, or mark it ready if no
    /// producer remains. Used by the squash path to undo speculative renames.
    pub fn restore(&mut self, reg: usize, producer: Option<u64>) {
        let r = &mut self.regs[reg];
        match producer {
            Some(tag) => {
                r.tag = Some(tag);
                r.ready = false;
            },
            None => {
                r.tag = None;
                r.ready = true;
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Register> {
        self.regs.iter()
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_start_ready() {
        let rf = RegisterFile::new();
        assert_eq!(rf.iter().count(), NUM_REGS);
        assert!(rf.iter().all(|r| r.ready && r.tag.is_none()));
    }

    #[test]
    fn rename_then_broadcast_round_trip() {
        let mut rf = RegisterFile::new();
        rf.rename(5, 42);
        assert!(!rf.read(5).ready);
        assert!(rf.apply_broadcast(5, 42, 7));
        assert!(rf.read(5).ready);
        assert_eq!(rf.read(5).value, 7);
    }

    #[test]
    fn stale_broadcast_is_ignored() {
        let mut rf = RegisterFile::new();
        rf.rename(5, 42);
        rf.rename(5, 43); // younger producer overwrites the rename
        assert!(!rf.apply_broadcast(5, 42, 7));
        assert!(!rf.read(5).ready);
        assert_eq!(rf.read(5).tag, Some(43));
    }

    #[test]
    fn restore_repoints_or_clears() {
        let mut rf = RegisterFile::new();
        rf.rename(9, 100);
        rf.restore(9, Some(50));
        assert_eq!(rf.read(9).tag, Some(50));
        assert!(!rf.read(9).ready);
        rf.restore(9, None);
        assert!(rf.read(9).ready);
        assert_eq!(rf.read(9).tag, None);
    }
}
