// rob.rs - Reorder buffer: the in-order record of speculative state.
//
// Every dispatched instruction (shadow dummies included) appends an entry at
// the tail; retirement peels complete entries off the head, so architectural
// effects always land in program order. A complete head whose prediction was
// wrong is the squash point.

use std::collections::VecDeque;

/// Reorder buffer entry.
#[derive(Debug, Clone)]
pub struct RobEntry {
    pub inst_idx: usize,
    pub ip: usize,
    pub tag: u64,
    pub rs_idx: usize,
    pub dest_reg: Option<usize>,
    pub is_branch: bool,
    pub predicted: bool,
    pub taken: bool,
    pub complete: bool,
    pub branch_addr: Option<u32>,
    pub speculative: bool,
}

impl RobEntry {
    pub fn mispredicted(&self) -> bool {
        self.is_branch && self.predicted != self.taken
    }
}

/// FIFO of in-flight instructions ordered by dispatch (and therefore by tag).
pub struct ReorderBuffer {
    entries: VecDeque<RobEntry>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self { entries: VecDeque::new() }
    }

    pub fn push(&mut self, entry: RobEntry) {
        debug_assert!(
            self.entries.back().map_or(true, |back| back.tag < entry.tag),
            "ROB must stay tag-ordered"
        );
        self.entries.push_back(entry);
    }

    pub fn head(&self) -> Option<&RobEntry> {
        self.entries.front()
    }

    pub fn pop_head(&mut self) -> Option<RobEntry> {
        self.entries.pop_front()
    }

    /// Mark the entry carrying `tag` complete.
    pub fn complete(&mut self, tag: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.tag == tag) {
            entry.complete = true;
        }
    }

    /// Pop entries from the tail down to, not including, the entry with
    /// `tag`. Returns the popped entries, youngest first.
    pub fn squash_after(&mut self, tag: u64) -> Vec<RobEntry> {
        let mut squashed = Vec::new();
        while let Some(back) = self.entries.back() {
            if back.tag == tag {
                break;
            }
            squashed.push(self.entries.pop_back().unwrap());
        }
        squashed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RobEntry> {
        self.entries.iter()
    }
}

impl Default for ReorderBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: u64) -> RobEntry {
        RobEntry {
            inst_idx: tag as usize,
            ip: tag as usize,
            tag,
            rs_idx: tag as usize,
            dest_reg: None,
            is_branch: false,
            predicted: false,
            taken: false,
            complete: false,
            branch_addr: None,
            speculative: false,
        }
    }

    #[test]
    fn head_retires_in_order() {
        let mut rob = ReorderBuffer::new();
        rob.push(entry(0));
        rob.push(entry(1));

        // Completing the younger entry first must not move the head.
        rob.complete(1);
        assert!(!rob.head().unwrap().complete);

        rob.complete(0);
        assert!(rob.head().unwrap().complete);
        assert_eq!(rob.pop_head().unwrap().tag, 0);
        assert_eq!(rob.pop_head().unwrap().tag, 1);
        assert!(rob.is_empty());
    }

    #[test]
    fn squash_pops_down_to_the_branch() {
        let mut rob = ReorderBuffer::new();
        for tag in 0..5 {
            rob.push(entry(tag));
        }

        let squashed = rob.squash_after(2);
        assert_eq!(squashed.len(), 2);
        assert_eq!(squashed[0].tag, 4);
        assert_eq!(squashed[1].tag, 3);
        assert_eq!(rob.len(), 3);
        assert_eq!(rob.iter().last().unwrap().tag, 2);
    }

    #[test]
    fn mispredict_flag_compares_prediction_to_outcome() {
        let mut e = entry(0);
        e.is_branch = true;
        e.predicted = false;
        e.taken = true;
        assert!(e.mispredicted());
        e.predicted = true;
        assert!(!e.mispredicted());
        e.is_branch = false;
        assert!(!e.mispredicted());
    }
}
