//! Mnemonic frequency and attribute aggregation.
//!
//! One pass over a decoded program collects everything the feature builder
//! needs: mnemonic counts, stack effect sums, the fee distribution and
//! per-group counts. Histograms from many programs can be merged for corpus
//! statistics.

use std::collections::{BTreeMap, BTreeSet};

use crate::disasm::DecodedProgram;
use crate::entropy::shannon_entropy;
use crate::types::OpcodeGroup;

/// Aggregated view of one (or, after merging, many) decoded programs.
///
/// Ordered maps keep iteration, and therefore floating-point summation,
/// deterministic across runs and threads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpcodeHistogram {
    counts: BTreeMap<&'static str, u64>,
    fees: BTreeMap<u32, u64>,
    groups: BTreeMap<OpcodeGroup, u64>,
    group_mnemonics: BTreeMap<OpcodeGroup, BTreeSet<&'static str>>,
    /// Total number of instructions.
    pub total: u64,
    /// Sum of stack pushes.
    pub pushes: u64,
    /// Sum of stack pops.
    pub pops: u64,
    /// Sum of base gas fees.
    pub total_fee: u64,
}

impl OpcodeHistogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_program(program: &DecodedProgram) -> Self {
        let mut hist = Self::new();
        for insn in program.iter() {
            *hist.counts.entry(insn.mnemonic).or_insert(0) += 1;
            *hist.fees.entry(insn.fee).or_insert(0) += 1;
            *hist.groups.entry(insn.group).or_insert(0) += 1;
            hist.group_mnemonics.entry(insn.group).or_default().insert(insn.mnemonic);
            hist.pushes += u64::from(insn.pushes);
            hist.pops += u64::from(insn.pops);
            hist.total_fee += u64::from(insn.fee);
        }
        hist.total = program.len() as u64;
        hist
    }

    /// Merge another histogram into this one.
    pub fn merge(&mut self, other: &OpcodeHistogram) {
        for (&mnemonic, &count) in &other.counts {
            *self.counts.entry(mnemonic).or_insert(0) += count;
        }
        for (&fee, &count) in &other.fees {
            *self.fees.entry(fee).or_insert(0) += count;
        }
        for (&group, &count) in &other.groups {
            *self.groups.entry(group).or_insert(0) += count;
        }
        for (&group, mnemonics) in &other.group_mnemonics {
            self.group_mnemonics
                .entry(group)
                .or_default()
                .extend(mnemonics.iter().copied());
        }
        self.total += other.total;
        self.pushes += other.pushes;
        self.pops += other.pops;
        self.total_fee += other.total_fee;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Occurrences of one mnemonic.
    pub fn count(&self, mnemonic: &str) -> u64 {
        self.counts.get(mnemonic).copied().unwrap_or(0)
    }

    /// Combined occurrences of every mnemonic in `set`.
    pub fn count_any(&self, set: &[&str]) -> u64 {
        set.iter().map(|m| self.count(m)).sum()
    }

    pub fn contains(&self, mnemonic: &str) -> bool {
        self.counts.contains_key(mnemonic)
    }

    /// Number of distinct mnemonics.
    pub fn unique(&self) -> usize {
        self.counts.len()
    }

    /// Mnemonic counts in mnemonic order.
    pub fn counts(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counts.iter().map(|(&m, &c)| (m, c))
    }

    /// The `n` most frequent mnemonics, most frequent first; ties by name.
    pub fn most_common(&self, n: usize) -> Vec<(&'static str, u64)> {
        let mut entries: Vec<_> = self.counts().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        entries.truncate(n);
        entries
    }

    /// Instructions belonging to `group`.
    pub fn group_count(&self, group: OpcodeGroup) -> u64 {
        self.groups.get(&group).copied().unwrap_or(0)
    }

    /// Distinct mnemonics seen in `group`.
    pub fn unique_in_group(&self, group: OpcodeGroup) -> usize {
        self.group_mnemonics.get(&group).map_or(0, |set| set.len())
    }

    /// Largest single-instruction fee (0 when empty).
    pub fn max_fee(&self) -> u32 {
        self.fees.keys().next_back().copied().unwrap_or(0)
    }

    /// Instructions whose fee is strictly greater than `threshold`.
    pub fn fees_above(&self, threshold: u32) -> u64 {
        self.fees
            .range(threshold.saturating_add(1)..)
            .map(|(_, &count)| count)
            .sum()
    }

    /// Shannon entropy (nats) of the mnemonic distribution.
    pub fn entropy(&self) -> f64 {
        shannon_entropy(self.counts.values().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disasm::{disassemble, UnknownOpcodePolicy};
    use crate::opcodes::OpcodeTable;
    use crate::types::parse_hex;

    fn hist(hex: &str) -> OpcodeHistogram {
        let program = disassemble(&parse_hex(hex), &OpcodeTable::default(), UnknownOpcodePolicy::Stop);
        OpcodeHistogram::from_program(&program)
    }

    #[test]
    fn test_empty_histogram() {
        let h = OpcodeHistogram::new();
        assert!(h.is_empty());
        assert_eq!(h.unique(), 0);
        assert_eq!(h.max_fee(), 0);
        assert_eq!(h.entropy(), 0.0);
    }

    #[test]
    fn test_counts_and_stack_sums() {
        // PUSH1 1, PUSH1 1, ADD
        let h = hist("0x6001600101");
        assert_eq!(h.total, 3);
        assert_eq!(h.count("PUSH1"), 2);
        assert_eq!(h.count("ADD"), 1);
        assert_eq!(h.count("MUL"), 0);
        assert_eq!(h.unique(), 2);
        assert_eq!(h.pushes, 3);
        assert_eq!(h.pops, 2);
        assert_eq!(h.total_fee, 9);
    }

    #[test]
    fn test_fee_distribution() {
        // LOG2 (1125), SELFDESTRUCT (5000), CALLER (2)
        let h = hist("0xA2FF33");
        assert_eq!(h.max_fee(), 5000);
        assert_eq!(h.fees_above(1000), 2);
        assert_eq!(h.fees_above(1125), 1);
        assert_eq!(h.fees_above(u32::MAX), 0);
    }

    #[test]
    fn test_group_counts() {
        // CALLER, CALLER, CALLVALUE, TIMESTAMP
        let h = hist("0x33333442");
        assert_eq!(h.group_count(OpcodeGroup::Environmental), 3);
        assert_eq!(h.unique_in_group(OpcodeGroup::Environmental), 2);
        assert_eq!(h.group_count(OpcodeGroup::Block), 1);
        assert_eq!(h.group_count(OpcodeGroup::System), 0);
    }

    #[test]
    fn test_count_any() {
        let h = hist("0xF1F1F45A");
        assert_eq!(h.count_any(&["CALL", "DELEGATECALL", "STATICCALL"]), 3);
    }

    #[test]
    fn test_most_common() {
        let h = hist("0x0101015B5B00");
        assert_eq!(h.most_common(2), vec![("ADD", 3), ("JUMPDEST", 2)]);
    }

    #[test]
    fn test_merge() {
        let mut a = hist("0x010101");
        let b = hist("0x3302");
        a.merge(&b);

        assert_eq!(a.total, 5);
        assert_eq!(a.count("ADD"), 3);
        assert_eq!(a.count("CALLER"), 1);
        assert_eq!(a.unique(), 3);
        assert_eq!(a.group_count(OpcodeGroup::Environmental), 1);
        assert_eq!(a.pops, 8);
    }

    #[test]
    fn test_entropy_matches_distribution() {
        // 2x PUSH1, 1x ADD
        let h = hist("0x6001600101");
        let expected = shannon_entropy([1u64, 2]);
        assert_eq!(h.entropy(), expected);
    }
}
