//! Positional proximity heuristics.
//!
//! Each heuristic looks for a "lead" opcode followed by a "follow" opcode
//! within a fixed number of bytes. Distances are measured on the linear
//! program-counter axis, not along execution paths: a pair separated by a
//! jump still counts, and a pair reachable only through a jump does not.

use std::collections::BTreeMap;

use crate::disasm::DecodedProgram;

/// Max byte distance (exclusive) from `SSTORE` to an external call.
pub const REENTRANCY_WINDOW: u64 = 20;
/// Max byte distance (exclusive) from an arithmetic op to `JUMPI`.
pub const UNSAFE_ARITHMETIC_WINDOW: u64 = 5;
/// Max byte distance (exclusive) from `BALANCE` to an external call.
pub const BALANCE_CALL_WINDOW: u64 = 10;

pub const ARITHMETIC_OPS: &[&str] = &[
    "ADD", "SUB", "MUL", "DIV", "MOD", "SDIV", "SMOD", "EXP", "SIGNEXTEND",
];

pub const EXTERNAL_CALL_OPS: &[&str] = &["CALL", "DELEGATECALL", "STATICCALL", "CALLCODE"];

/// Mnemonics whose positions are indexed (besides the two sets above).
const POSITIONAL_OPS: &[&str] = &["SSTORE", "BALANCE", "JUMPI"];

fn is_tracked(mnemonic: &'static str) -> bool {
    ARITHMETIC_OPS.contains(&mnemonic)
        || EXTERNAL_CALL_OPS.contains(&mnemonic)
        || POSITIONAL_OPS.contains(&mnemonic)
}

/// Ascending program counters of the tracked mnemonics present in a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PcIndex {
    positions: BTreeMap<&'static str, Vec<u64>>,
}

impl PcIndex {
    pub fn from_program(program: &DecodedProgram) -> Self {
        let mut positions: BTreeMap<&'static str, Vec<u64>> = BTreeMap::new();
        // Instructions are already in pc order, so each list stays sorted.
        for insn in program.iter().filter(|i| is_tracked(i.mnemonic)) {
            positions.entry(insn.mnemonic).or_default().push(insn.pc);
        }
        Self { positions }
    }

    /// Positions of `mnemonic`; empty if absent or untracked.
    pub fn positions(&self, mnemonic: &str) -> &[u64] {
        self.positions.get(mnemonic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorted positions of every mnemonic in `set`.
    pub fn positions_of_any(&self, set: &[&str]) -> Vec<u64> {
        let mut merged: Vec<u64> = set.iter().flat_map(|m| self.positions(m)).copied().collect();
        merged.sort_unstable();
        merged
    }

    /// Mnemonics with at least one recorded position.
    pub fn mnemonics(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.positions.keys().copied()
    }
}

/// True if some `lead` is followed by some `follow` with `0 < follow - lead < window`.
///
/// Both slices must be sorted ascending. Stops at the first qualifying pair.
pub fn follows_within(leads: &[u64], follows: &[u64], window: u64) -> bool {
    leads.iter().any(|&lead| {
        let next = follows.partition_point(|&pc| pc <= lead);
        follows.get(next).is_some_and(|&pc| pc - lead < window)
    })
}

/// Boolean outcome of the three proximity heuristics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternFlags {
    /// `SSTORE` shortly before an external call.
    pub potential_reentrancy: bool,
    /// Arithmetic shortly before `JUMPI`.
    pub unsafe_arithmetic: bool,
    /// `BALANCE` shortly before an external call.
    pub balance_before_external_call: bool,
}

impl PatternFlags {
    pub fn detect(index: &PcIndex) -> Self {
        let calls = index.positions_of_any(EXTERNAL_CALL_OPS);

        Self {
            potential_reentrancy: follows_within(index.positions("SSTORE"), &calls, REENTRANCY_WINDOW),
            unsafe_arithmetic: follows_within(
                &index.positions_of_any(ARITHMETIC_OPS),
                index.positions("JUMPI"),
                UNSAFE_ARITHMETIC_WINDOW,
            ),
            balance_before_external_call: follows_within(
                index.positions("BALANCE"),
                &calls,
                BALANCE_CALL_WINDOW,
            ),
        }
    }

    pub fn scan(program: &DecodedProgram) -> Self {
        Self::detect(&PcIndex::from_program(program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disasm::{disassemble, UnknownOpcodePolicy};
    use crate::opcodes::OpcodeTable;

    fn program(code: &[u8]) -> DecodedProgram {
        disassemble(code, &OpcodeTable::default(), UnknownOpcodePolicy::Stop)
    }

    /// `lead`, then `gap` JUMPDEST bytes, then `follow`.
    fn spaced(lead: u8, gap: usize, follow: u8) -> Vec<u8> {
        let mut code = vec![lead];
        code.extend(std::iter::repeat(0x5B).take(gap));
        code.push(follow);
        code
    }

    #[test]
    fn follows_within_basic() {
        assert!(follows_within(&[0], &[4], 5));
        assert!(!follows_within(&[0], &[5], 5));
        assert!(!follows_within(&[4], &[4], 5));
        assert!(!follows_within(&[10], &[2], 5));
        assert!(!follows_within(&[], &[1], 5));
        assert!(!follows_within(&[1], &[], 5));
    }

    #[test]
    fn follows_within_uses_nearest_successor() {
        // The follow at 3 precedes the lead at 7; the one at 30 is too far.
        assert!(!follows_within(&[7], &[3, 30], 20));
        assert!(follows_within(&[7, 25], &[3, 30], 20));
    }

    #[test]
    fn index_tracks_only_interesting_present_ops() {
        // PUSH1 0, SSTORE, GAS, CALL, ADD
        let idx = PcIndex::from_program(&program(&[0x60, 0x00, 0x55, 0x5A, 0xF1, 0x01]));
        let tracked: Vec<_> = idx.mnemonics().collect();
        assert_eq!(tracked, ["ADD", "CALL", "SSTORE"]);
        assert_eq!(idx.positions("SSTORE"), &[2]);
        assert_eq!(idx.positions("CALL"), &[4]);
        assert!(idx.positions("PUSH1").is_empty());
        assert!(idx.positions("JUMPI").is_empty());
    }

    #[test]
    fn reentrancy_window_boundary() {
        // distance 19 qualifies
        let flags = PatternFlags::scan(&program(&spaced(0x55, 18, 0xF1)));
        assert!(flags.potential_reentrancy);

        // distance 20 does not
        let flags = PatternFlags::scan(&program(&spaced(0x55, 19, 0xF1)));
        assert!(!flags.potential_reentrancy);
    }

    #[test]
    fn reentrancy_any_call_kind() {
        for call in [0xF1, 0xF2, 0xF4, 0xFA] {
            let flags = PatternFlags::scan(&program(&spaced(0x55, 3, call)));
            assert!(flags.potential_reentrancy, "call opcode 0x{:02X}", call);
        }
    }

    #[test]
    fn call_before_sstore_is_not_reentrancy() {
        let flags = PatternFlags::scan(&program(&[0xF1, 0x55]));
        assert!(!flags.potential_reentrancy);
    }

    #[test]
    fn unsafe_arithmetic_window_boundary() {
        assert!(PatternFlags::scan(&program(&spaced(0x01, 3, 0x57))).unsafe_arithmetic);
        assert!(!PatternFlags::scan(&program(&spaced(0x01, 4, 0x57))).unsafe_arithmetic);
        // SIGNEXTEND counts as arithmetic, ADDMOD does not
        assert!(PatternFlags::scan(&program(&spaced(0x0B, 0, 0x57))).unsafe_arithmetic);
        assert!(!PatternFlags::scan(&program(&spaced(0x08, 0, 0x57))).unsafe_arithmetic);
    }

    #[test]
    fn balance_before_call_window_boundary() {
        assert!(PatternFlags::scan(&program(&spaced(0x31, 8, 0xF1))).balance_before_external_call);
        assert!(!PatternFlags::scan(&program(&spaced(0x31, 9, 0xF1))).balance_before_external_call);
    }

    #[test]
    fn window_counts_bytes_not_instructions() {
        // SSTORE, PUSH32 <32 bytes>, CALL: one instruction apart but 34 bytes away.
        let mut code = vec![0x55, 0x7F];
        code.extend([0u8; 32]);
        code.push(0xF1);
        let flags = PatternFlags::scan(&program(&code));
        assert!(!flags.potential_reentrancy);
    }

    #[test]
    fn empty_program_has_no_patterns() {
        assert_eq!(PatternFlags::scan(&DecodedProgram::default()), PatternFlags::default());
    }
}
