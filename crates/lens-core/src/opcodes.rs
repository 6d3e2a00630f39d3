//! EVM opcode table.
//!
//! Every known opcode is listed once with the fork that introduced it and its
//! base fee at introduction. Later repricings are kept in a separate list and
//! applied when a table is built for a specific fork.

use serde::{Deserialize, Serialize};

/// Protocol upgrades that change which opcodes exist or what they cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    #[default]
    London,
}

impl Fork {
    pub fn label(&self) -> &'static str {
        match self {
            Fork::Frontier => "frontier",
            Fork::Homestead => "homestead",
            Fork::TangerineWhistle => "tangerine_whistle",
            Fork::SpuriousDragon => "spurious_dragon",
            Fork::Byzantium => "byzantium",
            Fork::Constantinople => "constantinople",
            Fork::Petersburg => "petersburg",
            Fork::Istanbul => "istanbul",
            Fork::London => "london",
        }
    }

    pub fn all() -> &'static [Fork] {
        &[
            Fork::Frontier,
            Fork::Homestead,
            Fork::TangerineWhistle,
            Fork::SpuriousDragon,
            Fork::Byzantium,
            Fork::Constantinople,
            Fork::Petersburg,
            Fork::Istanbul,
            Fork::London,
        ]
    }
}

impl std::fmt::Display for Fork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Fork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Fork::all()
            .iter()
            .copied()
            .find(|fork| fork.label() == wanted)
            .ok_or_else(|| format!("Unknown fork: {s}"))
    }
}

/// Static attributes of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub opcode: u8,
    pub mnemonic: &'static str,
    /// Number of immediate data bytes following the opcode (PUSH1..PUSH32).
    pub immediate: u8,
    pub pops: u8,
    pub pushes: u8,
    /// Base gas fee. Dynamic components (memory expansion, cold access) are not modelled.
    pub fee: u32,
    /// First fork in which the opcode is defined.
    pub since: Fork,
}

impl OpcodeInfo {
    /// Placeholder used when an unknown byte is decoded as `INVALID`.
    pub const fn invalid(opcode: u8) -> Self {
        Self {
            opcode,
            mnemonic: "INVALID",
            immediate: 0,
            pops: 0,
            pushes: 0,
            fee: 0,
            since: Fork::Frontier,
        }
    }

    const fn added(mut self, fork: Fork) -> Self {
        self.since = fork;
        self
    }
}

const fn op(opcode: u8, mnemonic: &'static str, pops: u8, pushes: u8, fee: u32) -> OpcodeInfo {
    OpcodeInfo {
        opcode,
        mnemonic,
        immediate: 0,
        pops,
        pushes,
        fee,
        since: Fork::Frontier,
    }
}

const fn push(opcode: u8, mnemonic: &'static str) -> OpcodeInfo {
    OpcodeInfo {
        opcode,
        mnemonic,
        immediate: opcode - 0x5F,
        pops: 0,
        pushes: 1,
        fee: 3,
        since: Fork::Frontier,
    }
}

const fn dup(opcode: u8, mnemonic: &'static str) -> OpcodeInfo {
    let n = opcode - 0x7F;
    op(opcode, mnemonic, n, n + 1, 3)
}

const fn swap(opcode: u8, mnemonic: &'static str) -> OpcodeInfo {
    let n = opcode - 0x8F;
    op(opcode, mnemonic, n + 1, n + 1, 3)
}

const fn log(opcode: u8, mnemonic: &'static str) -> OpcodeInfo {
    let topics = opcode - 0xA0;
    op(opcode, mnemonic, topics + 2, 0, 375 * (topics as u32 + 1))
}

/// Every opcode known to the latest supported fork.
pub const OPCODES: &[OpcodeInfo] = &[
    // Stop and arithmetic
    op(0x00, "STOP", 0, 0, 0),
    op(0x01, "ADD", 2, 1, 3),
    op(0x02, "MUL", 2, 1, 5),
    op(0x03, "SUB", 2, 1, 3),
    op(0x04, "DIV", 2, 1, 5),
    op(0x05, "SDIV", 2, 1, 5),
    op(0x06, "MOD", 2, 1, 5),
    op(0x07, "SMOD", 2, 1, 5),
    op(0x08, "ADDMOD", 3, 1, 8),
    op(0x09, "MULMOD", 3, 1, 8),
    op(0x0A, "EXP", 2, 1, 10),
    op(0x0B, "SIGNEXTEND", 2, 1, 5),
    // Comparison and bitwise logic
    op(0x10, "LT", 2, 1, 3),
    op(0x11, "GT", 2, 1, 3),
    op(0x12, "SLT", 2, 1, 3),
    op(0x13, "SGT", 2, 1, 3),
    op(0x14, "EQ", 2, 1, 3),
    op(0x15, "ISZERO", 1, 1, 3),
    op(0x16, "AND", 2, 1, 3),
    op(0x17, "OR", 2, 1, 3),
    op(0x18, "XOR", 2, 1, 3),
    op(0x19, "NOT", 1, 1, 3),
    op(0x1A, "BYTE", 2, 1, 3),
    op(0x1B, "SHL", 2, 1, 3).added(Fork::Constantinople),
    op(0x1C, "SHR", 2, 1, 3).added(Fork::Constantinople),
    op(0x1D, "SAR", 2, 1, 3).added(Fork::Constantinople),
    op(0x20, "SHA3", 2, 1, 30),
    // Environmental information
    op(0x30, "ADDRESS", 0, 1, 2),
    op(0x31, "BALANCE", 1, 1, 20),
    op(0x32, "ORIGIN", 0, 1, 2),
    op(0x33, "CALLER", 0, 1, 2),
    op(0x34, "CALLVALUE", 0, 1, 2),
    op(0x35, "CALLDATALOAD", 1, 1, 3),
    op(0x36, "CALLDATASIZE", 0, 1, 2),
    op(0x37, "CALLDATACOPY", 3, 0, 3),
    op(0x38, "CODESIZE", 0, 1, 2),
    op(0x39, "CODECOPY", 3, 0, 3),
    op(0x3A, "GASPRICE", 0, 1, 2),
    op(0x3B, "EXTCODESIZE", 1, 1, 20),
    op(0x3C, "EXTCODECOPY", 4, 0, 20),
    op(0x3D, "RETURNDATASIZE", 0, 1, 2).added(Fork::Byzantium),
    op(0x3E, "RETURNDATACOPY", 3, 0, 3).added(Fork::Byzantium),
    op(0x3F, "EXTCODEHASH", 1, 1, 400).added(Fork::Constantinople),
    // Block information
    op(0x40, "BLOCKHASH", 1, 1, 20),
    op(0x41, "COINBASE", 0, 1, 2),
    op(0x42, "TIMESTAMP", 0, 1, 2),
    op(0x43, "NUMBER", 0, 1, 2),
    op(0x44, "DIFFICULTY", 0, 1, 2),
    op(0x45, "GASLIMIT", 0, 1, 2),
    op(0x46, "CHAINID", 0, 1, 2).added(Fork::Istanbul),
    op(0x47, "SELFBALANCE", 0, 1, 5).added(Fork::Istanbul),
    op(0x48, "BASEFEE", 0, 1, 2).added(Fork::London),
    // Stack, memory, storage and flow
    op(0x50, "POP", 1, 0, 2),
    op(0x51, "MLOAD", 1, 1, 3),
    op(0x52, "MSTORE", 2, 0, 3),
    op(0x53, "MSTORE8", 2, 0, 3),
    op(0x54, "SLOAD", 1, 1, 50),
    op(0x55, "SSTORE", 2, 0, 0),
    op(0x56, "JUMP", 1, 0, 8),
    op(0x57, "JUMPI", 2, 0, 10),
    op(0x58, "PC", 0, 1, 2),
    op(0x59, "MSIZE", 0, 1, 2),
    op(0x5A, "GAS", 0, 1, 2),
    op(0x5B, "JUMPDEST", 0, 0, 1),
    // Push
    push(0x60, "PUSH1"),
    push(0x61, "PUSH2"),
    push(0x62, "PUSH3"),
    push(0x63, "PUSH4"),
    push(0x64, "PUSH5"),
    push(0x65, "PUSH6"),
    push(0x66, "PUSH7"),
    push(0x67, "PUSH8"),
    push(0x68, "PUSH9"),
    push(0x69, "PUSH10"),
    push(0x6A, "PUSH11"),
    push(0x6B, "PUSH12"),
    push(0x6C, "PUSH13"),
    push(0x6D, "PUSH14"),
    push(0x6E, "PUSH15"),
    push(0x6F, "PUSH16"),
    push(0x70, "PUSH17"),
    push(0x71, "PUSH18"),
    push(0x72, "PUSH19"),
    push(0x73, "PUSH20"),
    push(0x74, "PUSH21"),
    push(0x75, "PUSH22"),
    push(0x76, "PUSH23"),
    push(0x77, "PUSH24"),
    push(0x78, "PUSH25"),
    push(0x79, "PUSH26"),
    push(0x7A, "PUSH27"),
    push(0x7B, "PUSH28"),
    push(0x7C, "PUSH29"),
    push(0x7D, "PUSH30"),
    push(0x7E, "PUSH31"),
    push(0x7F, "PUSH32"),
    // Duplication
    dup(0x80, "DUP1"),
    dup(0x81, "DUP2"),
    dup(0x82, "DUP3"),
    dup(0x83, "DUP4"),
    dup(0x84, "DUP5"),
    dup(0x85, "DUP6"),
    dup(0x86, "DUP7"),
    dup(0x87, "DUP8"),
    dup(0x88, "DUP9"),
    dup(0x89, "DUP10"),
    dup(0x8A, "DUP11"),
    dup(0x8B, "DUP12"),
    dup(0x8C, "DUP13"),
    dup(0x8D, "DUP14"),
    dup(0x8E, "DUP15"),
    dup(0x8F, "DUP16"),
    // Exchange
    swap(0x90, "SWAP1"),
    swap(0x91, "SWAP2"),
    swap(0x92, "SWAP3"),
    swap(0x93, "SWAP4"),
    swap(0x94, "SWAP5"),
    swap(0x95, "SWAP6"),
    swap(0x96, "SWAP7"),
    swap(0x97, "SWAP8"),
    swap(0x98, "SWAP9"),
    swap(0x99, "SWAP10"),
    swap(0x9A, "SWAP11"),
    swap(0x9B, "SWAP12"),
    swap(0x9C, "SWAP13"),
    swap(0x9D, "SWAP14"),
    swap(0x9E, "SWAP15"),
    swap(0x9F, "SWAP16"),
    // Logging
    log(0xA0, "LOG0"),
    log(0xA1, "LOG1"),
    log(0xA2, "LOG2"),
    log(0xA3, "LOG3"),
    log(0xA4, "LOG4"),
    // System
    op(0xF0, "CREATE", 3, 1, 32000),
    op(0xF1, "CALL", 7, 1, 40),
    op(0xF2, "CALLCODE", 7, 1, 40),
    op(0xF3, "RETURN", 2, 0, 0),
    op(0xF4, "DELEGATECALL", 6, 1, 40).added(Fork::Homestead),
    op(0xF5, "CREATE2", 4, 1, 32000).added(Fork::Constantinople),
    op(0xFA, "STATICCALL", 6, 1, 40).added(Fork::Byzantium),
    op(0xFD, "REVERT", 2, 0, 0).added(Fork::Byzantium),
    op(0xFE, "INVALID", 0, 0, 0),
    op(0xFF, "SELFDESTRUCT", 1, 0, 0),
];

/// Base-fee changes: (opcode, fork the new fee takes effect, new fee).
pub const REPRICINGS: &[(u8, Fork, u32)] = &[
    (0x31, Fork::TangerineWhistle, 400),
    (0x3B, Fork::TangerineWhistle, 700),
    (0x3C, Fork::TangerineWhistle, 700),
    (0x54, Fork::TangerineWhistle, 200),
    (0xF1, Fork::TangerineWhistle, 700),
    (0xF2, Fork::TangerineWhistle, 700),
    (0xF4, Fork::TangerineWhistle, 700),
    (0xFF, Fork::TangerineWhistle, 5000),
    (0x31, Fork::Istanbul, 700),
    (0x3F, Fork::Istanbul, 700),
    (0x54, Fork::Istanbul, 800),
];

/// Direct byte-indexed opcode lookup for one fork.
#[derive(Debug, Clone)]
pub struct OpcodeTable {
    fork: Fork,
    entries: [Option<OpcodeInfo>; 256],
}

impl OpcodeTable {
    pub fn for_fork(fork: Fork) -> Self {
        let mut entries = [None; 256];
        for info in OPCODES.iter().filter(|info| info.since <= fork) {
            entries[info.opcode as usize] = Some(*info);
        }

        // REPRICINGS is ordered by fork, so the latest applicable fee wins.
        for &(opcode, at, fee) in REPRICINGS {
            if at <= fork {
                if let Some(info) = entries[opcode as usize].as_mut() {
                    info.fee = fee;
                }
            }
        }

        Self { fork, entries }
    }

    pub fn fork(&self) -> Fork {
        self.fork
    }

    pub fn get(&self, opcode: u8) -> Option<&OpcodeInfo> {
        self.entries[opcode as usize].as_ref()
    }

    /// Look up an opcode by mnemonic (linear scan).
    pub fn by_mnemonic(&self, mnemonic: &str) -> Option<&OpcodeInfo> {
        self.entries.iter().flatten().find(|info| info.mnemonic == mnemonic)
    }

    /// Number of defined opcodes.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::for_fork(Fork::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicate_opcodes() {
        let mut seen = [false; 256];
        for info in OPCODES {
            assert!(!seen[info.opcode as usize], "duplicate opcode 0x{:02X}", info.opcode);
            seen[info.opcode as usize] = true;
        }
    }

    #[test]
    fn london_table_size() {
        // 12 + 14 + 1 + 16 + 9 + 12 + 32 + 16 + 16 + 5 + 10
        assert_eq!(OpcodeTable::for_fork(Fork::London).len(), 143);
    }

    #[test]
    fn push_immediates() {
        let table = OpcodeTable::default();
        assert_eq!(table.get(0x60).unwrap().immediate, 1);
        assert_eq!(table.get(0x7F).unwrap().immediate, 32);
        assert_eq!(table.get(0x7F).unwrap().mnemonic, "PUSH32");
        assert_eq!(table.get(0x5B).unwrap().immediate, 0);
    }

    #[test]
    fn stack_effects_of_families() {
        let table = OpcodeTable::default();
        let dup3 = table.by_mnemonic("DUP3").unwrap();
        assert_eq!((dup3.pops, dup3.pushes), (3, 4));
        let swap2 = table.by_mnemonic("SWAP2").unwrap();
        assert_eq!((swap2.pops, swap2.pushes), (3, 3));
        let log4 = table.by_mnemonic("LOG4").unwrap();
        assert_eq!((log4.pops, log4.pushes, log4.fee), (6, 0, 1875));
    }

    #[test]
    fn fork_gating() {
        let frontier = OpcodeTable::for_fork(Fork::Frontier);
        assert!(frontier.get(0xF4).is_none()); // DELEGATECALL
        assert!(frontier.get(0xFA).is_none()); // STATICCALL
        assert!(frontier.get(0x48).is_none()); // BASEFEE

        let byzantium = OpcodeTable::for_fork(Fork::Byzantium);
        assert_eq!(byzantium.get(0xFA).unwrap().mnemonic, "STATICCALL");
        assert!(byzantium.get(0x1B).is_none()); // SHL
    }

    #[test]
    fn repricing_follows_fork() {
        let fee = |fork, opcode| OpcodeTable::for_fork(fork).get(opcode).unwrap().fee;

        assert_eq!(fee(Fork::Frontier, 0x54), 50);
        assert_eq!(fee(Fork::TangerineWhistle, 0x54), 200);
        assert_eq!(fee(Fork::London, 0x54), 800);
        assert_eq!(fee(Fork::Homestead, 0xFF), 0);
        assert_eq!(fee(Fork::London, 0xFF), 5000);
        assert_eq!(fee(Fork::London, 0x31), 700);
        assert_eq!(fee(Fork::London, 0xFA), 40);
    }

    #[test]
    fn fork_from_str() {
        assert_eq!("London".parse::<Fork>().unwrap(), Fork::London);
        assert_eq!("tangerine-whistle".parse::<Fork>().unwrap(), Fork::TangerineWhistle);
        assert!("shanghai".parse::<Fork>().is_err());
    }
}
