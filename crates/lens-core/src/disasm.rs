use serde::{Deserialize, Serialize};

use crate::opcodes::{OpcodeInfo, OpcodeTable};
use crate::types::OpcodeGroup;

/// What to do with a byte that has no entry in the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOpcodePolicy {
    /// Stop decoding and keep the instructions decoded so far.
    #[default]
    Stop,
    /// Emit a one-byte `INVALID` instruction with no stack effect or fee and continue.
    Invalid,
}

impl std::str::FromStr for UnknownOpcodePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "invalid" => Ok(Self::Invalid),
            _ => Err(format!("Unknown opcode policy: {s}. Use 'stop' or 'invalid'.")),
        }
    }
}

/// A single decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Byte offset of the opcode within the bytecode.
    pub pc: u64,
    pub opcode: u8,
    pub mnemonic: &'static str,
    /// Immediate data (PUSH family only).
    pub operand: Vec<u8>,
    pub pushes: u8,
    pub pops: u8,
    pub fee: u32,
    pub group: OpcodeGroup,
}

impl Instruction {
    fn decoded(pc: usize, info: &OpcodeInfo, operand: &[u8]) -> Self {
        Self {
            pc: pc as u64,
            opcode: info.opcode,
            mnemonic: info.mnemonic,
            operand: operand.to_vec(),
            pushes: info.pushes,
            pops: info.pops,
            fee: info.fee,
            group: OpcodeGroup::from_opcode(info.opcode),
        }
    }

    /// Encoded size in bytes (opcode plus immediate data).
    pub fn size(&self) -> usize {
        1 + self.operand.len()
    }

    /// Immediate data as `0x`-prefixed hex, empty if there is none.
    pub fn operand_hex(&self) -> String {
        if self.operand.is_empty() {
            String::new()
        } else {
            format!("0x{}", hex::encode(&self.operand))
        }
    }

    /// Full instruction text (mnemonic + operand).
    pub fn text(&self) -> String {
        if self.operand.is_empty() {
            self.mnemonic.to_string()
        } else {
            format!("{} {}", self.mnemonic, self.operand_hex())
        }
    }
}

/// Why decoding ended before the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStop {
    UnknownOpcode { pc: u64, opcode: u8 },
    TruncatedImmediate { pc: u64, mnemonic: &'static str },
}

impl std::fmt::Display for DecodeStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeStop::UnknownOpcode { pc, opcode } => {
                write!(f, "unknown opcode 0x{:02X} at pc {}", opcode, pc)
            }
            DecodeStop::TruncatedImmediate { pc, mnemonic } => {
                write!(f, "truncated {} immediate at pc {}", mnemonic, pc)
            }
        }
    }
}

/// Result of decoding one bytecode sample.
///
/// May be empty, and may be a prefix of the real program when decoding
/// stopped early.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedProgram {
    pub instructions: Vec<Instruction>,
    /// Number of input bytes covered by `instructions`.
    pub bytes_consumed: usize,
    /// Set when decoding ended before the input did.
    pub stop: Option<DecodeStop>,
}

impl DecodedProgram {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.stop.is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }
}

/// Decode `code` opcode-by-opcode. Never fails: on an unrecoverable byte
/// sequence the instructions decoded so far are returned.
pub fn disassemble(code: &[u8], table: &OpcodeTable, policy: UnknownOpcodePolicy) -> DecodedProgram {
    let mut instructions = Vec::with_capacity(code.len() / 2);
    let mut stop = None;
    let mut pc = 0usize;

    while pc < code.len() {
        let opcode = code[pc];
        let info = match (table.get(opcode), policy) {
            (Some(info), _) => *info,
            (None, UnknownOpcodePolicy::Invalid) => OpcodeInfo::invalid(opcode),
            (None, UnknownOpcodePolicy::Stop) => {
                stop = Some(DecodeStop::UnknownOpcode { pc: pc as u64, opcode });
                break;
            }
        };

        let operand_start = pc + 1;
        let operand_end = operand_start + info.immediate as usize;
        if operand_end > code.len() {
            stop = Some(DecodeStop::TruncatedImmediate {
                pc: pc as u64,
                mnemonic: info.mnemonic,
            });
            break;
        }

        instructions.push(Instruction::decoded(pc, &info, &code[operand_start..operand_end]));
        pc = operand_end;
    }

    if let Some(reason) = &stop {
        log::debug!(
            "decoding stopped after {} instructions ({} of {} bytes): {}",
            instructions.len(),
            pc,
            code.len(),
            reason
        );
    }

    DecodedProgram {
        instructions,
        bytes_consumed: pc,
        stop,
    }
}
