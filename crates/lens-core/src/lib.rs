pub mod types;
pub mod opcodes;
pub mod disasm;
pub mod entropy;
pub mod histogram;
pub mod pattern;
pub mod features;
pub mod risk;
pub mod config;
pub mod batch;
pub mod extractor;
pub mod mapped_file;

pub use types::*;
pub use opcodes::{Fork, OpcodeInfo, OpcodeTable};
pub use disasm::{disassemble, DecodeStop, DecodedProgram, Instruction, UnknownOpcodePolicy};
pub use entropy::shannon_entropy;
pub use histogram::OpcodeHistogram;
pub use pattern::{PatternFlags, PcIndex};
pub use features::{Feature, FeatureError, FeatureVector};
pub use risk::{RiskIndicators, RiskScore};
pub use config::{ConfigError, ExtractorConfig};
pub use batch::{par_map_ordered, LabeledFeatures, Sample};
pub use extractor::{Analysis, Classifier, FeatureExtractor};
pub use mapped_file::MappedFile;
