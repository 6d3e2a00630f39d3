//! The per-sample pipeline and its batch form.

use anyhow::Result;
use serde::Serialize;

use crate::batch::{par_map_ordered, LabeledFeatures, Sample};
use crate::config::ExtractorConfig;
use crate::disasm::{disassemble, DecodedProgram};
use crate::features::{self, FeatureVector};
use crate::histogram::OpcodeHistogram;
use crate::opcodes::OpcodeTable;
use crate::pattern::PatternFlags;
use crate::risk::RiskScore;
use crate::types::Bytecode;

/// A trained model (or any rule) that maps a feature vector to a label.
pub trait Classifier {
    type Label;

    fn predict(&self, features: &FeatureVector) -> Self::Label;
}

impl<L, F> Classifier for F
where
    F: Fn(&FeatureVector) -> L,
{
    type Label = L;

    fn predict(&self, features: &FeatureVector) -> L {
        self(features)
    }
}

/// Feature vector together with its risk breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub features: FeatureVector,
    pub risk: RiskScore,
}

/// Decoding tables and options, built once and shared by reference.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
    table: OpcodeTable,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl FeatureExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let table = OpcodeTable::for_fork(config.fork);
        log::debug!(
            "extractor ready: fork {}, {} opcodes, unknown opcodes -> {:?}",
            config.fork,
            table.len(),
            config.unknown_opcodes
        );
        Self { config, table }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn table(&self) -> &OpcodeTable {
        &self.table
    }

    /// Decode one sample with the configured table and unknown-opcode policy.
    pub fn decode<'a>(&self, bytecode: impl Into<Bytecode<'a>>) -> DecodedProgram {
        let bytes = bytecode.into().to_bytes();
        disassemble(&bytes, &self.table, self.config.unknown_opcodes)
    }

    /// Full pipeline for one sample: features plus the risk scores behind them.
    pub fn analyze<'a>(&self, bytecode: impl Into<Bytecode<'a>>) -> Analysis {
        let program = self.decode(bytecode);
        self.analyze_program(&program)
    }

    /// Run aggregation, pattern detection and scoring on a decoded program.
    pub fn analyze_program(&self, program: &DecodedProgram) -> Analysis {
        if program.is_empty() {
            return Analysis {
                features: FeatureVector::zeroed(),
                risk: RiskScore::default(),
            };
        }

        let hist = OpcodeHistogram::from_program(program);
        let patterns = PatternFlags::scan(program);
        let mut features = features::build(&hist, &patterns, self.config.memory_features);
        let risk = RiskScore::from_features(&features);
        risk.apply(&mut features);

        Analysis { features, risk }
    }

    /// Canonical feature vector for one sample.
    pub fn extract<'a>(&self, bytecode: impl Into<Bytecode<'a>>) -> FeatureVector {
        self.analyze(bytecode).features
    }

    /// Extract a labelled batch, preserving order, on `config.worker_count()` workers.
    pub fn extract_batch<L: Send>(&self, samples: Vec<Sample<'_, L>>) -> Result<Vec<LabeledFeatures<L>>> {
        self.extract_batch_with(samples, self.config.worker_count())
    }

    /// Same as [`extract_batch`](Self::extract_batch) with an explicit worker count.
    pub fn extract_batch_with<L: Send>(
        &self,
        samples: Vec<Sample<'_, L>>,
        workers: usize,
    ) -> Result<Vec<LabeledFeatures<L>>> {
        log::info!("extracting {} samples with {} workers", samples.len(), workers);
        par_map_ordered(samples, workers, |sample| LabeledFeatures {
            label: sample.label,
            features: self.extract(sample.bytecode),
        })
    }

    /// Unlabelled batch; results are in input order.
    pub fn extract_all<'a, B>(&self, inputs: Vec<B>) -> Result<Vec<FeatureVector>>
    where
        B: Into<Bytecode<'a>> + Send,
    {
        par_map_ordered(inputs, self.config.worker_count(), |b| self.extract(b))
    }

    /// Extract features and run `classifier` on them.
    pub fn classify<'a, C: Classifier>(
        &self,
        classifier: &C,
        bytecode: impl Into<Bytecode<'a>>,
    ) -> (C::Label, FeatureVector) {
        let features = self.extract(bytecode);
        (classifier.predict(&features), features)
    }
}
