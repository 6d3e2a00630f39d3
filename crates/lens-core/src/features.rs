//! The canonical feature set and the builder that fills it.
//!
//! The set of names is fixed at compile time: a [`FeatureVector`] always
//! carries exactly one value per [`Feature`], whatever the input was.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::histogram::OpcodeHistogram;
use crate::pattern::{PatternFlags, ARITHMETIC_OPS, EXTERNAL_CALL_OPS};
use crate::types::OpcodeGroup;

/// Fee above which an instruction counts as high-gas.
pub const HIGH_GAS_FEE: u32 = 1000;

pub const BLOCK_DEPENDENT_OPS: &[&str] =
    &["TIMESTAMP", "NUMBER", "DIFFICULTY", "GASLIMIT", "COINBASE", "BLOCKHASH"];

pub const RANDOMNESS_OPS: &[&str] = &["BLOCKHASH", "TIMESTAMP", "DIFFICULTY", "COINBASE"];

pub const CALLDATA_OPS: &[&str] = &["CALLDATASIZE", "CALLDATALOAD", "CALLDATACOPY"];

pub const CONTROL_FLOW_OPS: &[&str] = &["JUMP", "JUMPI", "RETURN", "REVERT", "STOP", "INVALID"];

/// Block-dependent, external-call and arithmetic ops plus `SELFDESTRUCT`.
/// The member sets are disjoint, so counts over them can simply be added.
const DANGEROUS_EXTRA_OPS: &[&str] = &["SELFDESTRUCT"];

macro_rules! features {
    ($($variant:ident => $name:literal,)+) => {
        /// One named entry of the canonical feature set, in canonical order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Feature {
            $($variant,)+
        }

        impl Feature {
            pub const ALL: &'static [Feature] = &[$(Feature::$variant,)+];
            pub const COUNT: usize = Self::ALL.len();

            pub fn name(&self) -> &'static str {
                match self {
                    $(Feature::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Feature> {
                match name {
                    $($name => Some(Feature::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

features! {
    TotalInstructions => "total_instructions",
    UniqueInstructions => "unique_instructions",
    BlockDependentCount => "block_dependent_count",
    BlockDependencyIndex => "block_dependency_index",
    HasTimestamp => "has_TIMESTAMP",
    HasNumber => "has_NUMBER",
    HasDifficulty => "has_DIFFICULTY",
    HasGaslimit => "has_GASLIMIT",
    HasCoinbase => "has_COINBASE",
    HasBlockhash => "has_BLOCKHASH",
    EnvironmentalInstructionsCount => "environmental_instructions_count",
    EnvironmentalRatio => "environmental_ratio",
    UniqueEnvironmentalOps => "unique_environmental_ops",
    EnvironmentalComplexity => "environmental_complexity",
    BalanceOperations => "balance_operations",
    AddressOperations => "address_operations",
    CallerOperations => "caller_operations",
    OriginOperations => "origin_operations",
    CallvalueOperations => "callvalue_operations",
    ExternalDependencyIndex => "external_dependency_index",
    CalldataSizeOps => "calldata_size_ops",
    CalldataLoadOps => "calldata_load_ops",
    CalldataCopyOps => "calldata_copy_ops",
    TotalCalldataOps => "total_calldata_ops",
    CalldataDensity => "calldata_density",
    ExternalCallCount => "external_call_count",
    HasExternalCalls => "has_external_calls",
    CallValueOps => "call_value_ops",
    CallGasLimitOps => "call_gas_limit_ops",
    PotentialReentrancyPattern => "potential_reentrancy_pattern",
    ReadsFromMemory => "reads_from_memory",
    WritesToMemory => "writes_to_memory",
    MemoryAccessRatio => "memory_access_ratio",
    Pushes => "pushes",
    Pops => "pops",
    StackImbalance => "stack_imbalance",
    StackOperationsRatio => "stack_operations_ratio",
    StackUnderflowRisk => "stack_underflow_risk",
    TotalGasCost => "total_gas_cost",
    AvgGasPerInstruction => "avg_gas_per_instruction",
    MaxGasInstruction => "max_gas_instruction",
    HighGasInstructions => "high_gas_instructions",
    GasDosRiskIndex => "gas_dos_risk_index",
    ArithmeticOpsCount => "arithmetic_ops_count",
    ArithmeticDensity => "arithmetic_density",
    UnsafeArithmeticPattern => "unsafe_arithmetic_pattern",
    ControlFlowOps => "control_flow_ops",
    JumpiCount => "jumpi_count",
    ConditionalBranchingRatio => "conditional_branching_ratio",
    ControlFlowComplexity => "control_flow_complexity",
    CallerBasedChecks => "caller_based_checks",
    OriginUsage => "origin_usage",
    AccessControlRatio => "access_control_ratio",
    UsesOriginInsteadCaller => "uses_origin_instead_caller",
    BalanceBeforeExternalCall => "balance_before_external_call",
    RandomnessOpsCount => "randomness_ops_count",
    HasBadRandomnessPattern => "has_bad_randomness_pattern",
    DangerousOpsCount => "dangerous_ops_count",
    DangerousOpsDensity => "dangerous_ops_density",
    OpcodeEntropy => "opcode_entropy",
    ReentrancyRiskScore => "reentrancy_risk_score",
    FrontrunningRiskScore => "frontrunning_risk_score",
    DosRiskScore => "dos_risk_score",
    ArithmeticRiskScore => "arithmetic_risk_score",
    OverallSecurityRiskScore => "overall_security_risk_score",
    HasReentrancyIndicators => "has_reentrancy_indicators",
    HasUncheckedExternalCalls => "has_unchecked_external_calls",
    HasArithmeticVulnerabilities => "has_arithmetic_vulnerabilities",
    HasAccessControlIssues => "has_access_control_issues",
    HasDosVulnerabilities => "has_dos_vulnerabilities",
}

impl Feature {
    /// Canonical feature names in canonical order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.iter().map(Feature::name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors when rebuilding a vector from named values.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    UnknownFeature(String),
    MissingFeature(&'static str),
    NonFinite(&'static str),
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureError::UnknownFeature(name) => write!(f, "Unknown feature: {}", name),
            FeatureError::MissingFeature(name) => write!(f, "Missing feature: {}", name),
            FeatureError::NonFinite(name) => write!(f, "Non-finite value for feature: {}", name),
        }
    }
}

impl std::error::Error for FeatureError {}

/// One value per canonical feature.
///
/// Serializes as a map keyed by feature name in canonical order, and only
/// deserializes from a map carrying exactly the canonical names.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "HashMap<String, f64>")]
pub struct FeatureVector {
    values: [f64; Feature::COUNT],
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl FeatureVector {
    /// The canonical all-zero vector.
    pub fn zeroed() -> Self {
        Self { values: [0.0; Feature::COUNT] }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    pub fn set_flag(&mut self, feature: Feature, flag: bool) {
        self.set(feature, if flag { 1.0 } else { 0.0 });
    }

    /// Look up a value by canonical name.
    pub fn value(&self, name: &str) -> Option<f64> {
        Feature::from_name(name).map(|f| self.get(f))
    }

    /// `(name, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Feature::ALL.iter().map(move |&f| (f.name(), self.get(f)))
    }

    /// Values in canonical order, for row-oriented consumers.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// True when every value is zero.
    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl TryFrom<HashMap<String, f64>> for FeatureVector {
    type Error = FeatureError;

    fn try_from(map: HashMap<String, f64>) -> Result<Self, Self::Error> {
        if let Some(unknown) = map.keys().find(|k| Feature::from_name(k).is_none()) {
            return Err(FeatureError::UnknownFeature(unknown.clone()));
        }

        let mut vector = FeatureVector::zeroed();
        for &feature in Feature::ALL {
            let value = *map
                .get(feature.name())
                .ok_or(FeatureError::MissingFeature(feature.name()))?;
            if !value.is_finite() {
                return Err(FeatureError::NonFinite(feature.name()));
            }
            vector.set(feature, value);
        }
        Ok(vector)
    }
}

/// Fill every non-score feature from an aggregated, non-empty program.
///
/// Score and indicator features are left at zero for the risk scorer.
/// When `memory_features` is false the memory columns stay zero.
pub fn build(hist: &OpcodeHistogram, patterns: &PatternFlags, memory_features: bool) -> FeatureVector {
    use Feature::*;

    debug_assert!(hist.total > 0, "empty programs map to the zero vector");
    let mut fv = FeatureVector::zeroed();
    let total = hist.total as f64;
    let count = |mnemonic: &str| hist.count(mnemonic) as f64;
    let count_any = |set: &[&str]| hist.count_any(set) as f64;

    fv.set(TotalInstructions, total);
    fv.set(UniqueInstructions, hist.unique() as f64);

    // Block dependence
    let block_dependent = count_any(BLOCK_DEPENDENT_OPS);
    fv.set(BlockDependentCount, block_dependent);
    fv.set(BlockDependencyIndex, block_dependent / total);
    for (feature, mnemonic) in [
        (HasTimestamp, "TIMESTAMP"),
        (HasNumber, "NUMBER"),
        (HasDifficulty, "DIFFICULTY"),
        (HasGaslimit, "GASLIMIT"),
        (HasCoinbase, "COINBASE"),
        (HasBlockhash, "BLOCKHASH"),
    ] {
        fv.set_flag(feature, hist.contains(mnemonic));
    }

    // Environmental
    let environmental = hist.group_count(OpcodeGroup::Environmental) as f64;
    let unique_environmental = hist.unique_in_group(OpcodeGroup::Environmental) as f64;
    let environmental_ratio = environmental / total;
    fv.set(EnvironmentalInstructionsCount, environmental);
    fv.set(EnvironmentalRatio, environmental_ratio);
    fv.set(UniqueEnvironmentalOps, unique_environmental);
    fv.set(EnvironmentalComplexity, unique_environmental * environmental_ratio);

    // Specific ops
    let balance = count("BALANCE");
    let caller = count("CALLER");
    let origin = count("ORIGIN");
    let callvalue = count("CALLVALUE");
    let external_dependency = (block_dependent + balance) / total;
    fv.set(BalanceOperations, balance);
    fv.set(AddressOperations, count("ADDRESS"));
    fv.set(CallerOperations, caller);
    fv.set(OriginOperations, origin);
    fv.set(CallvalueOperations, callvalue);
    fv.set(ExternalDependencyIndex, external_dependency);

    // Calldata
    let calldata = count_any(CALLDATA_OPS);
    fv.set(CalldataSizeOps, count("CALLDATASIZE"));
    fv.set(CalldataLoadOps, count("CALLDATALOAD"));
    fv.set(CalldataCopyOps, count("CALLDATACOPY"));
    fv.set(TotalCalldataOps, calldata);
    fv.set(CalldataDensity, calldata / total);

    // External calls
    let external_calls = count_any(EXTERNAL_CALL_OPS);
    fv.set(ExternalCallCount, external_calls);
    fv.set_flag(HasExternalCalls, external_calls > 0.0);
    fv.set(CallValueOps, callvalue);
    fv.set(CallGasLimitOps, count("GAS"));
    fv.set_flag(PotentialReentrancyPattern, patterns.potential_reentrancy);

    // Memory
    if memory_features {
        let reads = count("MLOAD");
        let writes = count_any(&["MSTORE", "MSTORE8"]);
        fv.set(ReadsFromMemory, reads);
        fv.set(WritesToMemory, writes);
        fv.set(MemoryAccessRatio, (reads + writes) / total);
    }

    // Stack
    let pushes = hist.pushes as f64;
    let pops = hist.pops as f64;
    let imbalance = pushes - pops;
    fv.set(Pushes, pushes);
    fv.set(Pops, pops);
    fv.set(StackImbalance, imbalance);
    fv.set(StackOperationsRatio, pops / pushes.max(1.0));
    fv.set_flag(StackUnderflowRisk, imbalance < 0.0);

    // Gas
    let high_gas = hist.fees_above(HIGH_GAS_FEE) as f64;
    fv.set(TotalGasCost, hist.total_fee as f64);
    fv.set(AvgGasPerInstruction, hist.total_fee as f64 / total);
    fv.set(MaxGasInstruction, f64::from(hist.max_fee()));
    fv.set(HighGasInstructions, high_gas);
    fv.set(GasDosRiskIndex, high_gas / total);

    // Arithmetic
    let arithmetic = count_any(ARITHMETIC_OPS);
    fv.set(ArithmeticOpsCount, arithmetic);
    fv.set(ArithmeticDensity, arithmetic / total);
    fv.set_flag(UnsafeArithmeticPattern, patterns.unsafe_arithmetic);

    // Control flow
    let jumpi = count("JUMPI");
    fv.set(ControlFlowOps, count_any(CONTROL_FLOW_OPS));
    fv.set(JumpiCount, jumpi);
    fv.set(ConditionalBranchingRatio, jumpi / (count("JUMP") + jumpi).max(1.0));
    fv.set(ControlFlowComplexity, jumpi * jumpi / total);

    // Access control
    fv.set(CallerBasedChecks, caller);
    fv.set(OriginUsage, origin);
    fv.set(AccessControlRatio, caller / external_calls.max(1.0));
    fv.set_flag(UsesOriginInsteadCaller, origin > caller);

    // Advanced patterns
    let randomness = count_any(RANDOMNESS_OPS);
    fv.set_flag(BalanceBeforeExternalCall, patterns.balance_before_external_call);
    fv.set(RandomnessOpsCount, randomness);
    fv.set_flag(HasBadRandomnessPattern, randomness > 0.0);

    // Complexity
    let dangerous = block_dependent + external_calls + arithmetic + count_any(DANGEROUS_EXTRA_OPS);
    fv.set(DangerousOpsCount, dangerous);
    fv.set(DangerousOpsDensity, dangerous / total);
    fv.set(OpcodeEntropy, if hist.unique() > 1 { hist.entropy() } else { 0.0 });

    fv
}
