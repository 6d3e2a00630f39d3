//! Composite risk scores and indicator flags.
//!
//! Everything here is a pure function of an already built [`FeatureVector`],
//! so scores can be recomputed from stored vectors at any time.

use serde::Serialize;

use crate::features::{Feature, FeatureVector};

/// Scores strictly above this raise the corresponding indicator.
pub const RISK_SCORE_THRESHOLD: f64 = 0.1;
/// Caller-to-call ratio below which access control is considered weak.
pub const ACCESS_CONTROL_RATIO_FLOOR: f64 = 0.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskIndicators {
    pub reentrancy: bool,
    pub unchecked_external_calls: bool,
    pub arithmetic_vulnerabilities: bool,
    pub access_control_issues: bool,
    pub dos_vulnerabilities: bool,
}

impl RiskIndicators {
    /// Number of raised indicators.
    pub fn raised(&self) -> usize {
        [
            self.reentrancy,
            self.unchecked_external_calls,
            self.arithmetic_vulnerabilities,
            self.access_control_issues,
            self.dos_vulnerabilities,
        ]
        .iter()
        .filter(|&&b| b)
        .count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskScore {
    pub reentrancy: f64,
    pub frontrunning: f64,
    pub dos: f64,
    pub arithmetic: f64,
    pub overall: f64,
    pub indicators: RiskIndicators,
}

impl RiskScore {
    /// Compute scores from the non-score features of `fv`.
    ///
    /// A vector with no instructions scores zero everywhere.
    pub fn from_features(fv: &FeatureVector) -> Self {
        use Feature::*;

        let total = fv[TotalInstructions];
        if total <= 0.0 {
            return Self::default();
        }

        let reentrancy = (fv[ExternalCallCount]
            + fv[CallValueOps]
            + fv[PotentialReentrancyPattern]
            + fv[BalanceBeforeExternalCall])
            / total;
        let frontrunning = (fv[BlockDependentCount]
            + fv[ExternalDependencyIndex]
            + fv[HasBadRandomnessPattern])
            / total;
        let dos = (fv[GasDosRiskIndex]
            + fv[HighGasInstructions]
            + fv[ControlFlowComplexity]
            + fv[StackUnderflowRisk])
            / total;
        let arithmetic =
            (fv[ArithmeticOpsCount] + fv[UnsafeArithmeticPattern] + fv[StackUnderflowRisk]) / total;

        let overall = (reentrancy
            + frontrunning
            + dos
            + arithmetic
            + fv[DangerousOpsDensity]
            + fv[ExternalDependencyIndex])
            / 6.0;

        let indicators = RiskIndicators {
            reentrancy: reentrancy > RISK_SCORE_THRESHOLD,
            unchecked_external_calls: fv[ExternalCallCount] > fv[JumpiCount],
            arithmetic_vulnerabilities: fv[UnsafeArithmeticPattern] > 0.0,
            access_control_issues: fv[AccessControlRatio] < ACCESS_CONTROL_RATIO_FLOOR
                && fv[ExternalCallCount] > 0.0,
            dos_vulnerabilities: dos > RISK_SCORE_THRESHOLD,
        };

        Self {
            reentrancy,
            frontrunning,
            dos,
            arithmetic,
            overall,
            indicators,
        }
    }

    /// Write the scores and indicator flags into `fv`.
    pub fn apply(&self, fv: &mut FeatureVector) {
        use Feature::*;

        fv.set(ReentrancyRiskScore, self.reentrancy);
        fv.set(FrontrunningRiskScore, self.frontrunning);
        fv.set(DosRiskScore, self.dos);
        fv.set(ArithmeticRiskScore, self.arithmetic);
        fv.set(OverallSecurityRiskScore, self.overall);
        fv.set_flag(HasReentrancyIndicators, self.indicators.reentrancy);
        fv.set_flag(HasUncheckedExternalCalls, self.indicators.unchecked_external_calls);
        fv.set_flag(HasArithmeticVulnerabilities, self.indicators.arithmetic_vulnerabilities);
        fv.set_flag(HasAccessControlIssues, self.indicators.access_control_issues);
        fv.set_flag(HasDosVulnerabilities, self.indicators.dos_vulnerabilities);
    }
}
