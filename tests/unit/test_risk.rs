//! Unit tests for the risk module
//!
//! Tests cover:
//! - Level bucketing at the 3 and 6 boundaries
//! - The full impact x likelihood matrix
//! - Factor coercion from untrusted JSON

use serde_json::json;
use threatscope::model::Severity;
use threatscope::risk::{
    factor_from_value, severity_matrix, ImpactFactors, LikelihoodFactors, OwaspRating, RiskLevel,
    RiskRating,
};

// ============================================================================
// Level bucketing
// ============================================================================

mod level_tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(2.99), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(3.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(5.99), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(6.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(9.0), RiskLevel::High);
    }

    #[test]
    fn test_display_is_uppercase() {
        assert_eq!(RiskLevel::Medium.to_string(), "MEDIUM");
    }
}

// ============================================================================
// Severity matrix
// ============================================================================

mod matrix_tests {
    use super::*;

    #[test]
    fn test_every_cell() {
        use RiskLevel::*;
        let expected = [
            (High, High, Severity::Critical),
            (High, Medium, Severity::High),
            (Medium, High, Severity::High),
            (High, Low, Severity::Medium),
            (Medium, Medium, Severity::Medium),
            (Low, High, Severity::Medium),
            (Medium, Low, Severity::Low),
            (Low, Medium, Severity::Low),
            (Low, Low, Severity::Low),
        ];
        for (impact, likelihood, severity) in expected {
            assert_eq!(
                severity_matrix(impact, likelihood).severity(),
                severity,
                "impact {} likelihood {}",
                impact,
                likelihood
            );
        }
    }

    #[test]
    fn test_note_is_reported_as_low() {
        assert_eq!(
            severity_matrix(RiskLevel::Low, RiskLevel::Low),
            OwaspRating::Note
        );
        assert_eq!(OwaspRating::Note.severity(), Severity::Low);
    }
}

// ============================================================================
// RiskRating::compute
// ============================================================================

mod compute_tests {
    use super::*;

    #[test]
    fn test_mixed_factors() {
        let rating = RiskRating::compute(
            LikelihoodFactors::new([6, 7, 7, 6, 6, 6, 6, 6]),
            ImpactFactors::new([7, 6, 5, 5]),
        );
        assert_eq!(rating.likelihood_score, 6.25);
        assert_eq!(rating.impact_score, 5.75);
        assert_eq!(rating.likelihood_level, RiskLevel::High);
        assert_eq!(rating.impact_level, RiskLevel::Medium);
        assert_eq!(rating.severity, Severity::High);
        assert_eq!(rating.overall_risk_score, 35.94);
    }

    #[test]
    fn test_all_zero_is_low() {
        let rating = RiskRating::compute(LikelihoodFactors::uniform(0), ImpactFactors::uniform(0));
        assert_eq!(rating.severity, Severity::Low);
        assert_eq!(rating.overall_risk_score, 0.0);
    }

    #[test]
    fn test_neutral_defaults_are_medium() {
        let rating = RiskRating::compute(LikelihoodFactors::default(), ImpactFactors::default());
        assert_eq!(rating.likelihood_score, 5.0);
        assert_eq!(rating.severity, Severity::Medium);
    }

    #[test]
    fn test_out_of_range_fields_are_clamped() {
        let mut likelihood = LikelihoodFactors::uniform(9);
        likelihood.motive = 200;
        let rating = RiskRating::compute(likelihood, ImpactFactors::uniform(9));
        assert_eq!(rating.likelihood.motive, 9);
        assert_eq!(rating.likelihood_score, 9.0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let rating = RiskRating::compute(LikelihoodFactors::uniform(9), ImpactFactors::uniform(9));
        let value = serde_json::to_value(&rating).unwrap();
        assert_eq!(value["severity"], "Critical");
        assert_eq!(value["likelihoodLevel"], "HIGH");
        assert!(value.get("overallRiskScore").is_some());
    }
}

// ============================================================================
// Factor coercion
// ============================================================================

mod coercion_tests {
    use super::*;

    #[test]
    fn test_numbers_strings_and_garbage() {
        assert_eq!(factor_from_value(Some(&json!(7))), 7);
        assert_eq!(factor_from_value(Some(&json!(6.6))), 7);
        assert_eq!(factor_from_value(Some(&json!("3"))), 3);
        assert_eq!(factor_from_value(Some(&json!(42))), 9);
        assert_eq!(factor_from_value(Some(&json!(-4))), 0);
        assert_eq!(factor_from_value(Some(&json!("high"))), 5);
        assert_eq!(factor_from_value(Some(&json!(null))), 5);
        assert_eq!(factor_from_value(None), 5);
    }

    #[test]
    fn test_snake_and_camel_keys() {
        let likelihood = LikelihoodFactors::from_value(Some(&json!({
            "skill_level": 1,
            "easeOfExploit": 8
        })));
        assert_eq!(likelihood.skill_level, 1);
        assert_eq!(likelihood.ease_of_exploit, 8);
        assert_eq!(likelihood.motive, 5);

        let impact = ImpactFactors::from_value(Some(&json!("not an object")));
        assert_eq!(impact, ImpactFactors::uniform(5));
    }
}
