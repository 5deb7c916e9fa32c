//! Practice feature policy.
//!
//! Feature flags are a pure function of the practice type. They are never
//! stored; every load or save of practice settings recomputes them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::PracticeType;

/// A capability gated by practice type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    FamilyManagement,
    DepartmentManagement,
    AdvancedLabIntegration,
    MultiProviderSupport,
    ComplexCaseManagement,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::FamilyManagement,
        Feature::DepartmentManagement,
        Feature::AdvancedLabIntegration,
        Feature::MultiProviderSupport,
        Feature::ComplexCaseManagement,
    ];
}

/// Enabled-feature set. `Default` is everything off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePolicy {
    pub family_management: bool,
    pub department_management: bool,
    pub advanced_lab_integration: bool,
    pub multi_provider_support: bool,
    pub complex_case_management: bool,
}

impl FeaturePolicy {
    pub fn for_practice_type(practice_type: PracticeType) -> Self {
        match practice_type {
            PracticeType::Individual => Self::default(),
            PracticeType::FamilyPractice => Self {
                family_management: true,
                department_management: false,
                advanced_lab_integration: true,
                multi_provider_support: true,
                complex_case_management: false,
            },
            PracticeType::Hospital => Self {
                family_management: true,
                department_management: true,
                advanced_lab_integration: true,
                multi_provider_support: true,
                complex_case_management: true,
            },
        }
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::FamilyManagement => self.family_management,
            Feature::DepartmentManagement => self.department_management,
            Feature::AdvancedLabIntegration => self.advanced_lab_integration,
            Feature::MultiProviderSupport => self.multi_provider_support,
            Feature::ComplexCaseManagement => self.complex_case_management,
        }
    }

    pub fn enabled(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|feature| self.is_enabled(*feature))
            .collect()
    }
}

/// Resolve the feature set for a raw practice-type value.
///
/// Total: an unrecognized value resolves to the all-off default.
pub fn resolve_features(practice_type: &str) -> FeaturePolicy {
    PracticeType::from_str(practice_type)
        .map(FeaturePolicy::for_practice_type)
        .unwrap_or_default()
}
