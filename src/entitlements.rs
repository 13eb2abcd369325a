use crate::models::Tier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Gated product features. Closed set; the tier -> feature mapping below is
/// the single source of truth for route/feature access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Scheduling,
    FinancialTracking,
    PersonalVault,
    StandardAnalytics,
    BrandingStudio,
    EmployeeManagement,
    AiCoaching,
    OrgVault,
    WhiteLabelComms,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::Scheduling,
        Feature::FinancialTracking,
        Feature::PersonalVault,
        Feature::StandardAnalytics,
        Feature::BrandingStudio,
        Feature::EmployeeManagement,
        Feature::AiCoaching,
        Feature::OrgVault,
        Feature::WhiteLabelComms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Scheduling => "scheduling",
            Feature::FinancialTracking => "financial_tracking",
            Feature::PersonalVault => "personal_vault",
            Feature::StandardAnalytics => "standard_analytics",
            Feature::BrandingStudio => "branding_studio",
            Feature::EmployeeManagement => "employee_management",
            Feature::AiCoaching => "ai_coaching",
            Feature::OrgVault => "org_vault",
            Feature::WhiteLabelComms => "white_label_comms",
        }
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown feature: {}", s))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SOLO_FEATURES: &[Feature] = &[
    Feature::Scheduling,
    Feature::FinancialTracking,
    Feature::PersonalVault,
    Feature::StandardAnalytics,
];

const BUSINESS_FEATURES: &[Feature] = &[
    Feature::Scheduling,
    Feature::FinancialTracking,
    Feature::PersonalVault,
    Feature::StandardAnalytics,
    Feature::BrandingStudio,
    Feature::EmployeeManagement,
    Feature::AiCoaching,
    Feature::OrgVault,
    Feature::WhiteLabelComms,
];

/// The features a tier is entitled to. Monotonic: solo is a strict subset
/// of business, free gets nothing premium.
pub fn feature_set(tier: Tier) -> &'static [Feature] {
    match tier {
        Tier::Free => &[],
        Tier::Solo => SOLO_FEATURES,
        Tier::Business => BUSINESS_FEATURES,
    }
}

/// Access is granted iff the feature is in the tier's feature set.
pub fn allows(tier: Tier, feature: Feature) -> bool {
    feature_set(tier).contains(&feature)
}

/// The cheapest tier that unlocks a feature. Used to pre-select a plan on
/// the upgrade prompt.
pub fn required_tier(feature: Feature) -> Tier {
    if SOLO_FEATURES.contains(&feature) {
        Tier::Solo
    } else {
        Tier::Business
    }
}

/// Upgrade prompt payload. Preserves the originally requested destination
/// so navigation can resume there after an upgrade.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpgradePrompt {
    pub destination: String,
    pub current_tier: Tier,
    pub required_tier: Tier,
}

/// Outcome of a gate check, shaped for the HTTP response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum GateDecision {
    Allowed { allowed: bool },
    Denied { allowed: bool, upgrade: UpgradePrompt },
}

/// Decides access for (tier, feature). On deny, the prompt names the
/// minimum tier and carries the destination to resume at.
pub fn check(tier: Tier, feature: Feature, destination: String) -> GateDecision {
    if allows(tier, feature) {
        GateDecision::Allowed { allowed: true }
    } else {
        GateDecision::Denied {
            allowed: false,
            upgrade: UpgradePrompt {
                destination,
                current_tier: tier,
                required_tier: required_tier(feature),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_has_no_premium_features() {
        for feature in Feature::ALL {
            assert!(!allows(Tier::Free, feature), "free should not get {}", feature);
        }
    }

    #[test]
    fn solo_feature_table_is_exact() {
        let expected = [
            (Feature::Scheduling, true),
            (Feature::FinancialTracking, true),
            (Feature::PersonalVault, true),
            (Feature::StandardAnalytics, true),
            (Feature::BrandingStudio, false),
            (Feature::EmployeeManagement, false),
            (Feature::AiCoaching, false),
            (Feature::OrgVault, false),
            (Feature::WhiteLabelComms, false),
        ];
        for (feature, allowed) in expected {
            assert_eq!(allows(Tier::Solo, feature), allowed, "solo x {}", feature);
        }
    }

    #[test]
    fn business_tier_gets_everything() {
        for feature in Feature::ALL {
            assert!(allows(Tier::Business, feature), "business should get {}", feature);
        }
    }

    #[test]
    fn feature_sets_are_monotonic() {
        for feature in feature_set(Tier::Solo) {
            assert!(
                allows(Tier::Business, *feature),
                "business must include solo feature {}",
                feature
            );
        }
        assert!(feature_set(Tier::Free).len() <= feature_set(Tier::Solo).len());
        assert!(feature_set(Tier::Solo).len() < feature_set(Tier::Business).len());
    }

    #[test]
    fn required_tier_matches_the_mapping() {
        assert_eq!(required_tier(Feature::Scheduling), Tier::Solo);
        assert_eq!(required_tier(Feature::BrandingStudio), Tier::Business);
        for feature in Feature::ALL {
            assert!(allows(required_tier(feature), feature));
        }
    }

    #[test]
    fn denied_check_preserves_destination() {
        let decision = check(
            Tier::Free,
            Feature::Scheduling,
            "/scheduling/week".to_string(),
        );
        match decision {
            GateDecision::Denied { allowed, upgrade } => {
                assert!(!allowed);
                assert_eq!(upgrade.destination, "/scheduling/week");
                assert_eq!(upgrade.current_tier, Tier::Free);
                assert_eq!(upgrade.required_tier, Tier::Solo);
            }
            GateDecision::Allowed { .. } => panic!("expected denial"),
        }
    }

    #[test]
    fn allowed_check_is_plain() {
        let decision = check(Tier::Solo, Feature::Scheduling, "/scheduling".to_string());
        assert_eq!(decision, GateDecision::Allowed { allowed: true });
    }

    #[test]
    fn feature_parses_from_str() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_str(feature.as_str()), Ok(feature));
        }
        assert!(Feature::from_str("time_travel").is_err());
    }
}
