/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use proptest::prelude::*;
use workforce_api::dashboard::{classify_efficiency, EfficiencyTier};
use workforce_api::entitlements::{allows, feature_set, required_tier, Feature};
use workforce_api::models::{DocumentStorage, OnboardingRecord, Tier};
use workforce_api::onboarding::{
    document_storage_is_consistent, merge, toggle_document_storage, WizardAction, WizardState,
    REVIEW_STEP, STEP_COUNT,
};
use workforce_api::sms_client::normalize_recipient;

fn arb_tier() -> impl Strategy<Value = Tier> {
    prop::sample::select(vec![Tier::Free, Tier::Solo, Tier::Business])
}

fn arb_feature() -> impl Strategy<Value = Feature> {
    prop::sample::select(Feature::ALL.to_vec())
}

fn arb_storage_option() -> impl Strategy<Value = DocumentStorage> {
    prop::sample::select(vec![
        DocumentStorage::None,
        DocumentStorage::Contracts,
        DocumentStorage::Certifications,
        DocumentStorage::Insurance,
        DocumentStorage::HrRecords,
    ])
}

/// A partial update touching a representative subset of the record's fields.
fn arb_partial_update() -> impl Strategy<Value = OnboardingRecord> {
    (
        prop::option::of("[a-z]{1,12}"),
        prop::option::of("[a-z]{1,12}"),
        prop::option::of(1u32..200),
        prop::option::of(prop::collection::vec("[a-z]{1,8}", 0..4)),
        prop::option::of(arb_tier()),
    )
        .prop_map(|(business_name, industry, employee_count, roles, tier)| {
            OnboardingRecord {
                business_name,
                industry,
                employee_count,
                roles,
                tier,
                ..Default::default()
            }
        })
}

// Property: the reducer's final record equals the left-fold shallow merge
// of all partial updates in call order
proptest! {
    #[test]
    fn reducer_equals_left_fold_merge(updates in prop::collection::vec(arb_partial_update(), 0..12)) {
        let mut state = WizardState::new();
        for update in updates.clone() {
            state.apply(WizardAction::Update { data: update });
        }

        let mut folded = OnboardingRecord::default();
        for update in updates {
            merge(&mut folded, update);
        }

        prop_assert_eq!(state.record, folded);
    }

    #[test]
    fn merge_never_erases_fields(first in arb_partial_update(), second in arb_partial_update()) {
        let mut record = OnboardingRecord::default();
        merge(&mut record, first.clone());
        merge(&mut record, second.clone());

        // A field set by the first update survives unless the second update
        // replaced it
        if first.business_name.is_some() {
            prop_assert!(record.business_name.is_some());
        }
        if second.employee_count.is_some() {
            prop_assert_eq!(record.employee_count, second.employee_count);
        }
    }
}

// Property: step navigation stays within [0, REVIEW_STEP]
proptest! {
    #[test]
    fn navigation_stays_in_bounds(moves in prop::collection::vec(prop::bool::ANY, 0..60)) {
        let mut state = WizardState::new();
        for forward in moves {
            if forward {
                state.apply(WizardAction::Next);
            } else {
                state.apply(WizardAction::Prev);
            }
            prop_assert!(state.step <= REVIEW_STEP);
            prop_assert!(state.step < STEP_COUNT);
        }
    }
}

// Property: the document-storage toggle can never produce an inconsistent set
proptest! {
    #[test]
    fn toggling_storage_preserves_exclusivity(toggles in prop::collection::vec(arb_storage_option(), 0..20)) {
        let mut set: Vec<DocumentStorage> = Vec::new();
        for option in toggles {
            set = toggle_document_storage(&set, option);
            prop_assert!(document_storage_is_consistent(&set), "inconsistent set: {:?}", set);
        }
    }
}

// Property: entitlements are monotonic across tiers
proptest! {
    #[test]
    fn solo_features_are_a_subset_of_business(feature in arb_feature()) {
        if allows(Tier::Solo, feature) {
            prop_assert!(allows(Tier::Business, feature));
        }
    }

    #[test]
    fn free_tier_never_allows_anything(feature in arb_feature()) {
        prop_assert!(!allows(Tier::Free, feature));
    }

    #[test]
    fn access_matches_feature_set_membership(tier in arb_tier(), feature in arb_feature()) {
        prop_assert_eq!(allows(tier, feature), feature_set(tier).contains(&feature));
    }

    #[test]
    fn required_tier_is_the_cheapest_unlocking_tier(feature in arb_feature()) {
        let tier = required_tier(feature);
        prop_assert!(allows(tier, feature));
        if tier == Tier::Business {
            prop_assert!(!allows(Tier::Solo, feature));
        }
    }
}

// Property: efficiency classification is the fixed two-cut split
proptest! {
    #[test]
    fn classification_matches_cuts(score in 0.0f64..130.0) {
        let expected = if score > 90.0 {
            EfficiencyTier::Excellent
        } else if score > 80.0 {
            EfficiencyTier::Good
        } else {
            EfficiencyTier::Review
        };
        prop_assert_eq!(classify_efficiency(score), expected);
    }

    #[test]
    fn classification_is_monotone(a in 0.0f64..130.0, b in 0.0f64..130.0) {
        // A higher score can never get a worse rating
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let rank = |tier: EfficiencyTier| match tier {
            EfficiencyTier::Review => 0,
            EfficiencyTier::Good => 1,
            EfficiencyTier::Excellent => 2,
        };
        prop_assert!(rank(classify_efficiency(high)) >= rank(classify_efficiency(low)));
    }
}

// Property: phone normalization should never panic
proptest! {
    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*") {
        let _ = normalize_recipient(&phone);
    }

    #[test]
    fn normalized_numbers_are_e164(digits in "[2-9][0-9]{9}") {
        if let Some(normalized) = normalize_recipient(&digits) {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}
