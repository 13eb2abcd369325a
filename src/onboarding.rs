use crate::models::{
    ComplianceAnswer, ComplianceTracking, DocumentStorage, OnboardingRecord, ReportingInterest,
    Tier,
};
use serde::{Deserialize, Serialize};

/// Wizard step layout. One field group per step, review last.
///
/// 0 business basics, 1 address, 2 staffing, 3 scheduling, 4 inventory,
/// 5 document storage, 6 compliance, 7 payroll, 8 tax filing,
/// 9 reporting interests, 10 accounting integration, 11 priority features,
/// 12 plan selection, 13 review & submit.
pub const REVIEW_STEP: usize = 13;
pub const STEP_COUNT: usize = REVIEW_STEP + 1;

/// Tagged wizard action. The reducer is the only thing that mutates wizard
/// state; there is no ambient shared state behind it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardAction {
    /// Shallow-merge a partial record: present fields replace wholesale,
    /// absent fields stay untouched.
    Update { data: OnboardingRecord },
    /// Advance one step. Gated by the current step's validity and clamped
    /// at the review step.
    Next,
    /// Go back one step. Never gated by validity; saturates at zero.
    Prev,
    /// Toggle one document-storage option, preserving the `none`
    /// exclusivity invariant.
    ToggleDocumentStorage { option: DocumentStorage },
    /// Toggle one financial-reporting interest.
    ToggleReportingInterest { option: ReportingInterest },
    /// Set the compliance answer; a negative answer drops the alert lead
    /// time so the record can never carry a dangling one.
    SetCompliance {
        tracking: ComplianceTracking,
        expiration_alert_days: Option<u16>,
    },
}

/// Accumulating wizard state: the record under construction plus the step
/// index. Persisted as a draft row between requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    pub record: OnboardingRecord,
    pub step: usize,
}

impl WizardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one action and returns the (possibly unchanged) state.
    pub fn apply(&mut self, action: WizardAction) {
        match action {
            WizardAction::Update { data } => merge(&mut self.record, data),
            WizardAction::Next => {
                if self.step < REVIEW_STEP && is_step_valid(&self.record, self.step) {
                    self.step += 1;
                }
            }
            WizardAction::Prev => {
                self.step = self.step.saturating_sub(1);
            }
            WizardAction::ToggleDocumentStorage { option } => {
                let current = self.record.document_storage.as_deref().unwrap_or(&[]);
                let next = toggle_document_storage(current, option);
                merge(
                    &mut self.record,
                    OnboardingRecord {
                        document_storage: Some(next),
                        ..Default::default()
                    },
                );
            }
            WizardAction::ToggleReportingInterest { option } => {
                let current = self.record.reporting_interests.as_deref().unwrap_or(&[]);
                let next = toggle_reporting_interest(current, option);
                merge(
                    &mut self.record,
                    OnboardingRecord {
                        reporting_interests: Some(next),
                        ..Default::default()
                    },
                );
            }
            WizardAction::SetCompliance {
                tracking,
                expiration_alert_days,
            } => {
                merge(
                    &mut self.record,
                    OnboardingRecord {
                        compliance: Some(ComplianceAnswer::new(tracking, expiration_alert_days)),
                        ..Default::default()
                    },
                );
            }
        }
    }

    /// Whether the step currently shown is complete enough to leave forward.
    pub fn current_step_valid(&self) -> bool {
        is_step_valid(&self.record, self.step)
    }

    /// Whether the accumulated record can be submitted.
    pub fn is_submittable(&self) -> bool {
        validation_errors(&self.record).is_empty()
    }
}

/// Shallow merge: every `Some` field of `update` replaces the current value
/// wholesale (arrays included), `None` fields are untouched. Last writer
/// wins per field.
pub fn merge(current: &mut OnboardingRecord, update: OnboardingRecord) {
    macro_rules! take_present {
        ($($field:ident),* $(,)?) => {
            $(
                if update.$field.is_some() {
                    current.$field = update.$field;
                }
            )*
        };
    }
    take_present!(
        business_name,
        industry,
        street,
        city,
        state,
        postal_code,
        employee_count,
        roles,
        scheduling_method,
        inventory_tracking,
        document_storage,
        compliance,
        payroll_method,
        tax_filing_help,
        reporting_interests,
        accounting_integration,
        priority_features,
        tier,
    );
}

/// Computes the document-storage set after toggling `option`.
///
/// Selecting `none` clears everything else; selecting a concrete option
/// clears `none`. Toggling an already-selected option removes it.
pub fn toggle_document_storage(
    current: &[DocumentStorage],
    option: DocumentStorage,
) -> Vec<DocumentStorage> {
    if current.contains(&option) {
        return current.iter().copied().filter(|o| *o != option).collect();
    }
    match option {
        DocumentStorage::None => vec![DocumentStorage::None],
        other => {
            let mut next: Vec<DocumentStorage> = current
                .iter()
                .copied()
                .filter(|o| *o != DocumentStorage::None)
                .collect();
            next.push(other);
            next
        }
    }
}

/// Plain membership toggle for reporting interests.
pub fn toggle_reporting_interest(
    current: &[ReportingInterest],
    option: ReportingInterest,
) -> Vec<ReportingInterest> {
    if current.contains(&option) {
        current.iter().copied().filter(|o| *o != option).collect()
    } else {
        let mut next = current.to_vec();
        next.push(option);
        next
    }
}

/// `none` may not coexist with any other storage option.
pub fn document_storage_is_consistent(set: &[DocumentStorage]) -> bool {
    !(set.contains(&DocumentStorage::None) && set.len() > 1)
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Per-step completeness check. Gates forward navigation only; backward
/// navigation never consults it.
pub fn is_step_valid(record: &OnboardingRecord, step: usize) -> bool {
    match step {
        0 => present(&record.business_name) && present(&record.industry),
        1 => {
            present(&record.street)
                && present(&record.city)
                && present(&record.state)
                && present(&record.postal_code)
        }
        2 => record.employee_count.map(|n| n > 0).unwrap_or(false),
        3 => record.scheduling_method.is_some(),
        // Inventory tracking is an optional preference
        4 => true,
        5 => record
            .document_storage
            .as_deref()
            .map(|set| !set.is_empty() && document_storage_is_consistent(set))
            .unwrap_or(false),
        6 => record
            .compliance
            .map(|answer| answer.is_consistent())
            .unwrap_or(false),
        7 => record.payroll_method.is_some(),
        8 => record.tax_filing_help.is_some(),
        9 => record.reporting_interests.is_some(),
        10 => record.accounting_integration.is_some(),
        11 => record.priority_features.is_some(),
        12 => record.tier.is_some(),
        _ => true,
    }
}

/// Everything still missing or inconsistent, phrased for the review screen.
pub fn validation_errors(record: &OnboardingRecord) -> Vec<String> {
    let mut errors = Vec::new();

    if !present(&record.business_name) {
        errors.push("business name is required".to_string());
    }
    if !present(&record.industry) {
        errors.push("industry is required".to_string());
    }
    if !(present(&record.street)
        && present(&record.city)
        && present(&record.state)
        && present(&record.postal_code))
    {
        errors.push("complete business address is required".to_string());
    }
    if record.employee_count.map(|n| n == 0).unwrap_or(true) {
        errors.push("employee count is required".to_string());
    }
    if record.scheduling_method.is_none() {
        errors.push("scheduling method is required".to_string());
    }
    match record.document_storage.as_deref() {
        None => errors.push("document storage selection is required".to_string()),
        Some(set) if set.is_empty() => {
            errors.push("document storage selection is required".to_string())
        }
        Some(set) if !document_storage_is_consistent(set) => {
            errors.push("'none' excludes other document storage options".to_string())
        }
        Some(_) => {}
    }
    match record.compliance {
        None => errors.push("compliance tracking answer is required".to_string()),
        Some(answer) if !answer.is_consistent() => {
            errors.push("expiration alerts require an affirmative compliance answer".to_string())
        }
        Some(_) => {}
    }
    if record.payroll_method.is_none() {
        errors.push("payroll method is required".to_string());
    }
    if record.tax_filing_help.is_none() {
        errors.push("tax filing preference is required".to_string());
    }
    if record.reporting_interests.is_none() {
        errors.push("financial reporting interests are required".to_string());
    }
    if record.accounting_integration.is_none() {
        errors.push("accounting integration choice is required".to_string());
    }
    if record.priority_features.is_none() {
        errors.push("priority features are required".to_string());
    }
    match record.tier {
        None => errors.push("a plan must be selected".to_string()),
        // Staff roles only carry meaning on paid plans
        Some(Tier::Free) => {}
        Some(_) => {
            if record.roles.as_deref().map(|r| r.is_empty()).unwrap_or(true) {
                errors.push("paid plans require at least one staff role".to_string());
            }
        }
    }

    errors
}
