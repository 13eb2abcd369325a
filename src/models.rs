use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Subscription tiers & staff roles ============

/// Subscription tier of an organization.
///
/// Closed set; feature access is derived from it in `entitlements`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Solo,
    Business,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Solo => "solo",
            Tier::Business => "business",
        }
    }

    /// Parses a tier stored in the database.
    ///
    /// Rows written before a tier existed (or hand-edited ones) fall back to
    /// `free`, the tier with no premium access.
    pub fn from_db(value: &str) -> Tier {
        match Tier::from_str(value) {
            Ok(tier) => tier,
            Err(_) => {
                tracing::warn!("Unknown tier '{}' in storage, treating as free", value);
                Tier::Free
            }
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "solo" => Ok(Tier::Solo),
            "business" => Ok(Tier::Business),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staff role within an organization. Selects the dashboard variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Associate,
    DepartmentHead,
    StoreManager,
    Executive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Associate => "associate",
            Role::DepartmentHead => "department_head",
            Role::StoreManager => "store_manager",
            Role::Executive => "executive",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "associate" => Ok(Role::Associate),
            "department_head" => Ok(Role::DepartmentHead),
            "store_manager" => Ok(Role::StoreManager),
            "executive" => Ok(Role::Executive),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription statuses this service assigns itself. The webhook sync
/// stores whatever status string the billing provider reports, verbatim;
/// these are only the values we originate or branch on.
pub mod subscription_status {
    pub const ACTIVE: &str = "active";
    pub const PAST_DUE: &str = "past_due";
    pub const CANCELED: &str = "canceled";
    /// Assigned at onboarding, before the first billing event arrives.
    pub const PENDING: &str = "pending";
}

// ============ Onboarding intake enums ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMethod {
    OnlineBooking,
    Phone,
    WalkIn,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPreference {
    Track,
    Skip,
}

/// Document storage needs. `None` is mutually exclusive with the rest;
/// the toggle helper in `onboarding` maintains that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStorage {
    None,
    Contracts,
    Certifications,
    Insurance,
    HrRecords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceTracking {
    Yes,
    YesWithAlerts,
    No,
}

impl ComplianceTracking {
    /// Affirmative answers are the ones that can carry an expiration-alert
    /// lead time.
    pub fn is_affirmative(&self) -> bool {
        matches!(self, ComplianceTracking::Yes | ComplianceTracking::YesWithAlerts)
    }
}

/// Compliance answer and its optional expiration-alert lead time, merged as
/// one unit so a step update can both set and clear the lead time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceAnswer {
    pub tracking: ComplianceTracking,
    /// Days of lead time before a document expires. Only meaningful for
    /// affirmative tracking answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_alert_days: Option<u16>,
}

impl ComplianceAnswer {
    /// Builds a consistent answer: a negative answer drops any lead time.
    pub fn new(tracking: ComplianceTracking, expiration_alert_days: Option<u16>) -> Self {
        let expiration_alert_days = if tracking.is_affirmative() {
            expiration_alert_days
        } else {
            None
        };
        Self {
            tracking,
            expiration_alert_days,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.tracking.is_affirmative() || self.expiration_alert_days.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayrollMethod {
    Manual,
    Software,
    Outsourced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxFilingHelp {
    Yes,
    No,
    Undecided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingInterest {
    Revenue,
    Expenses,
    PayrollCosts,
    Taxes,
    ProfitLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountingIntegration {
    None,
    Quickbooks,
    Xero,
    Other,
}

/// One organization's intake answers, accumulated across the wizard steps.
///
/// Every field is optional because the record starts empty and fills in one
/// field group per step. A value doubles as the partial-update payload: a
/// `Some` field in an update replaces the current value wholesale, `None`
/// leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    // Business basics
    pub business_name: Option<String>,
    pub industry: Option<String>,
    // Address
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    // Staffing; roles are only meaningful when the selected tier != free
    pub employee_count: Option<u32>,
    pub roles: Option<Vec<String>>,
    pub scheduling_method: Option<SchedulingMethod>,
    pub inventory_tracking: Option<InventoryPreference>,
    pub document_storage: Option<Vec<DocumentStorage>>,
    pub compliance: Option<ComplianceAnswer>,
    pub payroll_method: Option<PayrollMethod>,
    pub tax_filing_help: Option<TaxFilingHelp>,
    pub reporting_interests: Option<Vec<ReportingInterest>>,
    pub accounting_integration: Option<AccountingIntegration>,
    pub priority_features: Option<Vec<String>>,
    pub tier: Option<Tier>,
}

// ============ Database models ============

/// Tenant record. Owns staff profiles and the submitted onboarding record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Customer reference at the billing provider; set once checkout ran.
    pub billing_customer_id: Option<String>,
    pub tier: String,
    /// Provider-reported status, stored verbatim.
    pub subscription_status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    /// Immutable onboarding record as submitted (JSONB).
    pub onboarding: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Staff member identity within exactly one organization.
///
/// The row itself is provisioned by the hosted-auth signup trigger; the
/// invite operation only attaches it to an organization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: String,
    pub department: Option<String>,
    pub phone: Option<String>,
    /// Opaque session token mirrored from the hosted auth service.
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Dashboard aggregate rows ============

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppointmentSummary {
    pub client_name: String,
    pub service_name: String,
    pub starts_at: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DepartmentStat {
    pub department: String,
    pub headcount: i64,
    pub appointments: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WeekdayCount {
    pub weekday: i32,
    pub appointments: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct StoreScore {
    pub store_name: String,
    pub efficiency_score: f64,
    pub revenue: BigDecimal,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrgTotals {
    pub total_revenue: Option<BigDecimal>,
    pub appointment_count: i64,
    pub active_staff: i64,
}

// ============ API request/response models ============

/// Request payload for the staff invitation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct InviteRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub department: Option<String>,
    pub phone: Option<String>,
    pub org_id: Uuid,
}

/// Invitation response. The endpoint intentionally answers 200 for business
/// failures as well; `success` carries the real outcome.
#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Booking notification request; never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingNotificationRequest {
    pub phone: String,
    pub client_name: String,
    pub employee_name: String,
    pub status: String,
    pub date_time: String,
    pub service_name: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub success: bool,
    /// True when credentials were absent and the send was skipped on purpose.
    pub skipped: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionRequest {
    pub org_id: Uuid,
    pub tier: Tier,
}

#[derive(Debug, Deserialize)]
pub struct PortalSessionRequest {
    pub org_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    #[serde(flatten)]
    pub organization: Organization,
    pub staff_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_round_trips_through_str() {
        for tier in [Tier::Free, Tier::Solo, Tier::Business] {
            assert_eq!(Tier::from_str(tier.as_str()), Ok(tier));
        }
        assert!(Tier::from_str("enterprise").is_err());
    }

    #[test]
    fn unknown_stored_tier_falls_back_to_free() {
        assert_eq!(Tier::from_db("premium"), Tier::Free);
        assert_eq!(Tier::from_db("business"), Tier::Business);
    }

    #[test]
    fn role_parses_all_variants() {
        for role in [
            Role::Associate,
            Role::DepartmentHead,
            Role::StoreManager,
            Role::Executive,
        ] {
            assert_eq!(Role::from_str(role.as_str()), Ok(role));
        }
        assert!(Role::from_str("owner").is_err());
    }

    #[test]
    fn negative_compliance_answer_drops_lead_time() {
        let answer = ComplianceAnswer::new(ComplianceTracking::No, Some(30));
        assert_eq!(answer.expiration_alert_days, None);
        assert!(answer.is_consistent());

        let answer = ComplianceAnswer::new(ComplianceTracking::YesWithAlerts, Some(30));
        assert_eq!(answer.expiration_alert_days, Some(30));
    }

    #[test]
    fn onboarding_record_serializes_snake_case_enums() {
        let record = OnboardingRecord {
            scheduling_method: Some(SchedulingMethod::OnlineBooking),
            tier: Some(Tier::Business),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["scheduling_method"], "online_booking");
        assert_eq!(value["tier"], "business");
    }
}
