use crate::models::{
    AppointmentSummary, DepartmentStat, Organization, OrgTotals, Role, StoreScore, WeekdayCount,
};
use bigdecimal::BigDecimal;
use serde::Serialize;

/// Efficiency rating used by the store leaderboard.
///
/// Fixed two-cut classification: score above 90 is excellent, above 80 is
/// good, everything else (80 included) needs review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyTier {
    Excellent,
    Good,
    Review,
}

pub fn classify_efficiency(score: f64) -> EfficiencyTier {
    if score > 90.0 {
        EfficiencyTier::Excellent
    } else if score > 80.0 {
        EfficiencyTier::Good
    } else {
        EfficiencyTier::Review
    }
}

/// One of four mutually exclusive dashboard variants, selected by the
/// viewer's role. Each variant is a pure projection of fetched aggregates;
/// nothing here mutates state.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    Associate(AssociateView),
    DepartmentHead(DepartmentHeadView),
    StoreManager(StoreManagerView),
    Executive(ExecutiveView),
}

impl DashboardView {
    pub fn role(&self) -> Role {
        match self {
            DashboardView::Associate(_) => Role::Associate,
            DashboardView::DepartmentHead(_) => Role::DepartmentHead,
            DashboardView::StoreManager(_) => Role::StoreManager,
            DashboardView::Executive(_) => Role::Executive,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AssociateView {
    pub upcoming_appointments: Vec<AppointmentSummary>,
    pub completed_this_month: i64,
    pub booked_this_month: i64,
    /// completed / booked, as a whole percentage.
    pub utilization_percent: u8,
}

#[derive(Debug, Serialize)]
pub struct DepartmentHeadView {
    pub departments: Vec<DepartmentStat>,
    pub total_headcount: i64,
    /// Chart series: appointments per weekday (0 = Sunday).
    pub appointments_by_weekday: Vec<WeekdayCount>,
    pub busiest_weekday: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    pub store_name: String,
    pub efficiency_score: f64,
    pub revenue_display: String,
    pub rating: EfficiencyTier,
}

#[derive(Debug, Serialize)]
pub struct StoreManagerView {
    /// Stores ordered by efficiency score, best first.
    pub leaderboard: Vec<LeaderboardEntry>,
    /// Stores rated good or excellent.
    pub stores_above_target: usize,
}

#[derive(Debug, Serialize)]
pub struct ExecutiveView {
    pub total_revenue_display: String,
    pub appointment_count: i64,
    pub active_staff: i64,
    pub tier: String,
    pub subscription_status: String,
}

pub fn associate_view(
    upcoming_appointments: Vec<AppointmentSummary>,
    completed_this_month: i64,
    booked_this_month: i64,
) -> AssociateView {
    let utilization_percent = if booked_this_month > 0 {
        ((completed_this_month * 100) / booked_this_month).clamp(0, 100) as u8
    } else {
        0
    };
    AssociateView {
        upcoming_appointments,
        completed_this_month,
        booked_this_month,
        utilization_percent,
    }
}

pub fn department_head_view(
    departments: Vec<DepartmentStat>,
    appointments_by_weekday: Vec<WeekdayCount>,
) -> DepartmentHeadView {
    let total_headcount = departments.iter().map(|d| d.headcount).sum();
    let busiest_weekday = appointments_by_weekday
        .iter()
        .max_by_key(|w| w.appointments)
        .map(|w| w.weekday);
    DepartmentHeadView {
        departments,
        total_headcount,
        appointments_by_weekday,
        busiest_weekday,
    }
}

pub fn store_manager_view(mut scores: Vec<StoreScore>) -> StoreManagerView {
    scores.sort_by(|a, b| {
        b.efficiency_score
            .partial_cmp(&a.efficiency_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let leaderboard: Vec<LeaderboardEntry> = scores
        .into_iter()
        .map(|store| LeaderboardEntry {
            rating: classify_efficiency(store.efficiency_score),
            revenue_display: money_display(&store.revenue),
            store_name: store.store_name,
            efficiency_score: store.efficiency_score,
        })
        .collect();

    let stores_above_target = leaderboard
        .iter()
        .filter(|entry| entry.rating != EfficiencyTier::Review)
        .count();

    StoreManagerView {
        leaderboard,
        stores_above_target,
    }
}

pub fn executive_view(totals: OrgTotals, organization: &Organization) -> ExecutiveView {
    let revenue = totals.total_revenue.unwrap_or_else(|| BigDecimal::from(0));
    ExecutiveView {
        total_revenue_display: money_display(&revenue),
        appointment_count: totals.appointment_count,
        active_staff: totals.active_staff,
        tier: organization.tier.clone(),
        subscription_status: organization.subscription_status.clone(),
    }
}

/// Display formatting only; aggregation happens in SQL.
fn money_display(amount: &BigDecimal) -> String {
    format!("${}", amount.with_scale(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    #[test]
    fn efficiency_boundaries_match_the_contract() {
        assert_eq!(classify_efficiency(91.0), EfficiencyTier::Excellent);
        assert_eq!(classify_efficiency(85.0), EfficiencyTier::Good);
        // Boundary at exactly 80 is exclusive
        assert_eq!(classify_efficiency(80.0), EfficiencyTier::Review);
        // And so is 90
        assert_eq!(classify_efficiency(90.0), EfficiencyTier::Good);
        assert_eq!(classify_efficiency(12.5), EfficiencyTier::Review);
    }

    #[test]
    fn leaderboard_sorts_best_first_and_counts_target() {
        let scores = vec![
            StoreScore {
                store_name: "Downtown".to_string(),
                efficiency_score: 78.0,
                revenue: BigDecimal::from_str("1000").unwrap(),
            },
            StoreScore {
                store_name: "Uptown".to_string(),
                efficiency_score: 93.5,
                revenue: BigDecimal::from_str("2200.5").unwrap(),
            },
            StoreScore {
                store_name: "Midtown".to_string(),
                efficiency_score: 85.0,
                revenue: BigDecimal::from_str("1800").unwrap(),
            },
        ];

        let view = store_manager_view(scores);
        let names: Vec<&str> = view
            .leaderboard
            .iter()
            .map(|e| e.store_name.as_str())
            .collect();
        assert_eq!(names, vec!["Uptown", "Midtown", "Downtown"]);
        assert_eq!(view.leaderboard[0].rating, EfficiencyTier::Excellent);
        assert_eq!(view.leaderboard[1].rating, EfficiencyTier::Good);
        assert_eq!(view.leaderboard[2].rating, EfficiencyTier::Review);
        assert_eq!(view.stores_above_target, 2);
        assert_eq!(view.leaderboard[1].revenue_display, "$1800.00");
    }

    #[test]
    fn associate_utilization_handles_empty_month() {
        let view = associate_view(Vec::new(), 0, 0);
        assert_eq!(view.utilization_percent, 0);

        let view = associate_view(Vec::new(), 3, 4);
        assert_eq!(view.utilization_percent, 75);
    }

    #[test]
    fn department_head_view_finds_busiest_weekday() {
        let stats = vec![
            DepartmentStat {
                department: "Color".to_string(),
                headcount: 4,
                appointments: 31,
            },
            DepartmentStat {
                department: "Cuts".to_string(),
                headcount: 6,
                appointments: 52,
            },
        ];
        let weekdays = vec![
            WeekdayCount {
                weekday: 1,
                appointments: 10,
            },
            WeekdayCount {
                weekday: 5,
                appointments: 24,
            },
        ];

        let view = department_head_view(stats, weekdays);
        assert_eq!(view.total_headcount, 10);
        assert_eq!(view.busiest_weekday, Some(5));
    }

    #[test]
    fn executive_view_defaults_missing_revenue_to_zero() {
        let organization = Organization {
            id: uuid::Uuid::new_v4(),
            name: "Shear Genius".to_string(),
            billing_customer_id: None,
            tier: "business".to_string(),
            subscription_status: "active".to_string(),
            current_period_end: None,
            onboarding: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: None,
        };
        let totals = OrgTotals {
            total_revenue: None,
            appointment_count: 12,
            active_staff: 5,
        };

        let view = executive_view(totals, &organization);
        assert_eq!(view.total_revenue_display, "$0.00");
        assert_eq!(view.tier, "business");
    }
}
