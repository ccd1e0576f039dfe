//! Monthly trend lines for the dashboard.

use chrono::{Datelike, Months, NaiveDate};
use common::MonthPoint;
use model::entities::tehsil_activity;
use sea_orm::{ColumnTrait, Condition};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::schedule::{ScheduleStatus, StatusEvaluator};

/// Which population of tehsil activities a trend line counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendKind {
    #[default]
    Scheduled,
    Unassigned,
    Performed,
    #[serde(alias = "unPerformed")]
    Unperformed,
    Pending,
}

impl TrendKind {
    pub fn label(&self) -> &'static str {
        match self {
            TrendKind::Scheduled => "Scheduled",
            TrendKind::Unassigned => "Unassigned",
            TrendKind::Performed => "Performed",
            TrendKind::Unperformed => "UnPerformed",
            TrendKind::Pending => "Pending",
        }
    }

    /// Performed rows are bucketed by when they were performed, all others by creation.
    pub fn bucketed_by_performance(&self) -> bool {
        matches!(self, TrendKind::Performed)
    }

    pub fn condition(&self, evaluator: &StatusEvaluator) -> Condition {
        match self {
            TrendKind::Scheduled => Condition::all(),
            TrendKind::Unassigned => evaluator.status_condition(ScheduleStatus::Unassigned),
            TrendKind::Performed => evaluator.status_condition(ScheduleStatus::Performed),
            TrendKind::Unperformed => {
                Condition::all().add(tehsil_activity::Column::IsPerformed.eq(false))
            }
            TrendKind::Pending => evaluator.status_condition(ScheduleStatus::Pending),
        }
    }
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    (first, last)
}

/// The `months` calendar months ending with the month of `today`, oldest first.
pub fn trailing_months(today: NaiveDate, months: u32) -> Vec<(i32, u32)> {
    let (first, _) = month_bounds(today);
    (0..months)
        .rev()
        .filter_map(|back| first.checked_sub_months(Months::new(back)))
        .map(|d| (d.year(), d.month()))
        .collect()
}

/// Counts `dates` into the trailing months. Dates outside the range are ignored.
pub fn monthly_buckets(
    today: NaiveDate,
    months: u32,
    dates: impl IntoIterator<Item = NaiveDate>,
) -> Vec<MonthPoint> {
    let mut points: Vec<MonthPoint> = trailing_months(today, months)
        .into_iter()
        .map(|(year, month)| MonthPoint {
            year,
            month,
            label: NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| d.format("%b %Y").to_string())
                .unwrap_or_default(),
            count: 0,
        })
        .collect();

    for date in dates {
        if let Some(point) = points
            .iter_mut()
            .find(|p| p.year == date.year() && p.month == date.month())
        {
            point.count += 1;
        }
    }
    points
}
