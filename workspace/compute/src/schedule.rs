//! Status derivation for scheduled activities.
//!
//! Every status is a pure function of the schedule window, the
//! assigned/performed flags and "today". The same rules are exposed as SQL
//! conditions for listings, dashboard counts and trend lines, so that the
//! database and the evaluator never disagree.

use chrono::NaiveDate;
use model::entities::{district_activity, tehsil_activity};
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use tracing::trace;
use utoipa::ToSchema;

use crate::error::{ComputeError, Result};

/// A closed date range `[from, to]` with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleWindow {
    from: NaiveDate,
    to: NaiveDate,
}

impl ScheduleWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(ComputeError::InvalidWindow { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }

    pub fn overlaps(&self, other: &ScheduleWindow) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Stored rows are validated on write; tolerate swapped dates from legacy data.
    fn stored(a: NaiveDate, b: NaiveDate) -> Self {
        Self {
            from: a.min(b),
            to: a.max(b),
        }
    }
}

/// The inputs status derivation needs from a schedule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleFacts {
    pub window: Option<ScheduleWindow>,
    pub is_assigned: bool,
    pub is_performed: bool,
}

impl ScheduleFacts {
    /// Facts for a tehsil instance. Its own window wins when both of its
    /// dates are set, otherwise the parent's whole window applies.
    pub fn for_tehsil_activity(
        row: &tehsil_activity::Model,
        parent: Option<&district_activity::Model>,
    ) -> Self {
        let own = match (row.from_date, row.to_date) {
            (Some(from), Some(to)) => Some(ScheduleWindow::stored(from, to)),
            _ => None,
        };
        let window = own.or_else(|| parent.map(|p| ScheduleWindow::stored(p.from_date, p.to_date)));
        Self {
            window,
            is_assigned: row.is_assigned,
            is_performed: row.is_performed,
        }
    }

    /// Facts for the district-level schedule itself, which is always assigned
    /// to its district and never performed on its own.
    pub fn for_district_activity(row: &district_activity::Model) -> Self {
        Self {
            window: Some(ScheduleWindow::stored(row.from_date, row.to_date)),
            is_assigned: true,
            is_performed: false,
        }
    }
}

/// Derived lifecycle status of a schedule row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Unassigned,
    Upcoming,
    Pending,
    Performed,
    Expired,
}

/// Why an activity cannot be performed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformBlock {
    NotAssigned,
    NotStarted,
    Expired,
}

impl PerformBlock {
    pub fn message(&self) -> &'static str {
        match self {
            PerformBlock::NotAssigned => "Activity has not been assigned yet.",
            PerformBlock::NotStarted => "Schedule is not started yet.",
            PerformBlock::Expired => "Schedule has been expired.",
        }
    }
}

/// Evaluates schedule status relative to a fixed "today".
#[derive(Debug, Clone, Copy)]
pub struct StatusEvaluator {
    today: NaiveDate,
}

impl StatusEvaluator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn is_unassigned(&self, facts: &ScheduleFacts) -> bool {
        !facts.is_assigned
    }

    /// A row without any window never lapses.
    pub fn is_active(&self, facts: &ScheduleFacts) -> bool {
        facts.window.is_none_or(|w| self.today <= w.to)
    }

    pub fn is_expired_for_viewing(&self, facts: &ScheduleFacts) -> bool {
        facts.is_assigned && !self.is_active(facts) && !facts.is_performed
    }

    /// Whether the window has closed for (re)assignment, regardless of the
    /// assigned flag. Callers decide whether back-dating overrides it.
    pub fn is_expired_for_assigning(&self, facts: &ScheduleFacts) -> bool {
        facts.window.is_some_and(|w| self.today > w.to)
    }

    pub fn is_upcoming(&self, facts: &ScheduleFacts) -> bool {
        facts.window.is_some_and(|w| self.today < w.from)
    }

    pub fn status(&self, facts: &ScheduleFacts) -> ScheduleStatus {
        if facts.is_performed {
            ScheduleStatus::Performed
        } else if self.is_unassigned(facts) {
            ScheduleStatus::Unassigned
        } else if self.is_upcoming(facts) {
            ScheduleStatus::Upcoming
        } else if self.is_expired_for_viewing(facts) {
            ScheduleStatus::Expired
        } else {
            ScheduleStatus::Pending
        }
    }

    /// Gating for performing an activity: the row must be assigned and inside
    /// its window. Permission and scope checks are the caller's concern.
    pub fn check_perform(&self, facts: &ScheduleFacts) -> std::result::Result<(), PerformBlock> {
        if !facts.is_assigned {
            trace!("perform blocked: not assigned");
            return Err(PerformBlock::NotAssigned);
        }
        if self.is_upcoming(facts) {
            trace!(today = %self.today, "perform blocked: not started");
            return Err(PerformBlock::NotStarted);
        }
        if self.is_expired_for_viewing(facts) || self.is_expired_for_assigning(facts) {
            trace!(today = %self.today, "perform blocked: expired");
            return Err(PerformBlock::Expired);
        }
        Ok(())
    }

    /// SQL rendition of a status for a `tehsil_activities` query joined with
    /// its parent `district_activities`.
    pub fn status_condition(&self, status: ScheduleStatus) -> Condition {
        let today = self.today;
        match status {
            ScheduleStatus::Performed => {
                Condition::all().add(tehsil_activity::Column::IsPerformed.eq(true))
            }
            ScheduleStatus::Unassigned => Condition::all()
                .add(tehsil_activity::Column::IsPerformed.eq(false))
                .add(tehsil_activity::Column::IsAssigned.eq(false)),
            ScheduleStatus::Upcoming => Condition::all()
                .add(tehsil_activity::Column::IsPerformed.eq(false))
                .add(tehsil_activity::Column::IsAssigned.eq(true))
                .add(starts_after(today)),
            ScheduleStatus::Expired => Condition::all()
                .add(tehsil_activity::Column::IsPerformed.eq(false))
                .add(tehsil_activity::Column::IsAssigned.eq(true))
                .add(ends_before(today)),
            ScheduleStatus::Pending => Condition::all()
                .add(tehsil_activity::Column::IsPerformed.eq(false))
                .add(tehsil_activity::Column::IsAssigned.eq(true))
                .add(starts_after(today).not())
                .add(ends_before(today).not()),
        }
    }
}

/// Effective `to_date < day`.
fn ends_before(day: NaiveDate) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(tehsil_activity::Column::FromDate.is_not_null())
                .add(tehsil_activity::Column::ToDate.is_not_null())
                .add(tehsil_activity::Column::ToDate.lt(day)),
        )
        .add(
            Condition::all()
                .add(own_window_unset())
                .add(district_activity::Column::ToDate.lt(day)),
        )
}

/// Effective `from_date > day`.
fn starts_after(day: NaiveDate) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(tehsil_activity::Column::FromDate.is_not_null())
                .add(tehsil_activity::Column::ToDate.is_not_null())
                .add(tehsil_activity::Column::FromDate.gt(day)),
        )
        .add(
            Condition::all()
                .add(own_window_unset())
                .add(district_activity::Column::FromDate.gt(day)),
        )
}

fn own_window_unset() -> Condition {
    Condition::any()
        .add(tehsil_activity::Column::FromDate.is_null())
        .add(tehsil_activity::Column::ToDate.is_null())
}

/// Effective window overlapping `[from, to]`.
pub fn overlaps_condition(from: NaiveDate, to: NaiveDate) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(tehsil_activity::Column::FromDate.is_not_null())
                .add(tehsil_activity::Column::ToDate.is_not_null())
                .add(tehsil_activity::Column::FromDate.lte(to))
                .add(tehsil_activity::Column::ToDate.gte(from)),
        )
        .add(
            Condition::all()
                .add(own_window_unset())
                .add(district_activity::Column::FromDate.lte(to))
                .add(district_activity::Column::ToDate.gte(from)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn facts(from: NaiveDate, to: NaiveDate, assigned: bool, performed: bool) -> ScheduleFacts {
        ScheduleFacts {
            window: Some(ScheduleWindow::new(from, to).unwrap()),
            is_assigned: assigned,
            is_performed: performed,
        }
    }

    #[test]
    fn window_rejects_inverted_dates() {
        let err = ScheduleWindow::new(day(2026, 5, 2), day(2026, 5, 1)).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidWindow { .. }));
        assert!(ScheduleWindow::new(day(2026, 5, 1), day(2026, 5, 1)).is_ok());
    }

    #[test]
    fn future_schedule_is_upcoming_and_cannot_be_performed() {
        let today = day(2026, 3, 10);
        let eval = StatusEvaluator::new(today);
        let f = facts(today + Duration::days(5), today + Duration::days(20), true, false);

        assert!(eval.is_upcoming(&f));
        assert!(!eval.is_expired_for_viewing(&f));
        assert_eq!(eval.status(&f), ScheduleStatus::Upcoming);
        assert_eq!(eval.check_perform(&f), Err(PerformBlock::NotStarted));
        assert_eq!(PerformBlock::NotStarted.message(), "Schedule is not started yet.");
    }

    #[test]
    fn lapsed_assigned_schedule_is_expired() {
        let today = day(2026, 3, 10);
        let eval = StatusEvaluator::new(today);
        let f = facts(today - Duration::days(10), today - Duration::days(1), true, false);

        assert!(eval.is_expired_for_viewing(&f));
        assert!(eval.is_expired_for_assigning(&f));
        assert!(!eval.is_active(&f));
        assert_eq!(eval.status(&f), ScheduleStatus::Expired);
        assert_eq!(eval.check_perform(&f), Err(PerformBlock::Expired));
    }

    #[test]
    fn lapsed_unassigned_schedule_is_not_expired_for_viewing() {
        let today = day(2026, 3, 10);
        let eval = StatusEvaluator::new(today);
        let f = facts(today - Duration::days(10), today - Duration::days(1), false, false);

        assert!(!eval.is_expired_for_viewing(&f));
        assert!(eval.is_expired_for_assigning(&f));
        assert_eq!(eval.status(&f), ScheduleStatus::Unassigned);
    }

    #[test]
    fn unassigned_row_cannot_be_performed_inside_its_window() {
        let today = day(2026, 3, 10);
        let eval = StatusEvaluator::new(today);
        let f = facts(today - Duration::days(2), today + Duration::days(2), false, false);

        assert!(eval.is_active(&f));
        assert_eq!(eval.status(&f), ScheduleStatus::Unassigned);
        assert_eq!(eval.check_perform(&f), Err(PerformBlock::NotAssigned));
        assert_eq!(PerformBlock::NotAssigned.message(), "Activity has not been assigned yet.");
    }

    #[test]
    fn last_day_of_window_is_still_active() {
        let today = day(2026, 3, 10);
        let eval = StatusEvaluator::new(today);
        let f = facts(today - Duration::days(3), today, true, false);

        assert!(eval.is_active(&f));
        assert_eq!(eval.status(&f), ScheduleStatus::Pending);
        assert_eq!(eval.check_perform(&f), Ok(()));
    }

    #[test]
    fn row_without_window_is_always_active() {
        let eval = StatusEvaluator::new(day(2026, 3, 10));
        let f = ScheduleFacts {
            window: None,
            is_assigned: true,
            is_performed: false,
        };
        assert!(eval.is_active(&f));
        assert!(!eval.is_upcoming(&f));
        assert!(!eval.is_expired_for_assigning(&f));
    }

    #[test]
    fn expired_implies_assigned_and_excludes_upcoming() {
        let today = day(2026, 3, 10);
        let eval = StatusEvaluator::new(today);
        for from_offset in -10..10i64 {
            for len in 0..6i64 {
                for assigned in [false, true] {
                    for performed in [false, true] {
                        let from = today + Duration::days(from_offset);
                        let f = facts(from, from + Duration::days(len), assigned, performed);
                        if eval.is_expired_for_viewing(&f) {
                            assert!(f.is_assigned);
                            assert!(!eval.is_upcoming(&f));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn own_window_overrides_parent() {
        let now = day(2026, 1, 1).and_hms_opt(0, 0, 0).unwrap();
        let parent = district_activity::Model {
            id: 1,
            district_id: 1,
            activity_id: 1,
            frequency_id: None,
            from_date: day(2026, 1, 1),
            to_date: day(2026, 1, 31),
            description: None,
            is_unscheduled: false,
            created_by: 1,
            updated_by: None,
            created_at: now,
            updated_at: None,
        };
        let mut row = tehsil_activity::Model {
            id: 2,
            district_activity_id: 1,
            district_id: 1,
            tehsil_id: Some(1),
            activity_id: 1,
            frequency_id: None,
            from_date: None,
            to_date: None,
            is_assigned: false,
            assigned_at: None,
            is_performed: false,
            performed_at: None,
            performed_by: None,
            is_unscheduled: false,
            created_at: now,
        };

        let inherited = ScheduleFacts::for_tehsil_activity(&row, Some(&parent));
        assert_eq!(inherited.window.unwrap().to(), day(2026, 1, 31));

        // A half-set own window does not mix with the parent's.
        row.to_date = Some(day(2026, 1, 10));
        let half = ScheduleFacts::for_tehsil_activity(&row, Some(&parent));
        assert_eq!(half.window.unwrap().to(), day(2026, 1, 31));

        row.from_date = Some(day(2026, 1, 5));
        let own = ScheduleFacts::for_tehsil_activity(&row, Some(&parent));
        assert_eq!(own.window.unwrap().from(), day(2026, 1, 5));
        assert_eq!(own.window.unwrap().to(), day(2026, 1, 10));
    }
}
