use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Headline counts shown on the dashboard cards.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StatusCards {
    pub scheduled: u64,
    pub unassigned: u64,
    pub performed: u64,
    pub pending: u64,
    pub expired: u64,
}

impl StatusCards {
    /// Cards as labelled points, in display order. Feeds the pie chart.
    pub fn points(&self) -> Vec<ChartPoint> {
        [
            ("Scheduled", self.scheduled),
            ("Unassigned", self.unassigned),
            ("Performed", self.performed),
            ("Pending", self.pending),
            ("Expired", self.expired),
        ]
        .into_iter()
        .map(|(name, y)| ChartPoint {
            name: name.to_string(),
            y,
        })
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ChartPoint {
    pub name: String,
    pub y: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BarChart {
    pub title: String,
    pub data: Vec<ChartPoint>,
}

/// One month of a trend line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct MonthPoint {
    pub year: i32,
    pub month: u32,
    /// e.g. `Jan 2026`
    pub label: String,
    pub count: u64,
}
