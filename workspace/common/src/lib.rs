//! Common transport-layer types shared between the server and its clients.
//! Handlers wrap these in their responses so consumers can deserialize
//! payloads without duplicating shapes.

mod dashboard;
mod paging;

pub use dashboard::{BarChart, ChartPoint, MonthPoint, StatusCards};
pub use paging::{Page, PageRequest};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper used by every successful endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// A `{id, name}` pair used for lookups and nested references.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NamedRef {
    pub id: i32,
    pub name: String,
}
