//! Processing log DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::processing_log;

/// Outcome of a logged pipeline operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogOutcome {
    Success,
    Error,
}

impl LogOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One audit log entry for a bill.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProcessingLogResponse {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub operation: String,
    pub outcome: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl From<processing_log::Model> for ProcessingLogResponse {
    fn from(m: processing_log::Model) -> Self {
        ProcessingLogResponse {
            id: m.id,
            bill_id: m.bill_id,
            operation: m.operation,
            outcome: m.outcome,
            message: m.message,
            metadata: m.metadata,
            created_at: m.created_at,
        }
    }
}

/// Audit trail for one bill.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BillLogsResponse {
    pub bill_id: Uuid,
    pub logs: Vec<ProcessingLogResponse>,
}
