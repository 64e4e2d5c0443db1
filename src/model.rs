//! Core data types: expense records and the mutations queued for sync

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The expense fields in the shape the remote sink accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFields {
    /// Date in the spreadsheet's display format
    pub date: String,

    /// Expense category (e.g. "Mercado")
    pub category: String,

    /// Amount as a formatted currency string (e.g. "R$ 50,00")
    pub amount: String,

    /// Payment method
    pub payment_method: String,

    /// Essential vs. non-essential spending
    pub essential: bool,

    /// Fixed/recurring vs. one-off
    pub recurring: bool,
}

/// Mutation kind understood by the remote sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    Add,
    Edit,
    Delete,
}

/// One create/edit/delete request in the sink's wire shape.
///
/// The sink addresses existing rows positionally, so `index` carries the
/// record's position at the time the mutation was issued. `expense` is
/// flattened into the JSON body and absent for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationPayload {
    pub action: MutationAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    #[serde(flatten)]
    pub expense: Option<ExpenseFields>,

    /// Access credential the sink requires on every write
    pub pin: String,
}

impl MutationPayload {
    pub fn add(expense: ExpenseFields, pin: impl Into<String>) -> Self {
        Self {
            action: MutationAction::Add,
            index: None,
            expense: Some(expense),
            pin: pin.into(),
        }
    }

    pub fn edit(index: usize, expense: ExpenseFields, pin: impl Into<String>) -> Self {
        Self {
            action: MutationAction::Edit,
            index: Some(index),
            expense: Some(expense),
            pin: pin.into(),
        }
    }

    pub fn delete(index: usize, pin: impl Into<String>) -> Self {
        Self {
            action: MutationAction::Delete,
            index: Some(index),
            expense: None,
            pin: pin.into(),
        }
    }
}

/// A mutation buffered while the sink was unreachable.
///
/// `timestamp` doubles as the entry's stable identifier for the lifetime of
/// the queue entry; the queue assigns strictly increasing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub payload: MutationPayload,

    /// Creation instant, unix millis
    pub timestamp: u64,

    /// Set once the sink has accepted the write
    pub synced: bool,
}

/// One expense record in the historical set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Stable identifier assigned at creation
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Creation instant, unix millis; also the merge dedup key
    pub timestamp: u64,

    /// Original ISO-formatted date, kept for date-range filtering
    pub date_iso: String,

    #[serde(flatten)]
    pub fields: ExpenseFields,
}

impl ExpenseRecord {
    /// Create a new record with a fresh id and creation timestamp.
    pub fn new(fields: ExpenseFields, date_iso: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now_millis(),
            date_iso: date_iso.into(),
            fields,
        }
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
