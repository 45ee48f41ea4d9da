//! Native response classification and normalization.
//!
//! The driver's answer to one statement is resolved into a [`NativeResponse`]
//! immediately after the call returns; [`normalize`] then maps it onto the
//! canonical [`ResultSet`].

use crate::models::{ResultSet, Row};

/// What the driver returned for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeResponse {
    /// The statement describes result columns. May be empty.
    Rows(Vec<Row>),
    /// The statement generated an identifier.
    InsertAck { insert_id: u64, affected_rows: u64 },
    /// Write or DDL acknowledgment without a generated identifier.
    UpdateAck { affected_rows: u64 },
}

impl NativeResponse {
    /// Classify a driver acknowledgment. A non-zero identifier marks an insert.
    pub fn ack(insert_id: u64, affected_rows: u64) -> Self {
        if insert_id > 0 {
            Self::InsertAck {
                insert_id,
                affected_rows,
            }
        } else {
            Self::UpdateAck { affected_rows }
        }
    }
}

/// Map a native response onto the canonical result.
///
/// Rows win over everything else; the identifier is checked before the affected
/// count; a response with no signal at all yields an empty result.
pub fn normalize(response: NativeResponse) -> ResultSet {
    match response {
        NativeResponse::Rows(rows) => ResultSet {
            id: None,
            row_count: Some(rows.len() as u64),
            rows: Some(rows),
        },
        NativeResponse::InsertAck {
            insert_id,
            affected_rows,
        } if insert_id > 0 => ResultSet {
            id: Some(insert_id),
            row_count: (affected_rows > 0).then_some(affected_rows),
            rows: None,
        },
        NativeResponse::InsertAck { affected_rows, .. }
        | NativeResponse::UpdateAck { affected_rows } if affected_rows > 0 => ResultSet {
            row_count: Some(affected_rows),
            ..ResultSet::empty()
        },
        _ => ResultSet::empty(),
    }
}

impl From<NativeResponse> for ResultSet {
    fn from(response: NativeResponse) -> Self {
        normalize(response)
    }
}
