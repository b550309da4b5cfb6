//! Return requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Money, OrderId, ReturnId, ReturnStatus, UserId};

/// Longest reason accepted from a customer.
pub const MAX_REASON_LEN: usize = 1000;

/// A customer's request to send an order back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: ReturnId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    pub status: ReturnStatus,
    /// Amount credited to the wallet once refunded.
    pub refund_amount: Money,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReturnReasonError {
    #[error("please tell us why you are returning this order")]
    Empty,
    #[error("reason must be at most {MAX_REASON_LEN} characters")]
    TooLong,
}

/// Trim and check a return reason.
///
/// # Errors
///
/// Returns [`ReturnReasonError`] if the reason is blank or too long.
pub fn validate_reason(reason: &str) -> Result<String, ReturnReasonError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ReturnReasonError::Empty);
    }
    if reason.chars().count() > MAX_REASON_LEN {
        return Err(ReturnReasonError::TooLong);
    }
    Ok(reason.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_rules() {
        assert_eq!(validate_reason("   "), Err(ReturnReasonError::Empty));
        assert_eq!(validate_reason(" damaged "), Ok("damaged".to_string()));
        let long = "x".repeat(MAX_REASON_LEN + 1);
        assert_eq!(validate_reason(&long), Err(ReturnReasonError::TooLong));
    }
}
