//! Error model, one enum per layer.

use thiserror::Error;

use crate::money::Money;
use crate::schemas::MemberId;

/// Monetary inconsistencies in a single expense.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be a positive number (got {0})")]
    NonPositiveAmount(Money),

    #[error("Split must include at least one member")]
    EmptySplit,

    #[error("Share for member {member} cannot be negative ({amount})")]
    NegativeShare { member: MemberId, amount: Money },

    #[error("Split amounts ({computed}) don't match expense amount ({expected})")]
    SplitSumMismatch { computed: Money, expected: Money },

    #[error("Payment amounts ({computed}) don't match expense amount ({expected})")]
    PaymentSumMismatch { computed: Money, expected: Money },
}

impl ValidationError {
    /// Request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::NonPositiveAmount(_) => "amount",
            ValidationError::EmptySplit
            | ValidationError::NegativeShare { .. }
            | ValidationError::SplitSumMismatch { .. } => "splitBetween",
            ValidationError::PaymentSumMismatch { .. } => "paidByMultiple",
        }
    }
}

/// Internal-consistency failures of the settlement optimizer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error(
        "balances do not conserve money: {unmatched_debt} owed and {unmatched_credit} due left unmatched"
    )]
    ConservationViolation {
        unmatched_debt: Money,
        unmatched_credit: Money,
    },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
}

/// Errors surfaced by the service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    #[error("Some members are not in this group")]
    UnknownMembers {
        field: &'static str,
        members: Vec<String>,
    },

    #[error("{message}")]
    Conflict {
        field: &'static str,
        message: String,
    },

    #[error("Cannot remove member who has expenses. Please delete related expenses first.")]
    MemberHasExpenses,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
