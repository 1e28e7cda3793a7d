use axum::http::StatusCode;
use crates::domain::value_objects::storage_errors::{
    InsufficientLedgerBalance, SlotOverlap, TransactionConflict,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("insufficient balance: {balance_cents} available, {required_cents} required")]
    InsufficientBalance {
        balance_cents: i64,
        required_cents: i64,
    },
    #[error("not allowed: {0}")]
    Authorization(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("already processed: {0}")]
    AlreadyProcessed(String),
    #[error("concurrent update, please retry")]
    Concurrency,
    #[error("external service failed: {0}")]
    ExternalService(String),
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BookingError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::Conflict(_) => StatusCode::CONFLICT,
            BookingError::InsufficientBalance { .. } => StatusCode::PAYMENT_REQUIRED,
            BookingError::Authorization(_) => StatusCode::FORBIDDEN,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::AlreadyProcessed(_) => StatusCode::CONFLICT,
            BookingError::Concurrency => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            BookingError::Integrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translates the typed storage markers carried inside repository errors.
    pub fn from_storage(err: anyhow::Error) -> Self {
        if err.is::<TransactionConflict>() {
            return BookingError::Concurrency;
        }
        if err.is::<SlotOverlap>() {
            return BookingError::Conflict("slot is no longer available".to_string());
        }
        if let Some(shortfall) = err.downcast_ref::<InsufficientLedgerBalance>() {
            return BookingError::InsufficientBalance {
                balance_cents: shortfall.balance_cents,
                required_cents: shortfall.required_cents,
            };
        }
        BookingError::Internal(err)
    }
}

pub type UseCaseResult<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_markers_map_to_the_taxonomy() {
        assert!(matches!(
            BookingError::from_storage(TransactionConflict.into()),
            BookingError::Concurrency
        ));
        assert!(matches!(
            BookingError::from_storage(SlotOverlap.into()),
            BookingError::Conflict(_)
        ));
        assert!(matches!(
            BookingError::from_storage(
                InsufficientLedgerBalance {
                    balance_cents: 100,
                    required_cents: 6000
                }
                .into()
            ),
            BookingError::InsufficientBalance {
                balance_cents: 100,
                required_cents: 6000
            }
        ));
        assert!(matches!(
            BookingError::from_storage(anyhow::anyhow!("connection reset")),
            BookingError::Internal(_)
        ));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            BookingError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::InsufficientBalance {
                balance_cents: 0,
                required_cents: 1
            }
            .status_code(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(BookingError::Concurrency.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            BookingError::Integrity("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
