pub mod booking_statuses;
pub mod payment_types;
pub mod refund_reasons;
pub mod slot_statuses;
pub mod wallet_transaction_types;
