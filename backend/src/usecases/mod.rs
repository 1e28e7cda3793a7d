pub mod cancellations;
pub mod errors;
pub mod payment_events;
pub mod payment_gateway;
pub mod reservations;
pub mod retry;
pub mod slots;
pub mod wallet;
