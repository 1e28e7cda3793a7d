pub mod booking_policy;
pub mod bookings;
pub mod courts;
pub mod enums;
pub mod notifications;
pub mod payment_events;
pub mod slot_grid;
pub mod storage_errors;
pub mod time_ranges;
pub mod wallet;
