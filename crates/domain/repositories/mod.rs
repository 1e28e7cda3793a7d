pub mod blocked_slots;
pub mod bookings;
pub mod courts;
pub mod credit_packs;
pub mod notifications;
pub mod payment_events;
pub mod users;
pub mod wallet;
