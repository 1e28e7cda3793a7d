pub mod blocked_slots;
pub mod bookings;
pub mod courts;
pub mod credit_packs;
pub mod processed_payment_events;
pub mod wallet_transactions;
