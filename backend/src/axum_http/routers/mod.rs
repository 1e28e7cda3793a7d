pub mod admin;
pub mod bookings;
pub mod payments;
pub mod slots;
pub mod wallet;
