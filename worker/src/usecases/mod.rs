pub mod booking_sweeps;
