pub mod processed_events;
