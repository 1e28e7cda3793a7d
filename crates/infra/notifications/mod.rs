pub mod tracing_notifier;
