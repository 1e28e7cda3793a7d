use std::env;

#[derive(Clone, Debug)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    /// Prints the module target beside each event.
    pub(crate) with_target: bool,
    pub(crate) ansi: bool,
    /// Warnings captured during config parsing so they can be logged after tracing is initialized.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = lookup("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = lookup("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let with_target = flag(&lookup, "LOG_WITH_TARGET", false, &mut warnings);
        let ansi = flag(&lookup, "LOG_ANSI", true, &mut warnings);

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            with_target,
            ansi,
            warnings,
        }
    }
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
    warnings: &mut Vec<String>,
) -> bool {
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return default;
    };

    match parse_bool(&raw) {
        Some(value) => value,
        None => {
            warnings.push(format!("{key} is invalid (value: {raw}); defaulting to {default}"));
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
