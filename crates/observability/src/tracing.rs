//! Subscriber configuration: `EnvFilter` plus JSON or human-readable output.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (default).
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Directive used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = match lookup("FORGEPOS_LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("pretty") || f.eq_ignore_ascii_case("text") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        Self {
            format,
            ..Self::default()
        }
    }
}

pub fn init(settings: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.default_filter));

    let result = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_current_span(true)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };
    if result.is_ok() {
        tracing::debug!(format = ?settings.format, "tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_the_default_format() {
        assert_eq!(LogSettings::from_lookup(|_| None).format, LogFormat::Json);
        assert_eq!(
            LogSettings::from_lookup(|_| Some("bogus".to_string())).format,
            LogFormat::Json
        );
    }

    #[test]
    fn pretty_format_is_selectable() {
        let settings = LogSettings::from_lookup(|k| (k == "FORGEPOS_LOG_FORMAT").then(|| " Pretty ".to_string()));
        assert_eq!(settings.format, LogFormat::Pretty);
        assert_eq!(settings.default_filter, "info");
    }

    #[test]
    fn init_twice_is_harmless() {
        init(&LogSettings::default());
        init(&LogSettings::default());
    }
}
