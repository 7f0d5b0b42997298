// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-scoped default logger, lazily initialized.
//
// A OnceLock holder instead of a mutable singleton: once set, the default
// logger lives for the process and hands out shared references.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logger::Logger;
use std::sync::OnceLock;

static DEFAULT: OnceLock<Logger> = OnceLock::new();

/// Install the process-wide default logger from `config`.
///
/// Environment overrides (`NEXLOG_*`) are applied on top of `config`.
/// Fails with a state error if a default logger was already installed.
pub fn init(mut config: Config) -> Result<&'static Logger> {
    config.apply_env_overrides()?;
    let logger = Logger::from_config(&config)?;
    DEFAULT
        .set(logger)
        .map_err(|_| Error::AlreadyInitialized)?;
    DEFAULT
        .get()
        .ok_or_else(|| Error::Unexpected("default logger vanished after init".into()))
}

/// The default logger, if one was installed.
pub fn get() -> Option<&'static Logger> {
    DEFAULT.get()
}

/// The default logger, installing one from `Config::default()` (plus
/// environment overrides) on first use.
pub fn get_or_init() -> &'static Logger {
    DEFAULT.get_or_init(|| {
        let mut config = Config::default();
        // A broken environment falls back to programmatic defaults
        if config.apply_env_overrides().is_err() {
            config = Config::default();
        }
        Logger::from_config(&config).unwrap_or_else(|_| {
            // Console-less fallback logger; construction cannot fail
            let formatter_config = crate::config::FormatterConfig::default();
            let console = crate::format::TemplateFormatter::new(formatter_config.clone())
                .unwrap_or_else(|_| fallback_formatter());
            let file = crate::format::TemplateFormatter::for_file(formatter_config)
                .unwrap_or_else(|_| fallback_formatter());
            Logger::new(crate::level::Level::Info, console, file)
        })
    })
}

/// Minimal formatter used only when the defaults fail to compile, which
/// would indicate a broken built-in template.
fn fallback_formatter() -> crate::format::TemplateFormatter {
    let config = crate::config::FormatterConfig {
        template: Some("{message}".to_string()),
        ..Default::default()
    };
    match crate::format::TemplateFormatter::new(config) {
        Ok(formatter) => formatter,
        Err(_) => unreachable!("'{{message}}' is a valid template"),
    }
}
