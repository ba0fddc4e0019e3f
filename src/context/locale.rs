//! Localization capability.

use std::sync::RwLock;

/// Read and switch the active locale.
pub trait LocaleStore: Send + Sync {
    fn current_locale(&self) -> String;
    fn set_locale(&self, code: &str);
}

/// Locale holder scoped to a single request.
#[derive(Debug)]
pub struct RequestLocale {
    current: RwLock<String>,
}

impl RequestLocale {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(code.into()),
        }
    }
}

impl LocaleStore for RequestLocale {
    fn current_locale(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_locale(&self, code: &str) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = code.to_string();
    }
}
