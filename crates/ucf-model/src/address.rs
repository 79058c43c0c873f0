use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one configuration value: a config namespace, a section
/// within it and optionally a single option.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    pub config: String,
    pub section: String,
    pub option: Option<String>,
}

impl Address {
    pub fn section(config: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            config: config.into(),
            section: section.into(),
            option: None,
        }
    }

    pub fn option(
        config: impl Into<String>,
        section: impl Into<String>,
        option: impl Into<String>,
    ) -> Self {
        Self {
            config: config.into(),
            section: section.into(),
            option: Some(option.into()),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.option {
            Some(option) => write!(f, "{}.{}.{}", self.config, self.section, option),
            None => write!(f, "{}.{}", self.config, self.section),
        }
    }
}
