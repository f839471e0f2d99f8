use std::fmt;

use serde::Serialize;

/// Severity tier of a warning. Variants are declared in ascending order so
/// the derived `Ord` gives Critical > Moderate > Advisory > Parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Parse,
    Advisory,
    Moderate,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Parse => write!(f, "parse"),
            Severity::Advisory => write!(f, "advisory"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub severity: Severity,
    pub message: String,
}

impl Warning {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn is_severe(&self) -> bool {
        self.severity >= Severity::Moderate
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let warning = Warning::new(severity, message);
        tracing::debug!(severity = %warning.severity, message = %warning.message, "warning");
        self.items.push(warning);
    }

    pub fn parse(&mut self, message: impl Into<String>) {
        self.push(Severity::Parse, message);
    }

    pub fn advisory(&mut self, message: impl Into<String>) {
        self.push(Severity::Advisory, message);
    }

    pub fn moderate(&mut self, message: impl Into<String>) {
        self.push(Severity::Moderate, message);
    }

    pub fn critical(&mut self, message: impl Into<String>) {
        self.push(Severity::Critical, message);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        self.items.extend(warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}
