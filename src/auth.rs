use crate::error::{ReportError, Result};

/// Pass/fail check run once per session before any data is shown.
pub trait AuthGate {
    fn check(&self) -> Result<()>;
}

/// Lets everyone through; used when no access key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenGate;

impl AuthGate for OpenGate {
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SharedKeyGate {
    expected: String,
    provided: Option<String>,
}

impl SharedKeyGate {
    pub fn new(expected: impl Into<String>, provided: Option<String>) -> Self {
        Self {
            expected: expected.into(),
            provided,
        }
    }
}

impl AuthGate for SharedKeyGate {
    fn check(&self) -> Result<()> {
        match self.provided.as_deref() {
            Some(key) if constant_time_eq(key.as_bytes(), self.expected.as_bytes()) => Ok(()),
            _ => Err(ReportError::AccessDenied),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Gate for an optional configured key: open when none is set.
pub fn gate_for(expected: Option<&str>, provided: Option<String>) -> Box<dyn AuthGate> {
    match expected {
        Some(key) if !key.is_empty() => Box::new(SharedKeyGate::new(key, provided)),
        _ => Box::new(OpenGate),
    }
}
