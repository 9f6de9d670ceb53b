//! Tagged operation results for non-throwing call sites.
//!
//! Expected, recoverable conditions travel as an [`Outcome`] instead of an
//! error: the caller inspects success, extracts the data with a default, or
//! converts to a hard [`crate::Error`] only at the point of use.

use std::collections::BTreeMap;

use crate::error::Error;

/// A success/failure carrier with an error message, optional cause, and
/// free-form context.
#[derive(Debug)]
pub struct Outcome<T> {
    data: Option<T>,
    error_message: Option<String>,
    cause: Option<anyhow::Error>,
    context: BTreeMap<String, String>,
}

impl<T> Outcome<T> {
    /// A successful outcome carrying `data`.
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error_message: None,
            cause: None,
            context: BTreeMap::new(),
        }
    }

    /// A failed outcome with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error_message: Some(message.into()),
            cause: None,
            context: BTreeMap::new(),
        }
    }

    /// A failed outcome with a message and an underlying cause.
    pub fn failure_with(message: impl Into<String>, cause: anyhow::Error) -> Self {
        Self {
            data: None,
            error_message: Some(message.into()),
            cause: Some(cause),
            context: BTreeMap::new(),
        }
    }

    /// Attach a context key/value pair, returning the updated outcome.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Extract the data, failing only here — at the point of use.
    pub fn into_result(self) -> Result<T, Error> {
        match self.data {
            Some(data) => Ok(data),
            None => {
                let mut msg = self
                    .error_message
                    .unwrap_or_else(|| "operation failed".to_string());
                if let Some(cause) = &self.cause {
                    msg.push_str(&format!(": {cause}"));
                }
                for (k, v) in &self.context {
                    msg.push_str(&format!(" [{k}={v}]"));
                }
                Err(Error::Operation(msg))
            }
        }
    }

    /// Safe extraction: the data on success, `default` otherwise.
    pub fn unwrap_or(self, default: T) -> T {
        self.data.unwrap_or(default)
    }
}
