//! Backend identifiers and the rotation pool.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A model identifier served by the chat-completions API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backend(String);

impl Backend {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The model name as sent on the wire.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackendPoolError {
    #[error("backend pool must contain at least one model")]
    Empty,
    #[error("backend pool contains a blank model name at position {0}")]
    BlankName(usize),
}

/// Ordered, non-empty list of backends to rotate through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPool {
    backends: Vec<Backend>,
}

impl BackendPool {
    /// Build a pool from model names, preserving order.
    pub fn new<I, S>(names: I) -> Result<Self, BackendPoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut backends = Vec::new();
        for (position, name) in names.into_iter().enumerate() {
            let name: String = name.into();
            let name = name.trim();
            if name.is_empty() {
                return Err(BackendPoolError::BlankName(position));
            }
            backends.push(Backend::new(name));
        }

        if backends.is_empty() {
            return Err(BackendPoolError::Empty);
        }

        Ok(Self { backends })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Backend at `index`, wrapping modulo the pool length.
    pub fn get(&self, index: usize) -> &Backend {
        &self.backends[index % self.backends.len()]
    }

    /// Index following `index` in round-robin order.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.backends.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }
}
