// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("unsupported broker url scheme: {0}")]
    UnsupportedScheme(String),
}

pub trait Configuration {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate the configuration
    fn validate(&self) -> Result<(), Self::Error>;
}
