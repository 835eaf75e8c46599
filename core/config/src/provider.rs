// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

mod file;

use serde_yaml::Value;
use thiserror::Error;

pub use file::FileConfigProvider;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("environment variable {0} not set")]
    MissingVariable(String),
    #[error("unterminated placeholder in {0}")]
    Unterminated(String),
}

/// Source of a raw configuration document.
pub trait ConfigProvider {
    fn load(&self, source: &str) -> Result<String, ProviderError>;
}

const PREFIX: &str = "${env:";

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Substitutes `${env:NAME}` placeholders found in string scalars.
pub struct ConfigResolver {
    lookup: Lookup,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigResolver {
    /// Resolver reading the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        ConfigResolver {
            lookup: Box::new(lookup),
        }
    }

    pub fn resolve(&self, value: &mut Value) -> Result<(), ProviderError> {
        match value {
            Value::String(s) => {
                if s.contains(PREFIX) {
                    *s = self.expand(s)?;
                }
                Ok(())
            }
            Value::Sequence(seq) => seq.iter_mut().try_for_each(|v| self.resolve(v)),
            Value::Mapping(map) => map.values_mut().try_for_each(|v| self.resolve(v)),
            Value::Tagged(tagged) => self.resolve(&mut tagged.value),
            _ => Ok(()),
        }
    }

    fn expand(&self, input: &str) -> Result<String, ProviderError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find(PREFIX) {
            out.push_str(&rest[..start]);
            let after = &rest[start + PREFIX.len()..];
            let end = after
                .find('}')
                .ok_or_else(|| ProviderError::Unterminated(input.to_string()))?;
            let name = after[..end].trim();
            let val =
                (self.lookup)(name).ok_or_else(|| ProviderError::MissingVariable(name.to_string()))?;
            out.push_str(&val);
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
