// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

pub mod configuration;
pub mod loader;
pub mod provider;
pub mod rpc;

pub use configuration::{Configuration, ConfigurationError};
pub use loader::{ConfigError, ConfigLoader};
pub use rpc::{BrokerConfig, ClientConfig, ServerConfig};
