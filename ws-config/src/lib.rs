//! Configuration for the workspace launcher.
//!
//! The [`Config`] object is built once at startup by [`ConfigLoader`] and then
//! handed to every component that needs it; nothing reads configuration from
//! global state.

pub mod config;
pub mod containers;
pub mod limit_parser;
pub mod loader;

pub use config::{
    AuthzSettings, Config, ConfirmSettings, ExternalSettings, KubernetesSettings,
    ManagedContainerSettings, ServerSettings, ServiceMapperKind,
};
pub use containers::{ContainerDefinition, ContainerRegistry, FriendContainer};
pub use loader::ConfigLoader;
