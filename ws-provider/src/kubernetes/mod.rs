//! Kubernetes plumbing shared by the local and external backends.

pub mod backend;
pub mod client;
pub mod model;
pub mod pod;

pub use backend::{ClusterHandle, ClusterSource, KubernetesBackend};
pub use client::{Created, CustomResource, KubeClient};
