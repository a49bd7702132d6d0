//! App definitions users can launch as workspaces.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use ws_core::{Result, WsError};

use crate::limit_parser::{parse_cpu_millis, parse_memory_bytes};

/// A named, resource-limited workload template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub cpu_limit: String,
    pub memory_limit: String,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default = "default_target_port")]
    pub target_port: u16,

    /// Path the proxy rewrites requests to before forwarding.
    #[serde(default = "default_path_rewrite")]
    pub path_rewrite: String,

    #[serde(default)]
    pub use_tls: bool,

    /// HTTP path polled by the readiness probe.
    #[serde(default)]
    pub ready_probe: Option<String>,

    #[serde(default)]
    pub user_uid: Option<i64>,

    #[serde(default)]
    pub group_uid: Option<i64>,

    #[serde(default)]
    pub fs_gid: Option<i64>,

    /// Sidecars started next to the main container.
    #[serde(default)]
    pub friends: Vec<FriendContainer>,

    /// Policy resource the caller must hold to use this app.
    #[serde(default)]
    pub authz_resource: Option<String>,

    /// License product a seat must be checked out for.
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendContainer {
    pub name: String,
    pub image: String,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default = "default_friend_cpu")]
    pub cpu_limit: String,

    #[serde(default = "default_friend_memory")]
    pub memory_limit: String,
}

fn default_target_port() -> u16 {
    8888
}

fn default_path_rewrite() -> String {
    "/".to_string()
}

fn default_friend_cpu() -> String {
    "100m".to_string()
}

fn default_friend_memory() -> String {
    "128Mi".to_string()
}

impl ContainerDefinition {
    /// Content hash identifying this definition (image, CPU and memory).
    pub fn id(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.image.as_bytes());
        hasher.update(b"|");
        hasher.update(self.cpu_limit.as_bytes());
        hasher.update(b"|");
        hasher.update(self.memory_limit.as_bytes());
        let digest = hasher.finalize();
        digest[..16].iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn cpu_millis(&self) -> Result<u64> {
        parse_cpu_millis(&self.cpu_limit)
            .map_err(|e| WsError::Config(format!("container '{}': {}", self.name, e)))
    }

    pub fn memory_bytes(&self) -> Result<u64> {
        parse_memory_bytes(&self.memory_limit)
            .map_err(|e| WsError::Config(format!("container '{}': {}", self.name, e)))
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(WsError::Config("container name must not be empty".into()));
        }
        if self.image.trim().is_empty() {
            return Err(WsError::Config(format!(
                "container '{}' has no image",
                self.name
            )));
        }
        self.cpu_millis()?;
        self.memory_bytes()?;
        for friend in &self.friends {
            parse_cpu_millis(&friend.cpu_limit)
                .and_then(|_| parse_memory_bytes(&friend.memory_limit))
                .map_err(|e| {
                    WsError::Config(format!(
                        "sidecar '{}' of container '{}': {}",
                        friend.name, self.name, e
                    ))
                })?;
        }
        Ok(())
    }
}

/// Read-only map from content hash to app definition, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ContainerRegistry {
    definitions: IndexMap<String, ContainerDefinition>,
}

impl ContainerRegistry {
    /// Build the registry, rejecting invalid or duplicate definitions.
    pub fn from_definitions(definitions: &[ContainerDefinition]) -> Result<Self> {
        let mut map = IndexMap::with_capacity(definitions.len());
        for def in definitions {
            def.validate()?;
            let id = def.id();
            if let Some(existing) = map.insert(id.clone(), def.clone()) {
                return Err(WsError::Config(format!(
                    "containers '{}' and '{}' share image and limits (id {})",
                    existing.name, def.name, id
                )));
            }
        }
        Ok(Self { definitions: map })
    }

    pub fn get(&self, id: &str) -> Option<&ContainerDefinition> {
        self.definitions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContainerDefinition)> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, image: &str) -> ContainerDefinition {
        serde_yaml_ng::from_str(&format!(
            "name: {name}\nimage: {image}\ncpu_limit: \"1\"\nmemory_limit: 2Gi\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let def = definition("notebook", "quay.io/lab/notebook:1.0");
        assert_eq!(def.target_port, 8888);
        assert_eq!(def.path_rewrite, "/");
        assert!(def.friends.is_empty());
        assert!(def.authz_resource.is_none());
    }

    #[test]
    fn test_id_is_content_hash() {
        let a = definition("notebook", "quay.io/lab/notebook:1.0");
        let renamed = definition("renamed", "quay.io/lab/notebook:1.0");
        let other = definition("notebook", "quay.io/lab/notebook:2.0");

        assert_eq!(a.id().len(), 32);
        assert_eq!(a.id(), renamed.id());
        assert_ne!(a.id(), other.id());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let a = definition("one", "img:1");
        let b = definition("two", "img:1");
        let err = ContainerRegistry::from_definitions(&[a, b]).unwrap_err();
        assert!(err.to_string().contains("share image and limits"));
    }

    #[test]
    fn test_registry_rejects_bad_limits() {
        let mut def = definition("one", "img:1");
        def.memory_limit = "plenty".into();
        assert!(ContainerRegistry::from_definitions(&[def]).is_err());
    }

    #[test]
    fn test_registry_preserves_order() {
        let defs = vec![
            definition("b", "img:b"),
            definition("a", "img:a"),
            definition("c", "img:c"),
        ];
        let registry = ContainerRegistry::from_definitions(&defs).unwrap();
        let names: Vec<_> = registry.iter().map(|(_, d)| d.name.as_str()).collect();
        assert_eq!(names, ["b", "a", "c"]);
        assert!(registry.get(&defs[1].id()).is_some());
    }
}
