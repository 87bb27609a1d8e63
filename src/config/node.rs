//! Node topology and SSH settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::remote::{Credential, RemoteTarget};

use super::validation::{ConfigError, expand_path};

/// Default MongoDB port.
pub const DEFAULT_MONGO_PORT: u16 = 27017;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

fn default_mongo_port() -> u16 {
    DEFAULT_MONGO_PORT
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// One cluster member reachable over SSH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Display name; used as a store path segment.
    pub name: String,
    /// Host name or IP address.
    pub address: String,
    /// Port mongod listens on (default: 27017).
    #[serde(default = "default_mongo_port")]
    pub mongo_port: u16,
    /// SSH port (default: 22).
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    /// Login user overriding `ssh.user`.
    #[serde(default)]
    pub user: Option<String>,
}

impl NodeSpec {
    /// Create a node with default ports.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            mongo_port: DEFAULT_MONGO_PORT,
            ssh_port: DEFAULT_SSH_PORT,
            user: None,
        }
    }

    /// Set the mongod port.
    pub fn with_mongo_port(mut self, port: u16) -> Self {
        self.mongo_port = port;
        self
    }

    /// Connection target for this node.
    pub fn target(&self, ssh: &SshConfig, credential: &Credential) -> RemoteTarget {
        RemoteTarget {
            node: self.name.clone(),
            address: self.address.clone(),
            port: self.ssh_port,
            user: self.user.clone().unwrap_or_else(|| ssh.user.clone()),
            credential: credential.clone(),
        }
    }
}

/// SSH authentication method.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AuthType {
    /// Password supplied at startup.
    Password,
    /// Private key file.
    Key,
}

/// Cluster-wide SSH settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshConfig {
    /// Authentication method.
    pub auth_type: AuthType,
    /// Default login user.
    pub user: String,
    /// Private key path for `key` auth; `~` and `${VAR}` are expanded.
    #[serde(default)]
    pub key_path: Option<String>,
}

impl SshConfig {
    /// Expanded key path, if configured.
    pub fn expanded_key_path(&self) -> Option<PathBuf> {
        self.key_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(expand_path(p.trim())))
    }

    /// Turn the configured method into credential material.
    ///
    /// `password` is only consulted for password auth.
    ///
    /// # Errors
    /// `ConfigError::ValidationError` if the material the method needs is
    /// missing.
    pub fn resolve_credential(&self, password: Option<String>) -> Result<Credential, ConfigError> {
        match self.auth_type {
            AuthType::Password => password.map(Credential::Password).ok_or_else(|| {
                ConfigError::ValidationError("ssh password auth requires a password".to_string())
            }),
            AuthType::Key => self.expanded_key_path().map(Credential::KeyFile).ok_or_else(|| {
                ConfigError::ValidationError("ssh key auth requires key_path".to_string())
            }),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.user.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ssh user cannot be empty".to_string(),
            ));
        }
        if self.auth_type == AuthType::Key && self.expanded_key_path().is_none() {
            return Err(ConfigError::ValidationError(
                "ssh key auth requires key_path".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_ssh() -> SshConfig {
        SshConfig {
            auth_type: AuthType::Key,
            user: "ubuntu".to_string(),
            key_path: Some("/keys/id_rsa".to_string()),
        }
    }

    #[test]
    fn test_node_defaults_from_yaml() {
        let node: NodeSpec = serde_yaml::from_str("name: db1\naddress: 10.0.0.11\n").unwrap();
        assert_eq!(node.mongo_port, DEFAULT_MONGO_PORT);
        assert_eq!(node.ssh_port, DEFAULT_SSH_PORT);
        assert_eq!(node.user, None);
    }

    #[test]
    fn test_target_uses_user_override() {
        let ssh = key_ssh();
        let cred = ssh.resolve_credential(None).unwrap();
        let mut node = NodeSpec::new("db1", "10.0.0.11");
        assert_eq!(node.target(&ssh, &cred).user, "ubuntu");
        node.user = Some("admin".to_string());
        let target = node.target(&ssh, &cred);
        assert_eq!(target.user, "admin");
        assert_eq!(target.credential, Credential::KeyFile("/keys/id_rsa".into()));
    }

    #[test]
    fn test_auth_type_parse() {
        let ssh: SshConfig = serde_yaml::from_str("auth_type: password\nuser: u\n").unwrap();
        assert_eq!(ssh.auth_type, AuthType::Password);
        assert_eq!(AuthType::Key.to_string(), "key");
    }

    #[test]
    fn test_resolve_password() {
        let ssh = SshConfig {
            auth_type: AuthType::Password,
            user: "u".to_string(),
            key_path: None,
        };
        assert!(ssh.resolve_credential(None).is_err());
        assert_eq!(
            ssh.resolve_credential(Some("pw".to_string())).unwrap(),
            Credential::Password("pw".to_string())
        );
    }

    #[test]
    fn test_key_auth_requires_path() {
        let ssh = SshConfig {
            key_path: None,
            ..key_ssh()
        };
        assert!(ssh.validate().is_err());
        assert!(ssh.resolve_credential(None).is_err());
        assert!(key_ssh().validate().is_ok());
    }
}
