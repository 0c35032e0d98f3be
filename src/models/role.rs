//! Role and kind tags partitioning pooled resources.

use serde::{Deserialize, Serialize};

/// Logical partition selecting which environment-derived configuration and
/// pooled resource a call uses. The same role has independent meaning for the
/// relational pools and the key-value clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Fallback configuration (`MYSQL_*` / `REDIS_*`).
    #[default]
    Default,
    /// Write-path connections (`MYSQL_PUSH_*` / `REDIS_PUSH_*`).
    Push,
    /// Read-path connections (`MYSQL_POLLING_*` / `REDIS_POLLING_*`).
    Polling,
}

impl Role {
    /// Environment prefix for relational settings.
    pub(crate) fn mysql_prefix(self) -> &'static str {
        match self {
            Role::Push => "MYSQL_PUSH",
            Role::Polling => "MYSQL_POLLING",
            Role::Default => "MYSQL",
        }
    }

    /// Environment prefix for key-value settings.
    pub(crate) fn redis_prefix(self) -> &'static str {
        match self {
            Role::Push => "REDIS_PUSH",
            Role::Polling => "REDIS_POLLING",
            Role::Default => "REDIS",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Default => write!(f, "default"),
            Role::Push => write!(f, "push"),
            Role::Polling => write!(f, "polling"),
        }
    }
}

/// Secondary partition for key-value clients. Publish and subscribe traffic
/// must not share a connection with request/response commands, so each purpose
/// gets its own cached client per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    General,
    Pub,
    Sub,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::General => write!(f, "general"),
            Kind::Pub => write!(f, "pub"),
            Kind::Sub => write!(f, "sub"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_prefixes() {
        assert_eq!(Role::Push.mysql_prefix(), "MYSQL_PUSH");
        assert_eq!(Role::Polling.mysql_prefix(), "MYSQL_POLLING");
        assert_eq!(Role::Default.mysql_prefix(), "MYSQL");
        assert_eq!(Role::Push.redis_prefix(), "REDIS_PUSH");
        assert_eq!(Role::Polling.redis_prefix(), "REDIS_POLLING");
        assert_eq!(Role::Default.redis_prefix(), "REDIS");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Push.to_string(), "push");
        assert_eq!(Role::Polling.to_string(), "polling");
        assert_eq!(Role::Default.to_string(), "default");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(Kind::General.to_string(), "general");
        assert_eq!(Kind::Pub.to_string(), "pub");
        assert_eq!(Kind::Sub.to_string(), "sub");
    }

    #[test]
    fn test_role_deserializes_lowercase() {
        let role: Role = serde_json::from_str("\"polling\"").unwrap();
        assert_eq!(role, Role::Polling);
    }
}
