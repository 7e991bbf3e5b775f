use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::ticket::{Role, UserProfile};

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    /// Non-empty, trimmed header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Authenticated identity as supplied by the session layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub method: String,
}

impl Identity {
    /// The capability-tagged caller for queue operations.
    pub fn actor(&self) -> Actor {
        match self.role {
            Role::Visitor => Actor::Visitor {
                id: self.user_id.clone(),
            },
            Role::Operator => Actor::Operator {
                id: self.user_id.clone(),
            },
            Role::Admin => Actor::Admin {
                id: self.user_id.clone(),
            },
        }
    }

    /// Profile to cache for ticket enrichment.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id.clone(),
            role: self.role,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Caller of a queue operation, tagged with its capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    Visitor { id: String },
    Operator { id: String },
    Admin { id: String },
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::Visitor { id } | Actor::Operator { id } | Actor::Admin { id } => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Actor::Visitor { .. } => Role::Visitor,
            Actor::Operator { .. } => Role::Operator,
            Actor::Admin { .. } => Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin { .. })
    }

    /// The operator id, if this actor is an operator.
    pub fn as_operator(&self) -> Option<&str> {
        match self {
            Actor::Operator { id } => Some(id),
            _ => None,
        }
    }
}
