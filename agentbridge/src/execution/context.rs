//! Per-invocation execution context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The agent on whose behalf a capability is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl AgentInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// An authenticated end user, when the embedding application provides one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Identity of the embedding application instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub id: String,
    pub name: String,
    pub environment: String,
}

impl Default for ApplicationInfo {
    fn default() -> Self {
        Self {
            id: "app".to_string(),
            name: "app".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Per-request metadata, generated fresh for every invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Caller-supplied inputs the engine turns into an [`ExecutionContext`].
#[derive(Debug, Clone, Default)]
pub struct ContextSeed {
    pub agent: Option<AgentInfo>,
    pub user: Option<UserInfo>,
    pub ip: Option<String>,
}

impl ContextSeed {
    pub fn for_agent(agent: AgentInfo) -> Self {
        Self {
            agent: Some(agent),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }
}

/// Immutable record handed to a handler; lifetime is one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub agent: AgentInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    pub application: ApplicationInfo,
    pub request: RequestInfo,
}

impl ExecutionContext {
    /// Build a context with a freshly generated request id and the invocation
    /// start as the request timestamp.
    pub fn build(seed: ContextSeed, application: ApplicationInfo) -> Self {
        Self {
            agent: seed
                .agent
                .unwrap_or_else(|| AgentInfo::new("anonymous-agent")),
            user: seed.user,
            application,
            request: RequestInfo {
                id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                ip: seed.ip,
            },
        }
    }
}
