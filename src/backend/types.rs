//! Wire types for the backend service.
//!
//! These mirror the service's JSON models. System attributes carry a `$`
//! prefix on the wire (`$id`, `$createdAt`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::error::Error;

/// Session id that addresses the session carried by the current request.
pub const CURRENT_SESSION: &str = "current";

/// System attribute holding the document creation timestamp.
pub const CREATED_AT: &str = "$createdAt";

/// Generate a fresh identifier for a new account or document.
///
/// 32 lowercase hex characters, within the service's 36 character limit
/// and never starting with a special character.
#[must_use]
pub fn unique_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Longest id the service accepts.
pub const MAX_ID_LEN: usize = 36;

/// Check that `id` is a valid service id before it is placed in a URL path.
///
/// Ids are 1 to 36 characters of `a-z`, `A-Z`, `0-9`, `.`, `-` and `_`,
/// and may not start with `.`, `-` or `_`. `kind` names the id in the error.
pub fn validate_id(kind: &str, id: &str) -> crate::error::Result<()> {
    let mut chars = id.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid_start && valid_rest && id.len() <= MAX_ID_LEN {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid {kind} id: {id:?}")))
    }
}

// =============================================================================
// Identity
// =============================================================================

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    #[serde(rename = "$id")]
    pub id: String,
    /// Account email.
    pub email: String,
    /// Display name (may be empty).
    #[serde(default)]
    pub name: String,
    /// Whether the email address has been verified.
    #[serde(default, rename = "emailVerification")]
    pub email_verification: bool,
    /// Account creation time.
    #[serde(default, rename = "$createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A session issued by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier.
    #[serde(rename = "$id")]
    pub id: String,
    /// Owning user.
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Expiry timestamp, as reported by the service.
    #[serde(default)]
    pub expire: String,
    /// Authentication provider (`email` for password sessions).
    #[serde(default)]
    pub provider: String,
}

// =============================================================================
// Documents
// =============================================================================

/// A stored document: system attributes plus the collection's own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, rename = "$permissions")]
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// Result of a list call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentList {
    /// Total number of matching documents on the server.
    #[serde(default)]
    pub total: u64,
    /// The documents in the requested window.
    #[serde(default)]
    pub documents: Vec<Document>,
}

// =============================================================================
// Queries
// =============================================================================

/// A list query, serialized as the JSON string the service expects in
/// `queries[]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    OrderDesc(String),
    OrderAsc(String),
    Limit(usize),
    Offset(usize),
    Equal(String, Vec<Value>),
}

impl Query {
    pub fn order_desc(attribute: impl Into<String>) -> Self {
        Self::OrderDesc(attribute.into())
    }

    pub fn order_asc(attribute: impl Into<String>) -> Self {
        Self::OrderAsc(attribute.into())
    }

    pub fn limit(n: usize) -> Self {
        Self::Limit(n)
    }

    pub fn offset(n: usize) -> Self {
        Self::Offset(n)
    }

    pub fn equal(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal(attribute.into(), vec![value.into()])
    }

    /// JSON form of the query.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::OrderDesc(attr) => json!({ "method": "orderDesc", "attribute": attr }),
            Self::OrderAsc(attr) => json!({ "method": "orderAsc", "attribute": attr }),
            Self::Limit(n) => json!({ "method": "limit", "values": [n] }),
            Self::Offset(n) => json!({ "method": "offset", "values": [n] }),
            Self::Equal(attr, values) => {
                json!({ "method": "equal", "attribute": attr, "values": values })
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

// =============================================================================
// Permissions
// =============================================================================

/// Document-level action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Update,
    Delete,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Principal a permission is granted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Anyone, including guests.
    Any,
    /// Any signed-in user.
    Users,
    /// A single user.
    User(String),
}

impl Role {
    /// Whether `principal` (the signed-in user id, if any) holds this role.
    #[must_use]
    pub fn admits(&self, principal: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Users => principal.is_some(),
            Self::User(id) => principal == Some(id.as_str()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Users => f.write_str("users"),
            Self::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// A single `{action, principal}` rule, e.g. `delete("user:abc")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission {
    pub action: Action,
    pub role: Role,
}

impl Permission {
    pub fn read(role: Role) -> Self {
        Self {
            action: Action::Read,
            role,
        }
    }

    pub fn update(role: Role) -> Self {
        Self {
            action: Action::Update,
            role,
        }
    }

    pub fn delete(role: Role) -> Self {
        Self {
            action: Action::Delete,
            role,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(\"{}\")", self.action.as_str(), self.role)
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, rest) = s
            .split_once('(')
            .ok_or_else(|| format!("malformed permission: {s}"))?;
        let role = rest
            .strip_suffix(')')
            .map(|r| r.trim_matches('"'))
            .ok_or_else(|| format!("malformed permission: {s}"))?;

        let action = match action {
            "read" => Action::Read,
            "update" => Action::Update,
            "delete" => Action::Delete,
            other => return Err(format!("unknown action: {other}")),
        };
        let role = match role {
            "any" => Role::Any,
            "users" => Role::Users,
            other => match other.strip_prefix("user:") {
                Some(id) if !id.is_empty() => Role::User(id.to_string()),
                _ => return Err(format!("unknown role: {other}")),
            },
        };
        Ok(Self { action, role })
    }
}
