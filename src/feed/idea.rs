//! The idea record and its creation input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::{Document, Permission, Role};
use crate::error::{Error, Result};

/// A stored idea, as echoed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Idea {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub permissions: Vec<String>,
    pub title: String,
    pub description: String,
    pub user_id: String,
}

/// Collection fields of an idea document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdeaFields {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "userId")]
    user_id: String,
}

impl TryFrom<Document> for Idea {
    type Error = Error;

    fn try_from(doc: Document) -> Result<Self> {
        let fields: IdeaFields = serde_json::from_value(Value::Object(doc.data))?;
        Ok(Self {
            id: doc.id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            permissions: doc.permissions,
            title: fields.title,
            description: fields.description,
            user_id: fields.user_id,
        })
    }
}

/// Input for a new idea.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdeaInput {
    pub title: String,
    pub description: String,
    pub user_id: String,
}

impl IdeaInput {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            user_id: user_id.into(),
        }
    }

    /// Reject input the backend would refuse anyway, without a round trip.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title cannot be empty"));
        }
        if self.user_id.trim().is_empty() {
            return Err(Error::validation("user id cannot be empty"));
        }
        Ok(())
    }

    /// Document body sent on creation.
    pub fn to_data(&self) -> Result<Value> {
        Ok(serde_json::to_value(IdeaFields {
            title: self.title.clone(),
            description: self.description.clone(),
            user_id: self.user_id.clone(),
        })?)
    }

    /// Anyone may read; only the author may update or delete.
    #[must_use]
    pub fn permissions(&self) -> Vec<Permission> {
        let owner = Role::User(self.user_id.clone());
        vec![
            Permission::read(Role::Any),
            Permission::update(owner.clone()),
            Permission::delete(owner),
        ]
    }
}
