//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered employee who can hold a Guincoin balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Always stored lowercased, unique across the directory
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl AsRef<str>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email.as_ref()),
            name: name.into().trim().to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Canonical form used for every email comparison and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
