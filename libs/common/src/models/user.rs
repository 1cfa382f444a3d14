//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of account that owns listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Private,
    Shelter,
    Breeder,
    Nursery,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Private => "private",
            AccountType::Shelter => "shelter",
            AccountType::Breeder => "breeder",
            AccountType::Nursery => "nursery",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(AccountType::Private),
            "shelter" => Ok(AccountType::Shelter),
            "breeder" => Ok(AccountType::Breeder),
            "nursery" => Ok(AccountType::Nursery),
            other => Err(format!("Unknown account type: {}", other)),
        }
    }
}

/// User entity
///
/// `liked` holds the ids of the pets this user liked; it behaves as a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub phone: String,
    pub account_type: AccountType,
    pub telegram: String,
    pub instagram: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub liked: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user has the given pet in their liked set
    pub fn has_liked(&self, pet_id: Uuid) -> bool {
        self.liked.contains(&pet_id)
    }

    /// Name shown in logs and notifications
    pub fn display_name(&self) -> String {
        if !self.company_name.is_empty() {
            return self.company_name.clone();
        }
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// New user creation payload
///
/// The password must already be hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub phone: String,
    pub account_type: AccountType,
    pub telegram: String,
    pub instagram: String,
    pub password_hash: String,
}

/// User update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub account_type: Option<AccountType>,
    pub telegram: Option<String>,
    pub instagram: Option<String>,
    pub password_hash: Option<String>,
}
