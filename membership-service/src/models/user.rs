//! User model.
//!
//! Users are provisioned by the external identity system; this service only
//! reads them and updates `membership_tier` on subscription activation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub membership_tier: String,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Cached projection of a user for read paths.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub full_name: String,
    pub membership_tier: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            full_name: user.full_name.clone(),
            membership_tier: user.membership_tier.clone(),
        }
    }
}
