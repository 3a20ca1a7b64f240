//! User profile model
//!
//! One profile document per store, seeded on first initialization and only
//! removed when the store itself is destroyed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::currency::CurrencyCode;

/// Fixed document id of the singleton profile
pub const USER_DOC_ID: &str = "user::profile";

/// The store owner's profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// External identity this store belongs to
    pub user_id: String,

    /// Contact email (required claim of the bearer token)
    pub email: String,

    /// Display name shown in the UI
    pub display_name: String,

    /// Currency used for aggregate displays
    pub home_currency: CurrencyCode,

    /// BCP-47 locale tag for formatting
    pub locale: String,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last modified
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Seed a default profile for a fresh store
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        let email = email.into();
        let display_name = email.split('@').next().unwrap_or("user").to_string();
        Self {
            user_id: user_id.into(),
            email,
            display_name,
            home_currency: CurrencyCode::new("USD"),
            locale: "en-US".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults() {
        let profile = UserProfile::new("alice", "alice@example.com");
        assert_eq!(profile.user_id, "alice");
        assert_eq!(profile.display_name, "alice");
        assert_eq!(profile.home_currency.as_str(), "USD");
        assert_eq!(profile.locale, "en-US");
    }

    #[test]
    fn test_serialization() {
        let profile = UserProfile::new("alice", "alice@example.com");
        let json = serde_json::to_string(&profile).unwrap();
        let back: UserProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back.email, profile.email);
    }
}
