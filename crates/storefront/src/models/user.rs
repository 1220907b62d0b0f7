//! Authenticated caller identity.

use serde::{Deserialize, Serialize};

use boostedlabs_core::UserId;

/// The user behind a verified access token.
///
/// Accounts live in the auth service; the storefront only sees the ID and,
/// when the token carries one, the username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Auth service user ID.
    pub id: UserId,
    /// Display name, if the token has one.
    pub username: Option<String>,
}

impl CurrentUser {
    /// Name shown on reviews and chat messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("user-{}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_id() {
        let named = CurrentUser {
            id: UserId::new(7),
            username: Some("ada".to_string()),
        };
        assert_eq!(named.display_name(), "ada");

        let anonymous = CurrentUser {
            id: UserId::new(7),
            username: Some("  ".to_string()),
        };
        assert_eq!(anonymous.display_name(), "user-7");
    }
}
