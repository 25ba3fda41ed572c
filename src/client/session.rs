use std::collections::HashMap;

use parking_lot::RwLock;

use crate::auth::AuthResponse;
use crate::models::Role;

pub const TOKEN: &str = "token";
pub const USER: &str = "user";
pub const ROLE: &str = "role";
pub const EMAIL: &str = "email";
pub const NAME: &str = "name";

/// Client-side session: what a browser would keep in local storage.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: RwLock<HashMap<String, String>>,
    redirect: RwLock<Option<String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.slots.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.slots.write().insert(key.to_string(), value.into());
    }

    /// The `token` slot, falling back to a `token` field inside the stored user.
    pub fn bearer_token(&self) -> Option<String> {
        if let Some(token) = self.get(TOKEN).filter(|t| !t.is_empty()) {
            return Some(token);
        }
        let user = self.get(USER)?;
        let value: serde_json::Value = serde_json::from_str(&user).ok()?;
        value
            .get("token")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    pub fn role(&self) -> Option<Role> {
        self.get(ROLE).and_then(|r| Role::parse(&r))
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    pub fn persist_login(&self, auth: &AuthResponse) {
        self.set(TOKEN, auth.token.clone());
        if let Ok(user) = serde_json::to_string(&auth.user) {
            self.set(USER, user);
        }
        self.set(ROLE, auth.user.role.as_str());
        self.set(EMAIL, auth.user.email.clone());
        self.set(NAME, auth.user.name.clone());
    }

    pub fn clear(&self) {
        self.slots.write().clear();
    }

    pub fn set_redirect(&self, path: &str) {
        *self.redirect.write() = Some(path.to_string());
    }

    pub fn take_redirect(&self) -> Option<String> {
        self.redirect.write().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_falls_back_to_the_stored_user() {
        let session = SessionStore::new();
        assert_eq!(session.bearer_token(), None);
        session.set(USER, r#"{"name":"Ada","token":"abc"}"#);
        assert_eq!(session.bearer_token().as_deref(), Some("abc"));
        session.set(TOKEN, "direct");
        assert_eq!(session.bearer_token().as_deref(), Some("direct"));
    }

    #[test]
    fn clear_wipes_every_slot() {
        let session = SessionStore::new();
        session.set(TOKEN, "t");
        session.set(ROLE, "admin");
        session.clear();
        assert!(!session.is_authenticated());
        assert_eq!(session.role(), None);
    }
}
