//! Form rules shared by the server handlers and the typed client.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const NAME_MESSAGE: &str = "Name must be at least 2 characters";
pub const LENGTH_MESSAGE: &str = "Password must be at least 6 characters long";
pub const UPPERCASE_MESSAGE: &str = "Password must contain at least one uppercase letter";
pub const LOWERCASE_MESSAGE: &str = "Password must contain at least one lowercase letter";
pub const DIGIT_MESSAGE: &str = "Password must contain at least one number";
pub const SYMBOL_MESSAGE: &str = "Password must contain at least one special character";

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(EMAIL_MESSAGE)
    }
}

pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.trim().chars().count() >= MIN_NAME_LEN {
        Ok(())
    } else {
        Err(NAME_MESSAGE)
    }
}

/// The five registration predicates, each evaluable on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCheck {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub digit: bool,
    pub symbol: bool,
}

impl PasswordCheck {
    pub fn evaluate(password: &str) -> Self {
        Self {
            length: password.chars().count() >= MIN_PASSWORD_LEN,
            uppercase: password.chars().any(|c| c.is_uppercase()),
            lowercase: password.chars().any(|c| c.is_lowercase()),
            digit: password.chars().any(|c| c.is_ascii_digit()),
            symbol: password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
        }
    }

    pub fn passes(&self) -> bool {
        self.failures().is_empty()
    }

    /// Messages for every unmet predicate, in display order.
    pub fn failures(&self) -> Vec<&'static str> {
        [
            (self.length, LENGTH_MESSAGE),
            (self.uppercase, UPPERCASE_MESSAGE),
            (self.lowercase, LOWERCASE_MESSAGE),
            (self.digit, DIGIT_MESSAGE),
            (self.symbol, SYMBOL_MESSAGE),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, msg)| msg)
        .collect()
    }
}

pub fn validate_password(password: &str) -> Result<(), &'static str> {
    match PasswordCheck::evaluate(password).failures().first() {
        Some(msg) => Err(*msg),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn errors(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if let Err(e) = validate_email(&self.email) {
            errors.push(e);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(LENGTH_MESSAGE);
        }
        errors
    }

    pub fn can_submit(&self) -> bool {
        self.errors().is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterForm {
    pub fn errors(&self) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if let Err(e) = validate_name(&self.name) {
            errors.push(e);
        }
        if let Err(e) = validate_email(&self.email) {
            errors.push(e);
        }
        errors.extend(PasswordCheck::evaluate(&self.password).failures());
        errors
    }

    pub fn can_submit(&self) -> bool {
        self.errors().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_password_meets_every_predicate() {
        let check = PasswordCheck::evaluate("Passw0rd!");
        assert!(check.length && check.uppercase && check.lowercase && check.digit && check.symbol);
        assert!(check.passes());
    }

    #[test]
    fn lowercase_only_password_meets_length_and_lowercase() {
        let check = PasswordCheck::evaluate("password");
        assert_eq!(
            check,
            PasswordCheck {
                length: true,
                uppercase: false,
                lowercase: true,
                digit: false,
                symbol: false,
            }
        );
    }

    #[test]
    fn missing_uppercase_reports_the_uppercase_message() {
        assert_eq!(validate_password("passw0rd!"), Err(UPPERCASE_MESSAGE));
    }

    #[test]
    fn email_pattern() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("ada example@x.io").is_err());
    }

    #[test]
    fn login_form_blocks_until_valid() {
        let mut form = LoginForm {
            email: "ada@example.com".into(),
            password: "12345".into(),
        };
        assert!(!form.can_submit());
        form.password = "123456".into();
        assert!(form.can_submit());
    }

    #[test]
    fn register_form_collects_every_failure() {
        let form = RegisterForm {
            name: "A".into(),
            email: "bad".into(),
            password: "password".into(),
        };
        let errors = form.errors();
        assert!(errors.contains(&NAME_MESSAGE));
        assert!(errors.contains(&EMAIL_MESSAGE));
        assert!(errors.contains(&UPPERCASE_MESSAGE));
        assert!(!form.can_submit());
    }
}
