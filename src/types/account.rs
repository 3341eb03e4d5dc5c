use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use handle_errors::Error;

pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

/// Claims carried by the session token.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Session {
    pub exp: DateTime<Utc>,
    pub account_id: AccountId,
    pub username: String,
    pub nbf: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// argon2 encoded hash, never the plain text
    pub password: String,
    pub created_on: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId(pub i32);

#[derive(Deserialize, Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

impl NewAccount {
    /// Checks the sign-up form and returns the trimmed username.
    pub fn validate(&self) -> Result<String, Error> {
        let username = self.username.trim();
        let mut errors = validate_username(username);
        if self.password != self.password_confirmation {
            errors.push("The two password fields didn't match.".to_string());
        }
        errors.extend(validate_password(&self.password));

        if errors.is_empty() {
            Ok(username.to_string())
        } else {
            Err(Error::Validation(errors))
        }
    }
}

pub fn validate_username(username: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if username.is_empty() {
        errors.push("Username is required.".to_string());
    }
    if username.chars().count() > USERNAME_MAX_LEN {
        errors.push(format!(
            "Username must be at most {} characters.",
            USERNAME_MAX_LEN
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
    {
        errors.push("Username may contain only letters, digits and @/./+/-/_.".to_string());
    }
    errors
}

/// Password complexity rules. Every broken rule is reported.
pub fn validate_password(password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(format!(
            "Password must be at least {} characters long.",
            PASSWORD_MIN_LEN
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        errors.push("Password must contain at least one uppercase letter.".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        errors.push("Password must contain at least one lowercase letter.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one digit.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_punctuation()) {
        errors.push("Password must contain at least one special character.".to_string());
    }
    errors
}

/// Only the author may change or remove a piece of content.
pub fn ensure_author(author: AccountId, actor: AccountId) -> Result<(), Error> {
    if author == actor {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn new_account(username: &str, password: &str, confirmation: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password: password.to_string(),
            password_confirmation: confirmation.to_string(),
        }
    }

    #[test]
    fn strong_password_passes() {
        assert!(validate_password("Sup3r-secret").is_empty());
    }

    #[rstest]
    #[case("Sh0rt!", "at least 8 characters")]
    #[case("lowercase1!", "uppercase letter")]
    #[case("UPPERCASE1!", "lowercase letter")]
    #[case("NoDigits!!", "one digit")]
    #[case("NoSpecial12", "special character")]
    fn weak_password_is_reported(#[case] password: &str, #[case] expected: &str) {
        let errors = validate_password(password);
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains(expected));
    }

    #[test]
    fn every_broken_rule_is_listed() {
        assert_eq!(validate_password("abc").len(), 4);
    }

    #[rstest]
    #[case("")]
    #[case("has space")]
    #[case("semi;colon")]
    fn bad_usernames_are_rejected(#[case] username: &str) {
        assert!(!validate_username(username).is_empty());
    }

    #[test]
    fn long_username_is_rejected() {
        let username = "a".repeat(USERNAME_MAX_LEN + 1);
        assert_eq!(validate_username(&username).len(), 1);
    }

    #[test]
    fn sign_up_trims_username() {
        let account = new_account("  ada.l@example  ", "Sup3r-secret", "Sup3r-secret");
        assert_eq!(account.validate().unwrap(), "ada.l@example");
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let account = new_account("ada", "Sup3r-secret", "Sup3r-secreT");
        match account.validate() {
            Err(Error::Validation(errors)) => {
                assert_eq!(errors, vec!["The two password fields didn't match."])
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn only_the_author_passes() {
        assert!(ensure_author(AccountId(1), AccountId(1)).is_ok());
        assert!(matches!(
            ensure_author(AccountId(1), AccountId(2)),
            Err(Error::Forbidden)
        ));
    }
}
