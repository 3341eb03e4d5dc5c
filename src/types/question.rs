use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::account::AccountId;
use crate::types::tag::parse_tag_names;
use handle_errors::Error;

pub const TITLE_MAX_LEN: usize = 200;

#[derive(Serialize, Debug, Clone)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub account_id: AccountId,
    pub author: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionId(pub i32);

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row of a question listing.
#[derive(Serialize, Debug, Clone)]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub title: String,
    pub author: String,
    pub tags: Vec<String>,
    pub score: i64,
    pub answer_count: i64,
    pub view_count: i64,
    pub created_on: DateTime<Utc>,
}

/// Raw ask/edit form as posted by the browser.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct QuestionForm {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: String,
}

/// A validated question, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

impl Question {
    pub fn is_edited(&self) -> bool {
        is_edited(self.created_on, self.updated_on)
    }

    /// Prefills the edit form.
    pub fn to_form(&self) -> QuestionForm {
        QuestionForm {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: self.tags.join(", "),
        }
    }
}

impl QuestionForm {
    pub fn validate(&self) -> Result<NewQuestion, Error> {
        let title = self.title.trim();
        let content = self.content.trim();
        let mut errors = Vec::new();

        if title.is_empty() {
            errors.push("Title is required.".to_string());
        } else if title.chars().count() > TITLE_MAX_LEN {
            errors.push(format!(
                "Title must be at most {} characters.",
                TITLE_MAX_LEN
            ));
        }
        if content.is_empty() {
            errors.push("Description is required.".to_string());
        }
        let tags = match parse_tag_names(&self.tags) {
            Ok(tags) if tags.is_empty() => {
                errors.push("At least one tag is required.".to_string());
                tags
            }
            Ok(tags) => tags,
            Err(tag_errors) => {
                errors.extend(tag_errors);
                Vec::new()
            }
        };

        if errors.is_empty() {
            Ok(NewQuestion {
                title: title.to_string(),
                content: content.to_string(),
                tags,
            })
        } else {
            Err(Error::Validation(errors))
        }
    }
}

/// Saving within the same second as creation does not count as an edit.
pub fn is_edited(created_on: DateTime<Utc>, updated_on: DateTime<Utc>) -> bool {
    updated_on - created_on >= Duration::seconds(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str, content: &str, tags: &str) -> QuestionForm {
        QuestionForm {
            title: title.to_string(),
            content: content.to_string(),
            tags: tags.to_string(),
        }
    }

    #[test]
    fn valid_form_is_trimmed() {
        let question = form("  How do I borrow?  ", " body ", "rust").validate().unwrap();
        assert_eq!(
            question,
            NewQuestion {
                title: "How do I borrow?".to_string(),
                content: "body".to_string(),
                tags: vec!["rust".to_string()],
            }
        );
    }

    #[test]
    fn empty_fields_are_reported_together() {
        match form(" ", "", "").validate() {
            Err(Error::Validation(errors)) => assert_eq!(
                errors,
                vec![
                    "Title is required.",
                    "Description is required.",
                    "At least one tag is required."
                ]
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn long_title_is_rejected() {
        let title = "x".repeat(TITLE_MAX_LEN + 1);
        assert!(form(&title, "body", "rust").validate().is_err());
        let title = "x".repeat(TITLE_MAX_LEN);
        assert!(form(&title, "body", "rust").validate().is_ok());
    }

    #[test]
    fn edited_needs_a_full_second() {
        let now = Utc::now();
        assert!(!is_edited(now, now));
        assert!(!is_edited(now - Duration::microseconds(999_999), now));
        assert!(is_edited(now - Duration::minutes(10), now));
    }
}
