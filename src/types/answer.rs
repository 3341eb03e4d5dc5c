use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::account::AccountId;
use crate::types::question::{QuestionId, is_edited};
use crate::types::vote::Direction;
use handle_errors::Error;

pub const EXCERPT_LEN: usize = 200;

#[derive(Serialize, Debug, Clone)]
pub struct Answer {
    pub id: AnswerId,
    pub content: String,
    pub question_id: QuestionId,
    pub account_id: AccountId,
    pub author: String,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnswerId(pub i32);

impl std::fmt::Display for AnswerId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An answer as shown below its question.
#[derive(Debug, Clone)]
pub struct AnswerView {
    pub answer: Answer,
    pub score: i64,
    /// How the current viewer voted, if they did
    pub viewer_vote: Option<Direction>,
    /// Whether the current viewer wrote it
    pub by_viewer: bool,
}

impl AnswerView {
    pub fn is_upvoted(&self) -> bool {
        self.viewer_vote == Some(Direction::Up)
    }

    pub fn is_downvoted(&self) -> bool {
        self.viewer_vote == Some(Direction::Down)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AnswerForm {
    pub content: String,
}

impl AnswerForm {
    pub fn validate(&self) -> Result<String, Error> {
        let content = self.content.trim();
        if content.is_empty() {
            Err(Error::validation("Your answer is empty."))
        } else {
            Ok(content.to_string())
        }
    }
}

impl Answer {
    pub fn is_edited(&self) -> bool {
        is_edited(self.created_on, self.updated_on)
    }

    pub fn excerpt(&self) -> String {
        excerpt(&self.content)
    }
}

/// One-line preview: blank lines dropped, the rest trimmed and joined,
/// cut at `EXCERPT_LEN` characters.
pub fn excerpt(text: &str) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.chars().count() <= EXCERPT_LEN {
        joined
    } else {
        let cut: String = joined.chars().take(EXCERPT_LEN).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_joins_lines() {
        assert_eq!(
            excerpt("  Short answer.  \nWith newline.  "),
            "Short answer. With newline."
        );
    }

    #[test]
    fn excerpt_drops_blank_lines() {
        assert_eq!(excerpt("Line1\n\n \nLine2"), "Line1 Line2");
    }

    #[test]
    fn excerpt_truncates_long_text() {
        let text = format!("line1\n{}", "a".repeat(250));
        let expected = format!("{}...", &format!("line1 {}", "a".repeat(250))[..200]);
        assert_eq!(excerpt(&text), expected);
    }

    #[test]
    fn blank_answer_is_rejected() {
        let form = AnswerForm {
            content: " \n ".to_string(),
        };
        assert!(matches!(form.validate(), Err(Error::Validation(_))));
    }
}
