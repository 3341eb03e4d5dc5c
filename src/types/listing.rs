//! Named sort/filter modes of the listing pages.
//!
//! Every page falls back to its default tab when the `tab` query parameter
//! is missing or unknown; matching ignores case.

use chrono::{DateTime, Utc};

use crate::types::question::QuestionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionTab {
    Newest,
    Unanswered,
    Popular,
    Score,
}

impl QuestionTab {
    pub const ALL: [QuestionTab; 4] = [
        QuestionTab::Newest,
        QuestionTab::Unanswered,
        QuestionTab::Popular,
        QuestionTab::Score,
    ];

    pub fn from_param(tab: Option<&str>) -> Self {
        match tab.map(str::to_lowercase).as_deref() {
            Some("unanswered") => QuestionTab::Unanswered,
            Some("popular") => QuestionTab::Popular,
            Some("score") => QuestionTab::Score,
            _ => QuestionTab::Newest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QuestionTab::Newest => "newest",
            QuestionTab::Unanswered => "unanswered",
            QuestionTab::Popular => "popular",
            QuestionTab::Score => "score",
        }
    }

    /// Extra `WHERE` condition of the listing query.
    pub fn condition(self) -> &'static str {
        match self {
            QuestionTab::Unanswered => {
                "AND NOT EXISTS (SELECT 1 FROM answers ua WHERE ua.question_id = q.id)"
            }
            _ => "",
        }
    }

    /// `ORDER BY` clause of the listing query. Ties go to the newest question.
    pub fn order_by(self) -> &'static str {
        match self {
            QuestionTab::Newest | QuestionTab::Unanswered => "q.created_on DESC, q.id DESC",
            QuestionTab::Popular => "view_count DESC, q.created_on DESC, q.id DESC",
            QuestionTab::Score => "score DESC, q.created_on DESC, q.id DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTab {
    Popular,
    New,
    Name,
}

impl TagTab {
    pub const ALL: [TagTab; 3] = [TagTab::Popular, TagTab::New, TagTab::Name];

    pub fn from_param(tab: Option<&str>) -> Self {
        match tab.map(str::to_lowercase).as_deref() {
            Some("new") => TagTab::New,
            Some("name") => TagTab::Name,
            _ => TagTab::Popular,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagTab::Popular => "popular",
            TagTab::New => "new",
            TagTab::Name => "name",
        }
    }

    pub fn order_by(self) -> &'static str {
        match self {
            TagTab::Popular => "question_count DESC, t.name ASC",
            TagTab::New => "t.created_on DESC, t.id DESC",
            TagTab::Name => "LOWER(t.name) ASC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTab {
    Overview,
    Questions,
    Answers,
    Upvoted,
    Downvoted,
}

impl ProfileTab {
    pub const ALL: [ProfileTab; 5] = [
        ProfileTab::Overview,
        ProfileTab::Questions,
        ProfileTab::Answers,
        ProfileTab::Upvoted,
        ProfileTab::Downvoted,
    ];

    pub fn from_param(tab: Option<&str>) -> Self {
        match tab.map(str::to_lowercase).as_deref() {
            Some("questions") => ProfileTab::Questions,
            Some("answers") => ProfileTab::Answers,
            Some("upvoted") => ProfileTab::Upvoted,
            Some("downvoted") => ProfileTab::Downvoted,
            _ => ProfileTab::Overview,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProfileTab::Overview => "overview",
            ProfileTab::Questions => "questions",
            ProfileTab::Answers => "answers",
            ProfileTab::Upvoted => "upvoted",
            ProfileTab::Downvoted => "downvoted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Question,
    Answer,
}

/// A question or answer on a profile page.
#[derive(Debug, Clone)]
pub struct Activity {
    pub kind: ActivityKind,
    pub question_id: QuestionId,
    pub title: String,
    pub excerpt: String,
    pub score: i64,
    pub created_on: DateTime<Utc>,
}

impl Activity {
    pub fn is_question(&self) -> bool {
        self.kind == ActivityKind::Question
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, QuestionTab::Newest)]
    #[case(Some("invalid"), QuestionTab::Newest)]
    #[case(Some("Unanswered"), QuestionTab::Unanswered)]
    #[case(Some("POPULAR"), QuestionTab::Popular)]
    #[case(Some("score"), QuestionTab::Score)]
    fn question_tabs(#[case] param: Option<&str>, #[case] expected: QuestionTab) {
        assert_eq!(QuestionTab::from_param(param), expected);
    }

    #[rstest]
    #[case(None, TagTab::Popular)]
    #[case(Some("nonsense"), TagTab::Popular)]
    #[case(Some("New"), TagTab::New)]
    #[case(Some("name"), TagTab::Name)]
    fn tag_tabs(#[case] param: Option<&str>, #[case] expected: TagTab) {
        assert_eq!(TagTab::from_param(param), expected);
    }

    #[test]
    fn profile_defaults_to_overview() {
        assert_eq!(ProfileTab::from_param(None), ProfileTab::Overview);
        assert_eq!(ProfileTab::from_param(Some("Downvoted")), ProfileTab::Downvoted);
    }

    #[test]
    fn only_unanswered_filters_rows() {
        for tab in QuestionTab::ALL {
            assert_eq!(tab.condition().is_empty(), tab != QuestionTab::Unanswered);
            assert_eq!(QuestionTab::from_param(Some(tab.as_str())), tab);
        }
    }
}
