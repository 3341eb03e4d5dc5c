use serde::{Deserialize, Serialize};

use crate::types::answer::AnswerId;
use crate::types::question::QuestionId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn value(self) -> i16 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    pub fn from_value(value: i16) -> Option<Self> {
        match value {
            1 => Some(Direction::Up),
            -1 => Some(Direction::Down),
            _ => None,
        }
    }
}

/// What a vote is cast on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Question(QuestionId),
    Answer(AnswerId),
}

impl VoteTarget {
    pub fn id(self) -> i32 {
        match self {
            VoteTarget::Question(id) => id.0,
            VoteTarget::Answer(id) => id.0,
        }
    }

    /// Table holding the votes for this kind of target.
    pub fn vote_table(self) -> &'static str {
        match self {
            VoteTarget::Question(_) => "question_votes",
            VoteTarget::Answer(_) => "answer_votes",
        }
    }

    /// Foreign key column of `vote_table`.
    pub fn column(self) -> &'static str {
        match self {
            VoteTarget::Question(_) => "question_id",
            VoteTarget::Answer(_) => "answer_id",
        }
    }

    pub fn target_table(self) -> &'static str {
        match self {
            VoteTarget::Question(_) => "questions",
            VoteTarget::Answer(_) => "answers",
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            VoteTarget::Question(_) => "Question",
            VoteTarget::Answer(_) => "Answer",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct VoteForm {
    pub direction: Direction,
}

/// The row change needed to apply a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert(Direction),
    Remove,
    Flip(Direction),
}

/// Voting twice in the same direction takes the vote back, voting the
/// other way flips it in place.
pub fn resolve(existing: Option<Direction>, requested: Direction) -> VoteChange {
    match existing {
        None => VoteChange::Insert(requested),
        Some(current) if current == requested => VoteChange::Remove,
        Some(_) => VoteChange::Flip(requested),
    }
}

/// Score contribution of a change, relative to the previous state.
pub fn score_delta(existing: Option<Direction>, change: VoteChange) -> i64 {
    let before = existing.map_or(0, |d| i64::from(d.value()));
    let after = match change {
        VoteChange::Insert(d) | VoteChange::Flip(d) => i64::from(d.value()),
        VoteChange::Remove => 0,
    };
    after - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Direction::Up, VoteChange::Insert(Direction::Up), 1)]
    #[case(None, Direction::Down, VoteChange::Insert(Direction::Down), -1)]
    #[case(Some(Direction::Up), Direction::Up, VoteChange::Remove, -1)]
    #[case(Some(Direction::Down), Direction::Down, VoteChange::Remove, 1)]
    #[case(Some(Direction::Up), Direction::Down, VoteChange::Flip(Direction::Down), -2)]
    #[case(Some(Direction::Down), Direction::Up, VoteChange::Flip(Direction::Up), 2)]
    fn vote_transitions(
        #[case] existing: Option<Direction>,
        #[case] requested: Direction,
        #[case] change: VoteChange,
        #[case] delta: i64,
    ) {
        assert_eq!(resolve(existing, requested), change);
        assert_eq!(score_delta(existing, change), delta);
    }

    #[test]
    fn upvoting_twice_returns_to_zero() {
        let mut score = 0;
        let mut current = None;
        for _ in 0..2 {
            let change = resolve(current, Direction::Up);
            score += score_delta(current, change);
            current = match change {
                VoteChange::Insert(d) | VoteChange::Flip(d) => Some(d),
                VoteChange::Remove => None,
            };
        }
        assert_eq!(score, 0);
        assert_eq!(current, None);
    }

    #[test]
    fn stored_values_round_trip() {
        assert_eq!(Direction::from_value(Direction::Up.value()), Some(Direction::Up));
        assert_eq!(Direction::from_value(0), None);
    }

    #[test]
    fn targets_map_to_their_tables() {
        let target = VoteTarget::Answer(AnswerId(7));
        assert_eq!(target.vote_table(), "answer_votes");
        assert_eq!(target.column(), "answer_id");
        assert_eq!(target.id(), 7);
    }
}
