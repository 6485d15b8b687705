use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/**
 * A poll question, visible once `published_at` has passed and open for
 * voting until `ends_at` (forever when unset)
 */
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Question {
    pub id: i32,
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Question {
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.published_at <= now
    }

    /**
     * True when the question went live at most one day before `now`.
     *
     * Questions scheduled for the future are never recent.
     */
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.published_at && self.published_at <= now
    }

    /**
     * Voting window check, both ends inclusive
     */
    pub fn can_vote(&self, now: DateTime<Utc>) -> bool {
        if !self.is_published(now) {
            return false;
        }
        match self.ends_at {
            Some(ends_at) => now <= ends_at,
            None => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i32,
    pub question_id: i32,
    pub text: String,
}

/**
 * One voter's selection for one question
 */
#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Vote {
    pub id: i32,
    pub voter: String,
    pub question_id: i32,
    pub choice_id: i32,
    pub created_at: DateTime<Utc>,
}

/**
 * Identity of an authenticated user, as handed to us by whatever sits in
 * front of the application
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Voter(String);

impl Voter {
    /// Blank identities are treated as anonymous
    pub fn new(identity: &str) -> Option<Self> {
        let identity = identity.trim();
        if identity.is_empty() {
            None
        } else {
            Some(Voter(identity.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/**
 * What happened to the stored vote after a ballot was accepted
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Recorded,
    Unchanged,
    Changed,
}

impl VoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Recorded => "recorded",
            VoteOutcome::Unchanged => "unchanged",
            VoteOutcome::Changed => "changed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recorded" => Some(VoteOutcome::Recorded),
            "unchanged" => Some(VoteOutcome::Unchanged),
            "changed" => Some(VoteOutcome::Changed),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            VoteOutcome::Recorded => "Your vote was recorded.",
            VoteOutcome::Unchanged => "You already voted for that choice.",
            VoteOutcome::Changed => "Your vote was changed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(published: Duration, ends: Option<Duration>) -> (Question, DateTime<Utc>) {
        let now = Utc::now();
        let question = Question {
            id: 1,
            text: "What's up?".into(),
            published_at: now + published,
            ends_at: ends.map(|offset| now + offset),
        };
        (question, now)
    }

    #[test]
    fn test_recent_with_future_question() {
        let (q, now) = question(Duration::days(30), None);
        assert!(!q.was_published_recently(now));
    }

    #[test]
    fn test_recent_with_old_question() {
        let (q, now) = question(-(Duration::days(1) + Duration::seconds(1)), None);
        assert!(!q.was_published_recently(now));
    }

    #[test]
    fn test_recent_with_recent_question() {
        let offset = Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59);
        let (q, now) = question(-offset, None);
        assert!(q.was_published_recently(now));
    }

    #[test]
    fn test_recent_at_exact_boundaries() {
        let (q, now) = question(Duration::zero(), None);
        assert!(q.was_published_recently(now));
        let (q, now) = question(-Duration::days(1), None);
        assert!(q.was_published_recently(now));
    }

    #[test]
    fn test_is_published() {
        let (q, now) = question(Duration::days(1), None);
        assert!(!q.is_published(now));
        let (q, now) = question(-Duration::days(1), None);
        assert!(q.is_published(now));
        let (q, now) = question(Duration::zero(), None);
        assert!(q.is_published(now));
    }

    #[test]
    fn test_cannot_vote_after_end() {
        let (q, now) = question(Duration::zero(), Some(-Duration::days(1)));
        assert!(!q.can_vote(now));
    }

    #[test]
    fn test_cannot_vote_before_publish() {
        let (q, now) = question(Duration::days(1), Some(Duration::days(11)));
        assert!(!q.can_vote(now));
    }

    #[test]
    fn test_can_vote_published_now() {
        let (q, now) = question(Duration::zero(), Some(Duration::days(1)));
        assert!(q.can_vote(now));
    }

    #[test]
    fn test_can_vote_inside_window() {
        let (q, now) = question(-Duration::days(1), Some(Duration::days(1)));
        assert!(q.can_vote(now));
    }

    #[test]
    fn test_can_vote_without_end() {
        let (q, now) = question(-Duration::days(30), None);
        assert!(q.can_vote(now));
    }

    #[test]
    fn test_can_vote_on_end_instant() {
        let (q, now) = question(-Duration::days(1), Some(Duration::zero()));
        assert!(q.can_vote(now));
    }

    #[test]
    fn test_blank_voter_is_anonymous() {
        assert_eq!(None, Voter::new("   "));
        assert_eq!(Some("alice"), Voter::new(" alice ").as_ref().map(Voter::as_str));
    }

    #[test]
    fn test_outcome_names() {
        for outcome in &[VoteOutcome::Recorded, VoteOutcome::Unchanged, VoteOutcome::Changed] {
            assert_eq!(Some(*outcome), VoteOutcome::parse(outcome.as_str()));
        }
        assert_eq!(None, VoteOutcome::parse("bogus"));
    }
}
