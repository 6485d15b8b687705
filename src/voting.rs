//! Ballot handling: deciding whether a vote may be cast and applying it

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use thiserror::Error;

use crate::models::{VoteOutcome, Voter};
use crate::store::{PollStore, StoreError};

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("question {0} does not exist")]
    QuestionNotFound(i32),
    #[error("no valid choice was selected")]
    InvalidChoice,
    #[error("the question is not open for voting")]
    VotingClosed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct VotingService {
    store: Arc<dyn PollStore>,
}

impl VotingService {
    pub fn new(store: Arc<dyn PollStore>) -> Self {
        Self { store }
    }

    /**
     * Cast `voter`'s ballot for `choice_id` on the question.
     *
     * The window is checked before the choice, so a closed question reports
     * `VotingClosed` whatever was submitted.
     */
    pub async fn cast_vote(
        &self,
        voter: &Voter,
        question_id: i32,
        choice_id: Option<i32>,
        now: DateTime<Utc>,
    ) -> Result<VoteOutcome, VoteError> {
        let question = self
            .store
            .question(question_id)
            .await?
            .ok_or(VoteError::QuestionNotFound(question_id))?;

        if !question.can_vote(now) {
            debug!("Rejecting ballot for closed question {}", question.id);
            return Err(VoteError::VotingClosed);
        }

        let choice = match choice_id {
            Some(choice_id) => self.store.choice(question.id, choice_id).await?,
            None => None,
        };
        let choice = choice.ok_or(VoteError::InvalidChoice)?;

        let outcome = self.store.record_vote(voter, &choice).await?;
        info!(
            "Ballot from {} on question {} for choice {}: {}",
            voter.as_str(),
            question.id,
            choice.id,
            outcome.as_str()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Choice;
    use crate::store::{MemoryStore, NewQuestion};
    use chrono::Duration;

    async fn setup(published: Duration, ends: Option<Duration>) -> (Arc<MemoryStore>, VotingService, i32, Vec<Choice>) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let (question, choices) = store
            .create_question(NewQuestion {
                text: "Best editor?".into(),
                published_at: now + published,
                ends_at: ends.map(|offset| now + offset),
                choices: vec!["vim".into(), "emacs".into()],
            })
            .await
            .unwrap();
        let service = VotingService::new(store.clone());
        (store, service, question.id, choices)
    }

    async fn total_votes(store: &MemoryStore, question_id: i32) -> u32 {
        store.tally(question_id).await.unwrap().into_iter().map(|(_, n)| n).sum()
    }

    #[async_std::test]
    async fn test_record_then_unchanged_then_changed() {
        let (store, service, id, choices) = setup(-Duration::days(30), None).await;
        let voter = Voter::new("alice").unwrap();
        let now = Utc::now();

        let outcome = service.cast_vote(&voter, id, Some(choices[0].id), now).await.unwrap();
        assert_eq!(VoteOutcome::Recorded, outcome);

        let outcome = service.cast_vote(&voter, id, Some(choices[0].id), now).await.unwrap();
        assert_eq!(VoteOutcome::Unchanged, outcome);

        let outcome = service.cast_vote(&voter, id, Some(choices[1].id), now).await.unwrap();
        assert_eq!(VoteOutcome::Changed, outcome);

        let vote = store.find_vote(&voter, id).await.unwrap().unwrap();
        assert_eq!(choices[1].id, vote.choice_id);
        assert_eq!(1, total_votes(&store, id).await);
    }

    #[async_std::test]
    async fn test_same_choice_twice_keeps_vote() {
        let (store, service, id, choices) = setup(-Duration::days(1), None).await;
        let voter = Voter::new("alice").unwrap();
        let now = Utc::now();

        service.cast_vote(&voter, id, Some(choices[1].id), now).await.unwrap();
        let before = store.find_vote(&voter, id).await.unwrap();
        service.cast_vote(&voter, id, Some(choices[1].id), now).await.unwrap();
        let after = store.find_vote(&voter, id).await.unwrap();

        assert!(before.is_some());
        assert_eq!(before, after);
    }

    #[async_std::test]
    async fn test_future_question_is_closed() {
        let (store, service, id, choices) = setup(Duration::days(30), None).await;
        let voter = Voter::new("alice").unwrap();

        let result = service.cast_vote(&voter, id, Some(choices[0].id), Utc::now()).await;
        assert!(matches!(result, Err(VoteError::VotingClosed)));
        assert!(store.find_vote(&voter, id).await.unwrap().is_none());
    }

    #[async_std::test]
    async fn test_ended_question_is_closed() {
        let (store, service, id, choices) = setup(-Duration::days(10), Some(-Duration::days(1))).await;
        let voter = Voter::new("alice").unwrap();

        let result = service.cast_vote(&voter, id, Some(choices[0].id), Utc::now()).await;
        assert!(matches!(result, Err(VoteError::VotingClosed)));
        assert_eq!(0, total_votes(&store, id).await);
    }

    #[async_std::test]
    async fn test_closed_wins_over_bad_choice() {
        let (_, service, id, _) = setup(Duration::days(1), None).await;
        let voter = Voter::new("alice").unwrap();

        let result = service.cast_vote(&voter, id, None, Utc::now()).await;
        assert!(matches!(result, Err(VoteError::VotingClosed)));
    }

    #[async_std::test]
    async fn test_missing_choice() {
        let (store, service, id, _) = setup(-Duration::days(1), None).await;
        let voter = Voter::new("alice").unwrap();

        let result = service.cast_vote(&voter, id, None, Utc::now()).await;
        assert!(matches!(result, Err(VoteError::InvalidChoice)));
        assert_eq!(0, total_votes(&store, id).await);
    }

    #[async_std::test]
    async fn test_choice_from_another_question() {
        let (store, service, id, _) = setup(-Duration::days(1), None).await;
        let (_, others) = store
            .create_question(NewQuestion {
                text: "Tabs or spaces?".into(),
                published_at: Utc::now() - Duration::days(1),
                ends_at: None,
                choices: vec!["tabs".into()],
            })
            .await
            .unwrap();
        let voter = Voter::new("alice").unwrap();

        let result = service.cast_vote(&voter, id, Some(others[0].id), Utc::now()).await;
        assert!(matches!(result, Err(VoteError::InvalidChoice)));
    }

    #[async_std::test]
    async fn test_unknown_question() {
        let (_, service, _, _) = setup(-Duration::days(1), None).await;
        let voter = Voter::new("alice").unwrap();

        let result = service.cast_vote(&voter, 999, Some(1), Utc::now()).await;
        assert!(matches!(result, Err(VoteError::QuestionNotFound(999))));
    }

    #[async_std::test]
    async fn test_voters_are_independent() {
        let (store, service, id, choices) = setup(-Duration::days(1), None).await;
        let alice = Voter::new("alice").unwrap();
        let bob = Voter::new("bob").unwrap();
        let now = Utc::now();

        service.cast_vote(&alice, id, Some(choices[0].id), now).await.unwrap();
        let outcome = service.cast_vote(&bob, id, Some(choices[1].id), now).await.unwrap();

        assert_eq!(VoteOutcome::Recorded, outcome);
        assert_eq!(2, total_votes(&store, id).await);
    }
}
