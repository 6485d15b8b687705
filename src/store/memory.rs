use async_std::sync::Mutex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;

use super::{NewQuestion, PollStore, StoreError};
use crate::models::{Choice, Question, Vote, VoteOutcome, Voter};

#[derive(Debug, Default)]
struct Tables {
    questions: Vec<Question>,
    choices: Vec<Choice>,
    votes: Vec<Vote>,
    last_question_id: i32,
    last_choice_id: i32,
    last_vote_id: i32,
}

impl Tables {
    fn insert_vote(&mut self, voter: &Voter, choice: &Choice) {
        self.last_vote_id += 1;
        self.votes.push(Vote {
            id: self.last_vote_id,
            voter: voter.as_str().to_string(),
            question_id: choice.question_id,
            choice_id: choice.id,
            created_at: Utc::now(),
        });
    }
}

/**
 * A process-local store.
 *
 * All tables sit behind a single lock, so every operation is atomic with
 * respect to every other one.
 */
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn create_question(&self, new: NewQuestion) -> Result<(Question, Vec<Choice>), StoreError> {
        let mut tables = self.tables.lock().await;

        tables.last_question_id += 1;
        let question = Question {
            id: tables.last_question_id,
            text: new.text,
            published_at: new.published_at,
            ends_at: new.ends_at,
        };
        tables.questions.push(question.clone());

        let mut choices = Vec::with_capacity(new.choices.len());
        for text in new.choices {
            tables.last_choice_id += 1;
            let choice = Choice {
                id: tables.last_choice_id,
                question_id: question.id,
                text,
            };
            tables.choices.push(choice.clone());
            choices.push(choice);
        }

        debug!("Created question {} with {} choices", question.id, choices.len());
        Ok((question, choices))
    }

    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>, StoreError> {
        let tables = self.tables.lock().await;
        let mut published: Vec<Question> = tables
            .questions
            .iter()
            .filter(|q| q.is_published(now))
            .cloned()
            .collect();
        published.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(published)
    }

    async fn question(&self, id: i32) -> Result<Option<Question>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn choices(&self, question_id: i32) -> Result<Vec<Choice>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .iter()
            .filter(|c| c.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn choice(&self, question_id: i32, choice_id: i32) -> Result<Option<Choice>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .iter()
            .find(|c| c.id == choice_id && c.question_id == question_id)
            .cloned())
    }

    async fn find_vote(&self, voter: &Voter, question_id: i32) -> Result<Option<Vote>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .votes
            .iter()
            .find(|v| v.voter == voter.as_str() && v.question_id == question_id)
            .cloned())
    }

    async fn record_vote(&self, voter: &Voter, choice: &Choice) -> Result<VoteOutcome, StoreError> {
        let mut tables = self.tables.lock().await;

        if !tables.questions.iter().any(|q| q.id == choice.question_id) {
            return Err(StoreError::MissingQuestion(choice.question_id));
        }

        let existing = tables
            .votes
            .iter()
            .position(|v| v.voter == voter.as_str() && v.question_id == choice.question_id);

        match existing {
            Some(index) if tables.votes[index].choice_id == choice.id => Ok(VoteOutcome::Unchanged),
            Some(index) => {
                let vote = &mut tables.votes[index];
                vote.choice_id = choice.id;
                vote.created_at = Utc::now();
                Ok(VoteOutcome::Changed)
            }
            None => {
                tables.insert_vote(voter, choice);
                Ok(VoteOutcome::Recorded)
            }
        }
    }

    async fn tally(&self, question_id: i32) -> Result<Vec<(Choice, u32)>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .choices
            .iter()
            .filter(|c| c.question_id == question_id)
            .map(|c| {
                let count = tables.votes.iter().filter(|v| v.choice_id == c.id).count();
                (c.clone(), count as u32)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_question(text: &str, published_at: DateTime<Utc>) -> NewQuestion {
        NewQuestion {
            text: text.into(),
            published_at,
            ends_at: None,
            choices: vec!["Yes".into(), "No".into()],
        }
    }

    #[async_std::test]
    async fn test_list_published_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.create_question(new_question("old", now - Duration::days(30))).await.unwrap();
        store.create_question(new_question("future", now + Duration::days(30))).await.unwrap();
        store.create_question(new_question("recent", now - Duration::days(5))).await.unwrap();

        let listed: Vec<String> = store
            .list_published(now)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.text)
            .collect();
        assert_eq!(vec!["recent", "old"], listed);
    }

    #[async_std::test]
    async fn test_choice_must_belong_to_question() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let (first, first_choices) = store.create_question(new_question("a", now)).await.unwrap();
        let (second, _) = store.create_question(new_question("b", now)).await.unwrap();

        let foreign = first_choices[0].id;
        assert!(store.choice(first.id, foreign).await.unwrap().is_some());
        assert!(store.choice(second.id, foreign).await.unwrap().is_none());
    }

    #[async_std::test]
    async fn test_record_vote_transitions() {
        let store = MemoryStore::new();
        let voter = Voter::new("alice").unwrap();
        let (question, choices) = store.create_question(new_question("q", Utc::now())).await.unwrap();

        assert_eq!(VoteOutcome::Recorded, store.record_vote(&voter, &choices[0]).await.unwrap());
        let first = store.find_vote(&voter, question.id).await.unwrap().unwrap();

        assert_eq!(VoteOutcome::Unchanged, store.record_vote(&voter, &choices[0]).await.unwrap());
        assert_eq!(Some(first), store.find_vote(&voter, question.id).await.unwrap());

        assert_eq!(VoteOutcome::Changed, store.record_vote(&voter, &choices[1]).await.unwrap());
        let replaced = store.find_vote(&voter, question.id).await.unwrap().unwrap();
        assert_eq!(choices[1].id, replaced.choice_id);

        let counts: Vec<u32> = store.tally(question.id).await.unwrap().into_iter().map(|(_, n)| n).collect();
        assert_eq!(vec![0, 1], counts);
    }

    #[async_std::test]
    async fn test_record_vote_unknown_question() {
        let store = MemoryStore::new();
        let voter = Voter::new("alice").unwrap();
        let orphan = Choice {
            id: 7,
            question_id: 42,
            text: "nope".into(),
        };
        match store.record_vote(&voter, &orphan).await {
            Err(StoreError::MissingQuestion(42)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[async_std::test]
    async fn test_concurrent_ballots_leave_one_vote() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let voter = Voter::new("bob").unwrap();
        let (question, choices) = store.create_question(new_question("q", Utc::now())).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            let voter = voter.clone();
            let choice = choices[i % 2].clone();
            handles.push(async_std::task::spawn(async move {
                store.record_vote(&voter, &choice).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await;
        }

        let total: u32 = store.tally(question.id).await.unwrap().into_iter().map(|(_, n)| n).sum();
        assert_eq!(1, total);
    }
}
