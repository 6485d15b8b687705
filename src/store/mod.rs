//! Everything that persists questions, choices and votes.
//!
//! Handlers and the voting service only ever see the `PollStore` trait, which
//! lets the application run against PostgreSQL or entirely in memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Choice, Question, Vote, VoteOutcome, Voter};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("question {0} does not exist")]
    MissingQuestion(i32),
    #[error("ballot on question {0} kept losing its vote row to concurrent changes")]
    Contended(i32),
}

/**
 * Everything needed to create a question along with its choices
 */
#[derive(Clone, Debug)]
pub struct NewQuestion {
    pub text: String,
    pub published_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub choices: Vec<String>,
}

#[async_trait]
pub trait PollStore: Send + Sync {
    /**
     * Insert the question and all of its choices as one unit
     */
    async fn create_question(&self, new: NewQuestion) -> Result<(Question, Vec<Choice>), StoreError>;

    /**
     * Questions published at or before `now`, most recently published first
     */
    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>, StoreError>;

    async fn question(&self, id: i32) -> Result<Option<Question>, StoreError>;

    /// Choices for the question in creation order
    async fn choices(&self, question_id: i32) -> Result<Vec<Choice>, StoreError>;

    /**
     * Look up a choice, only if it belongs to the given question
     */
    async fn choice(&self, question_id: i32, choice_id: i32) -> Result<Option<Choice>, StoreError>;

    async fn find_vote(&self, voter: &Voter, question_id: i32) -> Result<Option<Vote>, StoreError>;

    /**
     * Store the voter's ballot for `choice`'s question.
     *
     * Implementations must perform the lookup of any prior vote and the
     * resulting write atomically: a voter never ends up with more than one
     * vote for a question, and a replaced vote is never observed missing.
     */
    async fn record_vote(&self, voter: &Voter, choice: &Choice) -> Result<VoteOutcome, StoreError>;

    /**
     * Vote counts for every choice of the question, including choices nobody
     * picked, in choice order
     */
    async fn tally(&self, question_id: i32) -> Result<Vec<(Choice, u32)>, StoreError>;
}
