use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{NewQuestion, PollStore, StoreError};
use crate::models::{Choice, Question, Vote, VoteOutcome, Voter};

/// Rounds of insert-or-lock before a ballot is given up on
const RECORD_ATTEMPTS: usize = 3;

/**
 * Row shape for the tally query
 */
#[derive(Debug, sqlx::FromRow)]
struct TallyRow {
    id: i32,
    question_id: i32,
    text: String,
    votes: i64,
}

/**
 * PostgreSQL backed store
 *
 * Uniqueness of a voter's ballot is enforced by the `votes` table itself, see
 * `crate::schema`.
 */
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /**
     * Create the connection pool for postgresql
     */
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /**
     * Create any missing tables
     */
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in crate::schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PollStore for PgStore {
    async fn create_question(&self, new: NewQuestion) -> Result<(Question, Vec<Choice>), StoreError> {
        let mut tx = self.pool.begin().await?;

        let question = sqlx::query_as::<_, Question>(
            "INSERT INTO questions (text, published_at, ends_at) VALUES ($1, $2, $3)
             RETURNING id, text, published_at, ends_at",
        )
        .bind(&new.text)
        .bind(new.published_at)
        .bind(new.ends_at)
        .fetch_one(&mut tx)
        .await?;

        /*
         * One insert per choice, a question only has a handful of them
         */
        let mut choices = Vec::with_capacity(new.choices.len());
        for text in new.choices.iter() {
            let choice = sqlx::query_as::<_, Choice>(
                "INSERT INTO choices (question_id, text) VALUES ($1, $2) RETURNING id, question_id, text",
            )
            .bind(question.id)
            .bind(text)
            .fetch_one(&mut tx)
            .await?;
            choices.push(choice);
        }

        tx.commit().await?;
        debug!("Created question {} with {} choices", question.id, choices.len());
        Ok((question, choices))
    }

    async fn list_published(&self, now: DateTime<Utc>) -> Result<Vec<Question>, StoreError> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT id, text, published_at, ends_at FROM questions
             WHERE published_at <= $1 ORDER BY published_at DESC",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn question(&self, id: i32) -> Result<Option<Question>, StoreError> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, text, published_at, ends_at FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }

    async fn choices(&self, question_id: i32) -> Result<Vec<Choice>, StoreError> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, text FROM choices WHERE question_id = $1 ORDER BY id ASC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(choices)
    }

    async fn choice(&self, question_id: i32, choice_id: i32) -> Result<Option<Choice>, StoreError> {
        let choice = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, text FROM choices WHERE id = $1 AND question_id = $2",
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(choice)
    }

    async fn find_vote(&self, voter: &Voter, question_id: i32) -> Result<Option<Vote>, StoreError> {
        let vote = sqlx::query_as::<_, Vote>(
            "SELECT id, voter, question_id, choice_id, created_at FROM votes
             WHERE voter = $1 AND question_id = $2",
        )
        .bind(voter.as_str())
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(vote)
    }

    async fn record_vote(&self, voter: &Voter, choice: &Choice) -> Result<VoteOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_as::<_, (i32,)>("SELECT id FROM questions WHERE id = $1")
            .bind(choice.question_id)
            .fetch_optional(&mut tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::MissingQuestion(choice.question_id));
        }

        /*
         * Under read committed each statement sees a fresh snapshot, so when the
         * locked row has vanished (its choice was deleted) the insert is simply
         * attempted again
         */
        for _ in 0..RECORD_ATTEMPTS {
            let inserted = sqlx::query_as::<_, (i32,)>(
                "INSERT INTO votes (voter, question_id, choice_id) VALUES ($1, $2, $3)
                 ON CONFLICT (voter, question_id) DO NOTHING RETURNING id",
            )
            .bind(voter.as_str())
            .bind(choice.question_id)
            .bind(choice.id)
            .fetch_optional(&mut tx)
            .await?;

            if inserted.is_some() {
                tx.commit().await?;
                return Ok(VoteOutcome::Recorded);
            }

            // Concurrent ballots from the same voter queue up on this lock
            let existing = sqlx::query_as::<_, Vote>(
                "SELECT id, voter, question_id, choice_id, created_at FROM votes
                 WHERE voter = $1 AND question_id = $2 FOR UPDATE",
            )
            .bind(voter.as_str())
            .bind(choice.question_id)
            .fetch_optional(&mut tx)
            .await?;

            let existing = match existing {
                Some(existing) => existing,
                None => continue,
            };

            if existing.choice_id == choice.id {
                tx.commit().await?;
                return Ok(VoteOutcome::Unchanged);
            }

            sqlx::query("UPDATE votes SET choice_id = $1, created_at = NOW() WHERE id = $2")
                .bind(choice.id)
                .bind(existing.id)
                .execute(&mut tx)
                .await?;

            tx.commit().await?;
            return Ok(VoteOutcome::Changed);
        }

        warn!("Gave up recording a ballot from {} on question {}", voter.as_str(), choice.question_id);
        Err(StoreError::Contended(choice.question_id))
    }

    async fn tally(&self, question_id: i32) -> Result<Vec<(Choice, u32)>, StoreError> {
        let rows = sqlx::query_as::<_, TallyRow>(
            "SELECT c.id, c.question_id, c.text, COUNT(v.id) AS votes
             FROM choices c LEFT JOIN votes v ON v.choice_id = c.id
             WHERE c.question_id = $1
             GROUP BY c.id ORDER BY c.id ASC",
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let choice = Choice {
                    id: row.id,
                    question_id: row.question_id,
                    text: row.text,
                };
                (choice, row.votes as u32)
            })
            .collect())
    }
}

/**
 * These run against the database named by `DATABASE_URL` and are skipped when
 * it is unset. Every test works on questions of its own.
 */
