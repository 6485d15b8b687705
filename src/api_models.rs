use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Choice, Question, VoteOutcome};

/**
 * Information about a poll
 */
#[derive(Debug, Serialize)]
pub struct Poll {
    pub question: Question,
    pub choices: Vec<Choice>,
}

/**
 * User-provided details to create a Poll
 */
#[derive(Debug, Deserialize)]
pub struct InsertablePoll {
    pub text: String,
    /**
     * Defaults to the moment the request is handled
     */
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    /**
     * Just the details of each choice
     */
    pub choices: Vec<String>,
}

/**
 * User-provided ballot
 */
#[derive(Debug, Deserialize)]
pub struct Ballot {
    #[serde(default)]
    pub choice: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BallotReceipt {
    pub outcome: VoteOutcome,
}

#[derive(Debug, Serialize)]
pub struct ChoiceTally {
    pub choice: Choice,
    pub votes: u32,
}

/**
 * Results from a given poll
 */
#[derive(Debug, Serialize)]
pub struct Tally {
    pub question: Question,
    pub choices: Vec<ChoiceTally>,
}
