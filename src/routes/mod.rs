//! All the tide routes and the logic to fulfill the responses for each route.
//!
//! `polls` renders the HTML pages while `api` serves the same operations as
//! JSON under `/api/v1`.

use chrono::{DateTime, Utc};
use log::*;
use tide::{Request, StatusCode};

use crate::models::{Question, Voter};
use crate::voting::VoteError;
use crate::AppState;

pub mod api;
pub mod polls;

/**
 * Parse the `:id` route parameter, anything unparseable cannot name a poll
 */
fn question_id(req: &Request<AppState>) -> Result<i32, tide::Error> {
    req.param::<i32>("id")
        .map_err(|_| tide::Error::from_str(StatusCode::NotFound, "No such poll"))
}

/**
 * The identity of the user making the request.
 *
 * Authentication happens upstream, the authenticator passes the user along in
 * the configured header.
 */
fn voter(req: &Request<AppState>) -> Option<Voter> {
    let header = req.state().config.remote_user_header.as_str();
    req.header(header)
        .and_then(|values| Voter::new(values.last().as_str()))
}

fn require_voter(req: &Request<AppState>) -> Result<Voter, tide::Error> {
    voter(req).ok_or_else(|| tide::Error::from_str(StatusCode::Unauthorized, "Login required to vote"))
}

/**
 * Look up a question that is visible at `now`, unpublished questions are
 * indistinguishable from missing ones
 */
async fn published_question(
    req: &Request<AppState>,
    id: i32,
    now: DateTime<Utc>,
) -> Result<Question, tide::Error> {
    match req.state().store.question(id).await? {
        Some(question) if question.is_published(now) => Ok(question),
        _ => Err(tide::Error::from_str(StatusCode::NotFound, "No such poll")),
    }
}

fn vote_error(err: VoteError) -> tide::Error {
    let status = match &err {
        VoteError::QuestionNotFound(_) => StatusCode::NotFound,
        VoteError::InvalidChoice => StatusCode::UnprocessableEntity,
        VoteError::VotingClosed => StatusCode::Forbidden,
        VoteError::Store(e) => {
            error!("Failed to record vote: {:?}", e);
            StatusCode::InternalServerError
        }
    };
    tide::Error::new(status, err)
}
