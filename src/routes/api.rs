use chrono::Utc;
use log::*;
use tide::{Body, Request, Response, StatusCode};

use crate::api_models::{Ballot, BallotReceipt, ChoiceTally, InsertablePoll, Poll, Tally};
use crate::store::NewQuestion;
use crate::AppState;

fn json<T: serde::Serialize>(status: StatusCode, value: &T) -> tide::Result {
    let mut response = Response::new(status);
    response.set_body(Body::from_json(value)?);
    Ok(response)
}

/**
 *  GET /api/v1/polls
 */
pub async fn list(req: Request<AppState>) -> tide::Result {
    let mut questions = req.state().store.list_published(Utc::now()).await?;
    questions.truncate(req.state().config.index_limit);
    json(StatusCode::Ok, &questions)
}

/**
 *  PUT /api/v1/polls
 */
pub async fn create(mut req: Request<AppState>) -> tide::Result {
    let poll = req.body_json::<InsertablePoll>().await?;
    debug!("Poll received: {:?}", poll);

    if poll.text.trim().is_empty() {
        return Err(tide::Error::from_str(StatusCode::BadRequest, "A poll needs some text"));
    }
    if poll.choices.is_empty() {
        return Err(tide::Error::from_str(StatusCode::BadRequest, "A poll needs choices"));
    }

    let published_at = poll.published_at.unwrap_or_else(Utc::now);
    if let Some(ends_at) = poll.ends_at {
        if ends_at < published_at {
            return Err(tide::Error::from_str(
                StatusCode::BadRequest,
                "A poll cannot end before it is published",
            ));
        }
    }

    let new = NewQuestion {
        text: poll.text,
        published_at,
        ends_at: poll.ends_at,
        choices: poll.choices,
    };

    match req.state().store.create_question(new).await {
        Ok((question, choices)) => {
            info!("Created poll {}", question.id);
            json(StatusCode::Created, &Poll { question, choices })
        }
        Err(err) => {
            error!("Failed to insert: {:?}", err);
            Err(tide::Error::from_str(StatusCode::InternalServerError, "Failed to create"))
        }
    }
}

/**
 * GET /api/v1/polls/:id
 */
pub async fn get(req: Request<AppState>) -> tide::Result {
    let id = super::question_id(&req)?;
    let question = super::published_question(&req, id, Utc::now()).await?;
    let choices = req.state().store.choices(id).await?;
    json(StatusCode::Ok, &Poll { question, choices })
}

/**
 *  POST /api/v1/polls/:id/vote
 */
pub async fn vote(mut req: Request<AppState>) -> tide::Result {
    let id = super::question_id(&req)?;
    let voter = super::require_voter(&req)?;
    let ballot = req.body_json::<Ballot>().await?;
    debug!("Ballot received: {:?}", ballot);

    let outcome = req
        .state()
        .voting
        .cast_vote(&voter, id, ballot.choice, Utc::now())
        .await
        .map_err(super::vote_error)?;

    json(StatusCode::Ok, &BallotReceipt { outcome })
}

/**
 *  GET /api/v1/polls/:id/results
 */
pub async fn results(req: Request<AppState>) -> tide::Result {
    let id = super::question_id(&req)?;
    let question = super::published_question(&req, id, Utc::now()).await?;
    let choices = req
        .state()
        .store
        .tally(id)
        .await?
        .into_iter()
        .map(|(choice, votes)| ChoiceTally { choice, votes })
        .collect();
    json(StatusCode::Ok, &Tally { question, choices })
}
