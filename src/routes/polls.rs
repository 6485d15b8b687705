use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use tide::http::mime;
use tide::{Redirect, Request, Response, StatusCode};

use crate::models::{Choice, Question, VoteOutcome, Voter};
use crate::voting::VoteError;
use crate::AppState;

const CLOSED_NOTICE: &str = "Voting is not allowed for this question.";
const NO_CHOICE: &str = "You didn't select a choice.";

#[derive(Debug, Default, Deserialize)]
struct IndexQuery {
    notice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultsQuery {
    outcome: Option<String>,
}

/**
 * The submitted vote form, `choice` is whatever the browser sent
 */
#[derive(Debug, Default, Deserialize)]
struct VoteForm {
    choice: Option<String>,
}

impl VoteForm {
    fn choice_id(&self) -> Option<i32> {
        self.choice.as_ref().and_then(|c| c.trim().parse().ok())
    }
}

#[derive(Serialize)]
struct QuestionSummary<'a> {
    id: i32,
    text: &'a str,
    published_at: String,
    recent: bool,
}

#[derive(Serialize)]
struct ChoiceView<'a> {
    id: i32,
    text: &'a str,
    selected: bool,
}

#[derive(Serialize)]
struct ChoiceResult<'a> {
    text: &'a str,
    votes: u32,
    mine: bool,
}

fn display_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn html(req: &Request<AppState>, status: StatusCode, template: &str, data: &serde_json::Value) -> tide::Result {
    let body = req.state().templates.render(template, data)?;
    Ok(Response::builder(status)
        .content_type(mime::HTML)
        .body(body)
        .build())
}

/**
 * Render the voting form, with the voter's current choice pre-selected
 */
async fn render_detail(
    req: &Request<AppState>,
    question: &Question,
    voter: &Voter,
    status: StatusCode,
    error_message: Option<&str>,
) -> tide::Result {
    let store = &req.state().store;
    let choices: Vec<Choice> = store.choices(question.id).await?;
    let current = store.find_vote(voter, question.id).await?.map(|v| v.choice_id);

    let choices: Vec<ChoiceView> = choices
        .iter()
        .map(|c| ChoiceView {
            id: c.id,
            text: &c.text,
            selected: Some(c.id) == current,
        })
        .collect();

    let data = serde_json::json!({
        "question": question,
        "choices": choices,
        "error_message": error_message,
        "ends_at": question.ends_at.as_ref().map(display_time),
    });
    html(req, status, "detail", &data)
}

/**
 *  GET /
 */
pub async fn index(req: Request<AppState>) -> tide::Result {
    let query: IndexQuery = req.query().unwrap_or_default();
    let now = Utc::now();

    let mut questions = req.state().store.list_published(now).await?;
    questions.truncate(req.state().config.index_limit);

    let summaries: Vec<QuestionSummary> = questions
        .iter()
        .map(|q| QuestionSummary {
            id: q.id,
            text: &q.text,
            published_at: display_time(&q.published_at),
            recent: q.was_published_recently(now),
        })
        .collect();

    let notice = match query.notice.as_deref() {
        Some("closed") => Some(CLOSED_NOTICE),
        _ => None,
    };

    let data = serde_json::json!({
        "latest_question_list": summaries,
        "notice": notice,
    });
    html(&req, StatusCode::Ok, "index", &data)
}

/**
 *  GET /polls/:id
 */
pub async fn detail(req: Request<AppState>) -> tide::Result {
    let id = super::question_id(&req)?;
    let voter = super::require_voter(&req)?;
    let question = match req.state().store.question(id).await? {
        Some(question) => question,
        None => return Err(tide::Error::from_str(StatusCode::NotFound, "No such poll")),
    };

    // Scheduled and ended questions alike go back to the listing
    if !question.can_vote(Utc::now()) {
        debug!("Question {} is not open, sending back to the index", id);
        return Ok(Redirect::see_other("/?notice=closed").into());
    }

    render_detail(&req, &question, &voter, StatusCode::Ok, None).await
}

/**
 *  POST /polls/:id/vote
 */
pub async fn vote(mut req: Request<AppState>) -> tide::Result {
    let id = super::question_id(&req)?;
    let voter = super::require_voter(&req)?;

    let body = req.body_string().await?;
    let form: VoteForm = serde_qs::from_str(&body).unwrap_or_default();

    let result = req
        .state()
        .voting
        .cast_vote(&voter, id, form.choice_id(), Utc::now())
        .await;

    match result {
        Ok(outcome) => {
            let location = format!("/polls/{}/results?outcome={}", id, outcome.as_str());
            Ok(Redirect::see_other(location).into())
        }
        Err(VoteError::InvalidChoice) => {
            let question = super::published_question(&req, id, Utc::now()).await?;
            render_detail(
                &req,
                &question,
                &voter,
                StatusCode::UnprocessableEntity,
                Some(NO_CHOICE),
            )
            .await
        }
        Err(VoteError::VotingClosed) => Ok(Redirect::see_other("/?notice=closed").into()),
        Err(err) => Err(super::vote_error(err)),
    }
}

/**
 *  GET /polls/:id/results
 */
pub async fn results(req: Request<AppState>) -> tide::Result {
    let id = super::question_id(&req)?;
    let query: ResultsQuery = req.query().unwrap_or_default();
    let question = super::published_question(&req, id, Utc::now()).await?;

    let store = &req.state().store;
    let tally = store.tally(id).await?;
    let mine = match super::voter(&req) {
        Some(voter) => store.find_vote(&voter, id).await?.map(|v| v.choice_id),
        None => None,
    };

    let choices: Vec<ChoiceResult> = tally
        .iter()
        .map(|(choice, votes)| ChoiceResult {
            text: &choice.text,
            votes: *votes,
            mine: Some(choice.id) == mine,
        })
        .collect();

    let message = query
        .outcome
        .as_deref()
        .and_then(VoteOutcome::parse)
        .map(|outcome| outcome.message());

    let data = serde_json::json!({
        "question": question,
        "choices": choices,
        "message": message,
    });
    html(&req, StatusCode::Ok, "results", &data)
}
