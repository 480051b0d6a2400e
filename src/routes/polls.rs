use log::*;
use serde_json::json;
use sqlx::SqliteConnection;
use tide::{Redirect, Request, Response, StatusCode};

use crate::forms::PollVoteForm;
use crate::models::{Choice, Poll};
use crate::tally::Tally;
use crate::templates::render;
use crate::AppState;

/**
 * Look up the poll named by the `:id` parameter in the request
 */
async fn requested_poll(req: &Request<AppState>, conn: &mut SqliteConnection) -> tide::Result<Poll> {
    let id = super::poll_id(req)?;
    debug!("Fetching poll: {}", id);
    Poll::find(conn, id).await?.ok_or_else(super::not_found)
}

fn render_poll(
    req: &Request<AppState>,
    poll: &Poll,
    choices: &[Choice],
    form: &PollVoteForm,
) -> tide::Result<Response> {
    let tally = Tally::new(choices);
    render(
        &req.state().templates,
        StatusCode::Ok,
        "poll",
        &json!({
            "poll": poll,
            "tally": tally,
            "form": form.as_p(),
        }),
    )
}

/**
 *  GET /
 */
pub async fn index(req: Request<AppState>) -> tide::Result {
    let mut conn = req.state().db.acquire().await?;
    let polls = Poll::all(&mut conn).await?;
    debug!("Listing {} polls", polls.len());

    render(
        &req.state().templates,
        StatusCode::Ok,
        "home",
        &json!({ "polls": polls }),
    )
}

/**
 *  GET /poll/:id/
 */
pub async fn detail(req: Request<AppState>) -> tide::Result {
    let mut conn = req.state().db.acquire().await?;
    let poll = requested_poll(&req, &mut conn).await?;
    let choices = poll.choices(&mut conn).await?;
    drop(conn);

    let form = PollVoteForm::new(&choices);
    render_poll(&req, &poll, &choices, &form)
}

/**
 *  POST /poll/:id/
 */
pub async fn vote(mut req: Request<AppState>) -> tide::Result {
    let data = super::form_body(&mut req).await?;

    let mut conn = req.state().db.acquire().await?;
    let poll = requested_poll(&req, &mut conn).await?;
    let choices = poll.choices(&mut conn).await?;
    let mut form = PollVoteForm::new(&choices);

    match form.clean(&data) {
        Ok(choice_id) => {
            if Choice::record_vote(&mut conn, poll.id, choice_id).await? {
                info!("Vote recorded for choice {} of poll {}", choice_id, poll.id);
            } else {
                warn!("Choice {} vanished from poll {} before the vote", choice_id, poll.id);
            }
            Ok(Redirect::new(format!("/poll/{}/", poll.id)).into())
        }
        Err(err) => {
            debug!("Rejected vote on poll {}: {}", poll.id, err);
            drop(conn);
            render_poll(&req, &poll, &choices, &form)
        }
    }
}
