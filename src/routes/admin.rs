/*!
 * Staff pages for managing polls and their choices.
 *
 * Every page except the login page requires a logged-in staff member, whose
 * name is kept in the session.
 */
use log::*;
use serde_json::json;
use sqlx::SqliteConnection;
use tide::{Redirect, Request, Response, StatusCode};

use crate::forms::{ChoiceChange, PollAdminForm};
use crate::models::{Choice, NewChoice, Poll};
use crate::templates::render;
use crate::AppState;

const STAFF_KEY: &str = "staff";
const LOGIN_URL: &str = "/admin/";
const POLL_LIST_URL: &str = "/admin/polls/poll/";
const LOGIN_FAILED: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

fn logged_in_staff(req: &Request<AppState>) -> Option<String> {
    req.session().get::<String>(STAFF_KEY)
}

/**
 * The logged in staff member, or the response sending an anonymous visitor
 * to the login page
 */
fn require_staff(req: &Request<AppState>) -> Result<String, Response> {
    logged_in_staff(req).ok_or_else(|| {
        debug!("Anonymous request for {}, sending to login", req.url().path());
        Redirect::new(LOGIN_URL).into()
    })
}

fn poll_count(count: usize) -> String {
    match count {
        1 => "1 poll".to_string(),
        n => format!("{} polls", n),
    }
}

fn render_poll_form(
    req: &Request<AppState>,
    staff: &str,
    form: &PollAdminForm,
    poll_id: Option<i64>,
) -> tide::Result<Response> {
    let (heading, action) = match poll_id {
        Some(id) => ("Change poll", format!("{}{}/", POLL_LIST_URL, id)),
        None => ("Add poll", format!("{}add/", POLL_LIST_URL)),
    };

    render(
        &req.state().templates,
        StatusCode::Ok,
        "admin/poll_form",
        &json!({
            "staff": staff,
            "heading": heading,
            "action": action,
            "poll_id": poll_id,
            "form": form,
            "has_errors": !form.is_valid(),
        }),
    )
}

async fn requested_poll(req: &Request<AppState>, conn: &mut SqliteConnection) -> tide::Result<Poll> {
    let id = super::poll_id(req)?;
    Poll::find(conn, id).await?.ok_or_else(super::not_found)
}

/**
 * Bring a poll's choices in line with what was submitted in the admin form
 */
async fn apply_choice_changes(
    conn: &mut SqliteConnection,
    poll_id: i64,
    changes: Vec<ChoiceChange>,
) -> Result<(), sqlx::Error> {
    for change in changes {
        match change {
            ChoiceChange::Create(new) => {
                let choice = Choice::create(conn, poll_id, &new).await?;
                debug!("Added choice {} to poll {}", choice.id, poll_id);
            }
            ChoiceChange::Update {
                id,
                choice: NewChoice { choice, votes },
            } => {
                Choice {
                    id,
                    poll_id,
                    choice,
                    votes,
                }
                .update(conn)
                .await?;
            }
            ChoiceChange::Delete(id) => {
                if !Choice::delete(conn, poll_id, id).await? {
                    warn!("Choice {} was not part of poll {}", id, poll_id);
                }
            }
        }
    }
    Ok(())
}

/**
 *  GET /admin/
 */
pub async fn index(req: Request<AppState>) -> tide::Result {
    let templates = &req.state().templates;
    match logged_in_staff(&req) {
        Some(staff) => render(
            templates,
            StatusCode::Ok,
            "admin/index",
            &json!({ "staff": staff }),
        ),
        None => render(templates, StatusCode::Ok, "admin/login", &json!({})),
    }
}

/**
 *  POST /admin/login/
 */
pub async fn login(mut req: Request<AppState>) -> tide::Result {
    let data = super::form_body(&mut req).await?;
    let username = data.get("username").map(String::as_str).unwrap_or("");
    let password = data.get("password").map(String::as_str).unwrap_or("");

    if req.state().config.credentials_match(username, password) {
        info!("Staff member {} logged in", username);
        let session = req.session_mut();
        session.regenerate();
        session.insert(STAFF_KEY, username)?;
        Ok(Redirect::new(LOGIN_URL).into())
    } else {
        warn!("Failed login attempt for {:?}", username);
        render(
            &req.state().templates,
            StatusCode::Ok,
            "admin/login",
            &json!({ "username": username, "error": LOGIN_FAILED }),
        )
    }
}

/**
 *  GET /admin/logout/
 */
pub async fn logout(mut req: Request<AppState>) -> tide::Result {
    if let Some(staff) = logged_in_staff(&req) {
        info!("Staff member {} logged out", staff);
    }
    req.session_mut().destroy();
    render(
        &req.state().templates,
        StatusCode::Ok,
        "admin/logged_out",
        &json!({}),
    )
}

/**
 *  GET /admin/polls/poll/
 */
pub async fn poll_list(req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };

    let mut conn = req.state().db.acquire().await?;
    let polls = Poll::all(&mut conn).await?;
    drop(conn);

    render(
        &req.state().templates,
        StatusCode::Ok,
        "admin/poll_list",
        &json!({
            "staff": staff,
            "count": poll_count(polls.len()),
            "polls": polls,
        }),
    )
}

/**
 *  GET /admin/polls/poll/add/
 */
pub async fn add_form(req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };
    render_poll_form(&req, &staff, &PollAdminForm::blank(), None)
}

/**
 *  POST /admin/polls/poll/add/
 */
pub async fn add(mut req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };
    let data = super::form_body(&mut req).await?;
    let mut form = PollAdminForm::bind(&data);

    let cleaned = match form.clean() {
        Some(cleaned) => cleaned,
        None => return render_poll_form(&req, &staff, &form, None),
    };

    let mut tx = req.state().db.begin().await?;
    let poll = Poll::create(&mut tx, &cleaned.question, cleaned.pub_date).await?;
    apply_choice_changes(&mut tx, poll.id, cleaned.choices).await?;
    tx.commit().await?;

    info!("{} added poll {}: {}", staff, poll.id, poll);
    Ok(Redirect::new(POLL_LIST_URL).into())
}

/**
 *  GET /admin/polls/poll/:id/
 */
pub async fn change_form(req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };

    let mut conn = req.state().db.acquire().await?;
    let poll = requested_poll(&req, &mut conn).await?;
    let choices = poll.choices(&mut conn).await?;
    drop(conn);

    let form = PollAdminForm::for_poll(&poll, &choices);
    render_poll_form(&req, &staff, &form, Some(poll.id))
}

/**
 *  POST /admin/polls/poll/:id/
 */
pub async fn change(mut req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };
    let data = super::form_body(&mut req).await?;

    let mut tx = req.state().db.begin().await?;
    let mut poll = requested_poll(&req, &mut tx).await?;

    let mut form = PollAdminForm::bind(&data);
    let cleaned = match form.clean() {
        Some(cleaned) => cleaned,
        None => {
            tx.rollback().await?;
            return render_poll_form(&req, &staff, &form, Some(poll.id));
        }
    };

    poll.question = cleaned.question;
    poll.pub_date = cleaned.pub_date;
    poll.update(&mut tx).await?;
    apply_choice_changes(&mut tx, poll.id, cleaned.choices).await?;
    tx.commit().await?;

    info!("{} changed poll {}: {}", staff, poll.id, poll);
    Ok(Redirect::new(POLL_LIST_URL).into())
}

/**
 *  GET /admin/polls/poll/:id/delete/
 */
pub async fn delete_confirm(req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };

    let mut conn = req.state().db.acquire().await?;
    let poll = requested_poll(&req, &mut conn).await?;
    let choices = poll.choices(&mut conn).await?;
    drop(conn);

    render(
        &req.state().templates,
        StatusCode::Ok,
        "admin/poll_delete",
        &json!({ "staff": staff, "poll": poll, "choices": choices }),
    )
}

/**
 *  POST /admin/polls/poll/:id/delete/
 */
pub async fn delete(req: Request<AppState>) -> tide::Result {
    let staff = match require_staff(&req) {
        Ok(staff) => staff,
        Err(res) => return Ok(res),
    };

    let mut tx = req.state().db.begin().await?;
    let poll = requested_poll(&req, &mut tx).await?;
    let description = format!("{}: {}", poll.id, poll);
    poll.delete(&mut tx).await?;
    tx.commit().await?;

    info!("{} deleted poll {}", staff, description);
    Ok(Redirect::new(POLL_LIST_URL).into())
}
