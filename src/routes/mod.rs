/*!
 * The routes module contains all the tide routes and the logic to fulfill the
 * responses for each route.
 */
use tide::{Request, StatusCode};

use crate::forms::FormData;
use crate::AppState;

pub mod admin;
pub mod polls;

/**
 * The numeric `:id` of the poll named in the URL
 *
 * Anything which isn't a number can never name a poll, so it is a 404 rather
 * than a bad request
 */
fn poll_id(req: &Request<AppState>) -> tide::Result<i64> {
    req.param("id")?
        .parse::<i64>()
        .map_err(|_| tide::Error::from_str(StatusCode::NotFound, "No such poll"))
}

fn not_found() -> tide::Error {
    tide::Error::from_str(StatusCode::NotFound, "Could not find poll")
}

/**
 * Read and decode an urlencoded form submission
 *
 * Field names are taken literally and a repeated field keeps its last value,
 * so odd submissions still reach the form's own validation.
 */
async fn form_body(req: &mut Request<AppState>) -> tide::Result<FormData> {
    req.body_form::<FormData>().await.map_err(|err| {
        tide::Error::from_str(
            StatusCode::BadRequest,
            format!("Malformed form data: {}", err),
        )
    })
}
