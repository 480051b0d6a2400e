use handlebars::Handlebars;
use log::*;
use serde::Serialize;
use tide::http::mime;
use tide::{Response, StatusCode};

use std::path::Path;

use crate::error::Error;

/**
 * Templates compiled into the binary, keyed by the name they are rendered as
 */
const BUILTIN: &[(&str, &str)] = &[
    ("header", include_str!("../views/header.hbs")),
    ("footer", include_str!("../views/footer.hbs")),
    ("home", include_str!("../views/home.hbs")),
    ("poll", include_str!("../views/poll.hbs")),
    ("admin/login", include_str!("../views/admin/login.hbs")),
    ("admin/index", include_str!("../views/admin/index.hbs")),
    ("admin/logged_out", include_str!("../views/admin/logged_out.hbs")),
    ("admin/poll_list", include_str!("../views/admin/poll_list.hbs")),
    ("admin/poll_form", include_str!("../views/admin/poll_form.hbs")),
    ("admin/poll_delete", include_str!("../views/admin/poll_delete.hbs")),
];

/**
 * Build the template registry, either from the built-in templates or from
 * `*.hbs` files underneath `dir`
 */
pub fn load(dir: Option<&Path>) -> Result<Handlebars<'static>, Error> {
    let mut hb = Handlebars::new();

    match dir {
        Some(dir) => {
            info!("Loading templates from {}", dir.display());
            hb.register_templates_directory(".hbs", dir)?;
        }
        None => {
            for (name, source) in BUILTIN {
                hb.register_template_string(name, source)?;
            }
        }
    }
    debug!("Registered {} templates", hb.get_templates().len());
    Ok(hb)
}

/**
 * Render the named template into an HTML response
 */
pub fn render<T: Serialize>(
    hb: &Handlebars<'_>,
    status: StatusCode,
    name: &str,
    data: &T,
) -> tide::Result<Response> {
    let body = hb.render(name, data).map_err(|err| {
        error!("Failed to render {}: {}", name, err);
        err
    })?;

    Ok(Response::builder(status)
        .body(body)
        .content_type(mime::HTML)
        .build())
}
