/*!
 * A small polling site: the public can browse polls and vote on them, staff
 * manage the polls and their choices through the admin pages.
 */
use handlebars::Handlebars;
use log::*;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tide::sessions::{MemoryStore, SessionMiddleware};

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod forms;
pub mod models;
pub mod routes;
pub mod tally;
pub mod templates;

pub use config::Config;
pub use error::Error;

/**
 * Schema migrations, embedded from the `migrations/` directory
 */
pub static MIGRATOR: Migrator = sqlx::migrate!();

const SESSION_COOKIE: &str = "polls.sid";

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub templates: Arc<Handlebars<'static>>,
    pub config: Arc<Config>,
}

impl AppState {
    /**
     * Connect to the database, bring its schema up to date and load the
     * templates
     */
    pub async fn new(config: Config) -> Result<Self, Error> {
        let db = create_pool(&config).await?;
        let templates = templates::load(config.templates_dir.as_deref())?;
        Ok(Self {
            db,
            templates: Arc::new(templates),
            config: Arc::new(config),
        })
    }
}

/**
 * Create the sqlx connection pool for SQLite and run any pending migrations
 */
pub async fn create_pool(config: &Config) -> Result<SqlitePool, Error> {
    // Concurrent voters queue on SQLite's write lock rather than failing
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    /*
     * Every connection to an in-memory database gets a database of its own,
     * so those must be served by one connection which is never recycled
     */
    let pool = if config.in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let db = pool.connect_with(options).await?;
    MIGRATOR.run(&db).await?;
    debug!("Database ready at {}", config.database_url);
    Ok(db)
}

/**
 * Assemble the tide server with every route the site serves
 */
pub fn app(state: AppState) -> tide::Server<AppState> {
    let sessions = SessionMiddleware::new(MemoryStore::new(), state.config.session_secret.as_bytes())
        .with_cookie_name(SESSION_COOKIE);

    let mut app = tide::with_state(state);
    app.with(sessions);

    app.at("/").get(routes::polls::index);
    app.at("/poll/:id/")
        .get(routes::polls::detail)
        .post(routes::polls::vote);

    app.at("/admin/").get(routes::admin::index);
    app.at("/admin/login/")
        .get(routes::admin::index)
        .post(routes::admin::login);
    app.at("/admin/logout/").get(routes::admin::logout);
    app.at("/admin/polls/").get(routes::admin::poll_list);
    app.at("/admin/polls/poll/").get(routes::admin::poll_list);
    app.at("/admin/polls/poll/add/")
        .get(routes::admin::add_form)
        .post(routes::admin::add);
    app.at("/admin/polls/poll/:id/")
        .get(routes::admin::change_form)
        .post(routes::admin::change);
    app.at("/admin/polls/poll/:id/delete/")
        .get(routes::admin::delete_confirm)
        .post(routes::admin::delete);
    app
}

#[cfg(test)]
pub(crate) fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.into(),
        listen_addr: "127.0.0.1:0".into(),
        admin_username: "admin".into(),
        admin_password: "admin".into(),
        session_secret: "0123456789abcdef0123456789abcdef".into(),
        templates_dir: None,
    }
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    create_pool(&test_config("sqlite::memory:"))
        .await
        .expect("Failed to create test pool")
}
