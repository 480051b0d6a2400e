use thiserror::Error;

/**
 * Everything which can go wrong while bringing the application up
 */
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} must be set")]
    MissingVar(&'static str),

    #[error("Invalid {name} value: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to migrate database: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Failed to load templates: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
