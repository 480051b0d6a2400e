use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

use std::fmt;

/**
 * Maximum length of a poll question or a choice's text
 */
pub const MAX_TEXT_LENGTH: usize = 200;

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub pub_date: DateTime<Utc>,
}

impl Poll {
    pub async fn create(
        conn: &mut SqliteConnection,
        question: &str,
        pub_date: DateTime<Utc>,
    ) -> Result<Poll, sqlx::Error> {
        sqlx::query_as::<_, Poll>(
            "INSERT INTO polls (question, pub_date) VALUES ($1, $2) RETURNING id, question, pub_date",
        )
        .bind(question)
        .bind(pub_date)
        .fetch_one(conn)
        .await
    }

    /**
     * All polls, oldest first
     */
    pub async fn all(conn: &mut SqliteConnection) -> Result<Vec<Poll>, sqlx::Error> {
        sqlx::query_as::<_, Poll>("SELECT id, question, pub_date FROM polls ORDER BY id ASC")
            .fetch_all(conn)
            .await
    }

    pub async fn find(conn: &mut SqliteConnection, id: i64) -> Result<Option<Poll>, sqlx::Error> {
        sqlx::query_as::<_, Poll>("SELECT id, question, pub_date FROM polls WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE polls SET question = $1, pub_date = $2 WHERE id = $3")
            .bind(&self.question)
            .bind(self.pub_date)
            .bind(self.id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /**
     * Delete the poll along with every one of its choices
     */
    pub async fn delete(self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM choices WHERE poll_id = $1")
            .bind(self.id)
            .execute(&mut *conn)
            .await?;
        sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(self.id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /**
     * The poll's choices in the order they were added
     */
    pub async fn choices(&self, conn: &mut SqliteConnection) -> Result<Vec<Choice>, sqlx::Error> {
        sqlx::query_as::<_, Choice>(
            "SELECT id, poll_id, choice, votes FROM choices WHERE poll_id = $1 ORDER BY id ASC",
        )
        .bind(self.id)
        .fetch_all(conn)
        .await
    }

    /**
     * Sum of the votes cast across all of this poll's choices
     */
    pub async fn total_votes(&self, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(votes), 0) FROM choices WHERE poll_id = $1",
        )
        .bind(self.id)
        .fetch_one(conn)
        .await
    }
}

impl fmt::Display for Poll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i64,
    pub poll_id: i64,
    pub choice: String,
    pub votes: i64,
}

/**
 * Values for a choice which has not been saved yet
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewChoice {
    pub choice: String,
    pub votes: i64,
}

impl NewChoice {
    pub fn new(choice: impl Into<String>) -> Self {
        Self {
            choice: choice.into(),
            votes: 0,
        }
    }
}

impl Choice {
    pub async fn create(
        conn: &mut SqliteConnection,
        poll_id: i64,
        new: &NewChoice,
    ) -> Result<Choice, sqlx::Error> {
        sqlx::query_as::<_, Choice>(
            "INSERT INTO choices (poll_id, choice, votes) VALUES ($1, $2, $3)
             RETURNING id, poll_id, choice, votes",
        )
        .bind(poll_id)
        .bind(&new.choice)
        .bind(new.votes)
        .fetch_one(conn)
        .await
    }

    pub async fn update(&self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE choices SET choice = $1, votes = $2 WHERE id = $3 AND poll_id = $4")
            .bind(&self.choice)
            .bind(self.votes)
            .bind(self.id)
            .bind(self.poll_id)
            .execute(conn)
            .await?;
        Ok(())
    }

    /**
     * Remove a choice from its poll, returning false when there was nothing to
     * remove
     */
    pub async fn delete(
        conn: &mut SqliteConnection,
        poll_id: i64,
        choice_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM choices WHERE id = $1 AND poll_id = $2")
            .bind(choice_id)
            .bind(poll_id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /**
     * Add a single vote to the given choice of the given poll.
     *
     * The increment happens inside the database so concurrent voters never
     * overwrite each other. Returns false when no such choice exists on that
     * poll.
     */
    pub async fn record_vote(
        conn: &mut SqliteConnection,
        poll_id: i64,
        choice_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE choices SET votes = votes + 1 WHERE id = $1 AND poll_id = $2")
                .bind(choice_id)
                .bind(poll_id)
                .execute(conn)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /**
     * This choice's share of `total_votes` as a percentage, zero when nobody
     * has voted
     */
    pub fn percentage(&self, total_votes: i64) -> f64 {
        if total_votes == 0 {
            return 0.0;
        }
        100.0 * self.votes as f64 / total_votes as f64
    }
}
