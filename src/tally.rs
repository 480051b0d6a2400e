/*!
 * The tally module turns raw vote counts into what is shown on a poll's page
 */
use serde::Serialize;

use crate::models::Choice;

pub const NO_VOTES_MESSAGE: &str = "No-one has voted on this poll yet";

/**
 * Percentage of `total` represented by `votes`, rounded to the nearest whole
 * number
 */
pub fn rounded_percentage(votes: i64, total: i64) -> i64 {
    if total == 0 {
        return 0;
    }
    (100.0 * votes as f64 / total as f64).round() as i64
}

pub fn vote_summary(total: i64) -> String {
    match total {
        0 => NO_VOTES_MESSAGE.to_string(),
        1 => "1 vote".to_string(),
        n => format!("{} votes", n),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TallyRow {
    pub id: i64,
    pub choice: String,
    pub votes: i64,
    pub percentage: i64,
}

/**
 * Results for a single poll
 */
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tally {
    pub total_votes: i64,
    pub summary: String,
    pub rows: Vec<TallyRow>,
}

impl Tally {
    pub fn new(choices: &[Choice]) -> Self {
        let total_votes = choices.iter().map(|c| c.votes).sum();
        let rows = choices
            .iter()
            .map(|c| TallyRow {
                id: c.id,
                choice: c.choice.clone(),
                votes: c.votes,
                percentage: rounded_percentage(c.votes, total_votes),
            })
            .collect();

        Self {
            total_votes,
            summary: vote_summary(total_votes),
            rows,
        }
    }
}
