/*!
 * The forms module holds the user-submitted data shapes: the public vote form
 * and the admin form for editing a poll along with its choices.
 */
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use thiserror::Error;

use std::collections::{BTreeMap, HashMap};

use crate::models::{Choice, NewChoice, Poll, MAX_TEXT_LENGTH};

/**
 * Decoded `application/x-www-form-urlencoded` request body
 */
pub type FormData = HashMap<String, String>;

const DATE_INPUT_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"];
const TIME_INPUT_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/**
 * Number of blank choice rows offered below the existing ones
 */
pub const EXTRA_CHOICES: usize = 3;
const MAX_CHOICE_FORMS: usize = 1000;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum FormError {
    #[error("This field is required.")]
    Required,
    #[error("Select a valid choice. {0} is not one of the available choices.")]
    InvalidChoice(String),
    #[error("Ensure this value has at most {max} characters (it has {actual}).")]
    TooLong { max: usize, actual: usize },
    #[error("Enter a valid date.")]
    InvalidDate,
    #[error("Enter a valid time.")]
    InvalidTime,
    #[error("Enter a whole number.")]
    InvalidNumber,
    #[error("Ensure this value is greater than or equal to 0.")]
    Negative,
}

fn field<'a>(data: &'a FormData, name: &str) -> &'a str {
    data.get(name).map(String::as_str).unwrap_or("")
}

fn required_text(value: &str) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Required);
    }
    let actual = value.chars().count();
    if actual > MAX_TEXT_LENGTH {
        return Err(FormError::TooLong {
            max: MAX_TEXT_LENGTH,
            actual,
        });
    }
    Ok(value.to_string())
}

fn parse_date(value: &str) -> Result<NaiveDate, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Required);
    }
    DATE_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or(FormError::InvalidDate)
}

fn parse_time(value: &str) -> Result<NaiveTime, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::Required);
    }
    TIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
        .ok_or(FormError::InvalidTime)
}

fn parse_votes(value: &str) -> Result<i64, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    match value.parse::<i64>() {
        Ok(votes) if votes < 0 => Err(FormError::Negative),
        Ok(votes) => Ok(votes),
        Err(_) => Err(FormError::InvalidNumber),
    }
}

/**
 * The form shown on a poll's page, offering one radio button per choice
 */
#[derive(Clone, Debug)]
pub struct PollVoteForm {
    choices: Vec<(i64, String)>,
    selected: Option<String>,
    error: Option<FormError>,
}

impl PollVoteForm {
    pub const FIELD: &'static str = "vote";

    pub fn new(poll_choices: &[Choice]) -> Self {
        Self {
            choices: poll_choices
                .iter()
                .map(|c| (c.id, c.choice.clone()))
                .collect(),
            selected: None,
            error: None,
        }
    }

    /**
     * The `(id, text)` pairs this form will accept
     */
    pub fn choices(&self) -> &[(i64, String)] {
        &self.choices
    }

    pub fn error(&self) -> Option<&FormError> {
        self.error.as_ref()
    }

    /**
     * Validate submitted data, returning the id of the selected choice.
     *
     * The error is also kept on the form so that re-rendering it shows the
     * problem to the voter.
     */
    pub fn clean(&mut self, data: &FormData) -> Result<i64, FormError> {
        let raw = field(data, Self::FIELD).trim().to_string();
        let result = if raw.is_empty() {
            Err(FormError::Required)
        } else {
            // Only the exact value rendered on a radio button counts
            self.choices
                .iter()
                .find(|(id, _)| id.to_string() == raw)
                .map(|(id, _)| *id)
                .ok_or_else(|| FormError::InvalidChoice(raw.clone()))
        };

        self.selected = Some(raw);
        self.error = result.as_ref().err().cloned();
        result
    }

    /**
     * Render the form's fields as HTML paragraphs
     */
    pub fn as_p(&self) -> String {
        let mut html = String::new();

        if let Some(err) = &self.error {
            html.push_str(&format!(
                "<ul class=\"errorlist\"><li>{}</li></ul>\n",
                encode_text(&err.to_string())
            ));
        }

        html.push_str("<p><label for=\"id_vote_0\">Vote:</label> <ul id=\"id_vote\">\n");
        for (index, (id, text)) in self.choices.iter().enumerate() {
            let value = id.to_string();
            let checked = if self.selected.as_deref() == Some(value.as_str()) {
                " checked=\"checked\""
            } else {
                ""
            };
            html.push_str(&format!(
                "<li><label for=\"id_vote_{index}\"><input type=\"radio\" id=\"id_vote_{index}\" value=\"{value}\" name=\"{name}\"{checked} /> {text}</label></li>\n",
                index = index,
                value = encode_double_quoted_attribute(&value),
                name = Self::FIELD,
                checked = checked,
                text = encode_text(text),
            ));
        }
        html.push_str("</ul></p>");
        html
    }
}

/**
 * One line of the inline choice editor in the admin
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChoiceRow {
    pub index: usize,
    pub id: Option<i64>,
    pub choice: String,
    pub votes: String,
    pub delete: bool,
    pub errors: Vec<String>,
}

impl ChoiceRow {
    fn blank(index: usize) -> Self {
        Self {
            index,
            votes: "0".to_string(),
            ..Default::default()
        }
    }
}

/**
 * What should happen to a poll's choices once the admin form is saved
 */
#[derive(Clone, Debug, PartialEq)]
pub enum ChoiceChange {
    Create(NewChoice),
    Update { id: i64, choice: NewChoice },
    Delete(i64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CleanedPoll {
    pub question: String,
    pub pub_date: DateTime<Utc>,
    pub choices: Vec<ChoiceChange>,
}

/**
 * The admin add/change form for a poll with its choices edited inline
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PollAdminForm {
    pub question: String,
    pub pub_date_0: String,
    pub pub_date_1: String,
    pub choice_set: Vec<ChoiceRow>,
    pub total_forms: usize,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl PollAdminForm {
    /**
     * Empty form for adding a new poll
     */
    pub fn blank() -> Self {
        let mut form = Self::default();
        form.push_extra_rows();
        form
    }

    /**
     * Form pre-filled with an existing poll and its choices
     */
    pub fn for_poll(poll: &Poll, choices: &[Choice]) -> Self {
        let mut form = Self {
            question: poll.question.clone(),
            pub_date_0: poll.pub_date.format("%Y-%m-%d").to_string(),
            pub_date_1: poll.pub_date.format("%H:%M:%S").to_string(),
            choice_set: choices
                .iter()
                .enumerate()
                .map(|(index, c)| ChoiceRow {
                    index,
                    id: Some(c.id),
                    choice: c.choice.clone(),
                    votes: c.votes.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        form.push_extra_rows();
        form
    }

    fn push_extra_rows(&mut self) {
        let start = self.choice_set.len();
        self.choice_set
            .extend((start..start + EXTRA_CHOICES).map(ChoiceRow::blank));
        self.total_forms = self.choice_set.len();
    }

    /**
     * Form holding whatever was submitted, ready to be cleaned
     */
    pub fn bind(data: &FormData) -> Self {
        let total_forms = field(data, "choice_set-TOTAL_FORMS")
            .trim()
            .parse::<usize>()
            .unwrap_or(0)
            .min(MAX_CHOICE_FORMS);

        let choice_set = (0..total_forms)
            .map(|index| {
                let key = |name: &str| format!("choice_set-{}-{}", index, name);
                ChoiceRow {
                    index,
                    id: field(data, &key("id")).trim().parse().ok(),
                    choice: field(data, &key("choice")).to_string(),
                    votes: field(data, &key("votes")).to_string(),
                    delete: !field(data, &key("DELETE")).is_empty(),
                    errors: vec![],
                }
            })
            .collect();

        Self {
            question: field(data, "question").to_string(),
            pub_date_0: field(data, "pub_date_0").to_string(),
            pub_date_1: field(data, "pub_date_1").to_string(),
            choice_set,
            total_forms,
            errors: BTreeMap::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.choice_set.iter().all(|row| row.errors.is_empty())
    }

    fn add_error(&mut self, name: &str, err: FormError) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .push(err.to_string());
    }

    /**
     * Validate the bound data. Errors are recorded on the form for
     * re-rendering and `None` is returned when anything is wrong.
     */
    pub fn clean(&mut self) -> Option<CleanedPoll> {
        self.errors.clear();

        let question = required_text(&self.question)
            .map_err(|e| self.add_error("question", e))
            .ok();

        let date = parse_date(&self.pub_date_0);
        let time = parse_time(&self.pub_date_1);
        let pub_date = match (date, time) {
            (Ok(date), Ok(time)) => Some(Utc.from_utc_datetime(&NaiveDateTime::new(date, time))),
            (date, time) => {
                if let Err(e) = date {
                    self.add_error("pub_date", e);
                }
                if let Err(e) = time {
                    self.add_error("pub_date", e);
                }
                None
            }
        };

        let mut choices = vec![];
        for row in self.choice_set.iter_mut() {
            row.errors.clear();

            if let (Some(id), true) = (row.id, row.delete) {
                choices.push(ChoiceChange::Delete(id));
                continue;
            }
            if row.id.is_none() && row.choice.trim().is_empty() {
                continue;
            }

            let text = required_text(&row.choice).map_err(|e| row.errors.push(e.to_string()));
            let votes = parse_votes(&row.votes).map_err(|e| row.errors.push(e.to_string()));

            if let (Ok(choice), Ok(votes)) = (text, votes) {
                let choice = NewChoice { choice, votes };
                choices.push(match row.id {
                    Some(id) => ChoiceChange::Update { id, choice },
                    None => ChoiceChange::Create(choice),
                });
            }
        }

        if !self.is_valid() {
            return None;
        }

        Some(CleanedPoll {
            question: question?,
            pub_date: pub_date?,
            choices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: i64, poll_id: i64, text: &str) -> Choice {
        Choice {
            id,
            poll_id,
            choice: text.into(),
            votes: 0,
        }
    }

    fn data(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn vote_form_offers_the_polls_choices() {
        let form = PollVoteForm::new(&[choice(1, 1, "42"), choice(2, 1, "The Ultimate Answer")]);
        assert_eq!(
            form.choices(),
            &[(1, "42".to_string()), (2, "The Ultimate Answer".to_string())]
        );
    }

    #[test]
    fn vote_form_renders_radio_inputs() {
        let form = PollVoteForm::new(&[choice(1, 1, "42"), choice(2, 1, "The Ultimate Answer")]);
        let html = form.as_p();
        assert!(html.contains("type=\"radio\""));
        assert!(html.contains("<label for=\"id_vote_0\">Vote:</label>"));
        assert!(html.contains("value=\"2\" name=\"vote\" /> The Ultimate Answer</label>"));
    }

    #[test]
    fn vote_form_escapes_choice_text() {
        let form = PollVoteForm::new(&[choice(1, 1, "<b>bold</b>")]);
        let html = form.as_p();
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn vote_is_required() {
        let mut form = PollVoteForm::new(&[choice(1, 1, "PM")]);
        assert_eq!(form.clean(&data(&[])), Err(FormError::Required));
        assert!(form.as_p().contains("This field is required."));
    }

    #[test]
    fn vote_must_belong_to_the_poll() {
        let mut form = PollVoteForm::new(&[choice(1, 1, "PM")]);
        assert_eq!(
            form.clean(&data(&[("vote", "3")])),
            Err(FormError::InvalidChoice("3".into()))
        );
        assert_eq!(
            form.clean(&data(&[("vote", "beer")])),
            Err(FormError::InvalidChoice("beer".into()))
        );
        assert!(form
            .as_p()
            .contains("Select a valid choice. beer is not one of the available choices."));
    }

    #[test]
    fn vote_must_match_a_choice_value_exactly() {
        let mut form = PollVoteForm::new(&[choice(1, 1, "PM")]);
        for raw in &["01", "+1", "1.0"] {
            assert_eq!(
                form.clean(&data(&[("vote", *raw)])),
                Err(FormError::InvalidChoice(raw.to_string()))
            );
        }
        assert!(!form.as_p().contains("checked"));
    }

    #[test]
    fn valid_vote_returns_the_choice() {
        let mut form = PollVoteForm::new(&[choice(1, 1, "PM"), choice(4, 1, "Gardener's")]);
        assert_eq!(form.clean(&data(&[("vote", "4")])), Ok(4));
        assert!(form.error().is_none());
        assert!(form.as_p().contains("value=\"4\" name=\"vote\" checked=\"checked\""));
    }

    #[test]
    fn blank_admin_form_has_extra_rows() {
        let form = PollAdminForm::blank();
        assert_eq!(form.choice_set.len(), EXTRA_CHOICES);
        assert_eq!(form.total_forms, EXTRA_CHOICES);
        assert!(form.choice_set.iter().all(|row| row.id.is_none()));
    }

    #[test]
    fn admin_form_accepts_short_us_dates() {
        let mut form = PollAdminForm::bind(&data(&[
            ("question", "How awesome is Test-Driven Development?"),
            ("pub_date_0", "01/01/12"),
            ("pub_date_1", "00:00"),
            ("choice_set-TOTAL_FORMS", "3"),
            ("choice_set-0-choice", "Very awesome"),
            ("choice_set-1-choice", "Quite awesome"),
            ("choice_set-2-choice", "Moderately awesome"),
        ]));

        let cleaned = form.clean().unwrap();
        assert_eq!(cleaned.question, "How awesome is Test-Driven Development?");
        assert_eq!(
            cleaned.pub_date,
            Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            cleaned.choices,
            vec![
                ChoiceChange::Create(NewChoice::new("Very awesome")),
                ChoiceChange::Create(NewChoice::new("Quite awesome")),
                ChoiceChange::Create(NewChoice::new("Moderately awesome")),
            ]
        );
    }

    #[test]
    fn admin_form_accepts_iso_dates_with_seconds() {
        let mut form = PollAdminForm::bind(&data(&[
            ("question", "time"),
            ("pub_date_0", "2013-05-17"),
            ("pub_date_1", "13:45:10"),
        ]));
        let cleaned = form.clean().unwrap();
        assert_eq!(
            cleaned.pub_date,
            Utc.with_ymd_and_hms(2013, 5, 17, 13, 45, 10).unwrap()
        );
        assert!(cleaned.choices.is_empty());
    }

    #[test]
    fn admin_form_reports_missing_fields() {
        let mut form = PollAdminForm::bind(&data(&[("pub_date_0", "yesterday")]));
        assert_eq!(form.clean(), None);
        assert!(!form.is_valid());
        assert_eq!(form.errors["question"], vec!["This field is required."]);
        assert_eq!(
            form.errors["pub_date"],
            vec!["Enter a valid date.", "This field is required."]
        );
    }

    #[test]
    fn admin_form_limits_question_length() {
        let long = "x".repeat(201);
        let mut form = PollAdminForm::bind(&data(&[
            ("question", long.as_str()),
            ("pub_date_0", "2012-01-01"),
            ("pub_date_1", "00:00"),
        ]));
        assert_eq!(form.clean(), None);
        assert_eq!(
            form.errors["question"],
            vec!["Ensure this value has at most 200 characters (it has 201)."]
        );
    }

    #[test]
    fn admin_form_updates_and_deletes_existing_choices() {
        let mut form = PollAdminForm::bind(&data(&[
            ("question", "Which workshop treat do you prefer?"),
            ("pub_date_0", "2012-01-01"),
            ("pub_date_1", "00:00"),
            ("choice_set-TOTAL_FORMS", "4"),
            ("choice_set-0-id", "7"),
            ("choice_set-0-choice", "Beer"),
            ("choice_set-0-votes", "5"),
            ("choice_set-1-id", "8"),
            ("choice_set-1-choice", "Pizza"),
            ("choice_set-1-votes", "2"),
            ("choice_set-1-DELETE", "on"),
            ("choice_set-2-choice", "The Acquisition of Knowledge"),
            ("choice_set-3-choice", ""),
        ]));

        let cleaned = form.clean().unwrap();
        assert_eq!(
            cleaned.choices,
            vec![
                ChoiceChange::Update {
                    id: 7,
                    choice: NewChoice {
                        choice: "Beer".into(),
                        votes: 5
                    }
                },
                ChoiceChange::Delete(8),
                ChoiceChange::Create(NewChoice::new("The Acquisition of Knowledge")),
            ]
        );
    }

    #[test]
    fn admin_form_rejects_bad_vote_counts() {
        let mut form = PollAdminForm::bind(&data(&[
            ("question", "q"),
            ("pub_date_0", "2012-01-01"),
            ("pub_date_1", "00:00"),
            ("choice_set-TOTAL_FORMS", "2"),
            ("choice_set-0-choice", "a"),
            ("choice_set-0-votes", "-1"),
            ("choice_set-1-choice", "b"),
            ("choice_set-1-votes", "lots"),
        ]));
        assert_eq!(form.clean(), None);
        assert_eq!(
            form.choice_set[0].errors,
            vec!["Ensure this value is greater than or equal to 0."]
        );
        assert_eq!(form.choice_set[1].errors, vec!["Enter a whole number."]);
    }

    #[test]
    fn existing_choice_cannot_be_blanked() {
        let mut form = PollAdminForm::bind(&data(&[
            ("question", "q"),
            ("pub_date_0", "2012-01-01"),
            ("pub_date_1", "00:00"),
            ("choice_set-TOTAL_FORMS", "1"),
            ("choice_set-0-id", "3"),
            ("choice_set-0-choice", " "),
        ]));
        assert_eq!(form.clean(), None);
        assert_eq!(form.choice_set[0].errors, vec!["This field is required."]);
    }

    #[test]
    fn change_form_lists_existing_choices_first() {
        let poll = Poll {
            id: 1,
            question: "time".into(),
            pub_date: Utc.with_ymd_and_hms(2012, 1, 1, 9, 30, 0).unwrap(),
        };
        let form = PollAdminForm::for_poll(&poll, &[choice(5, 1, "PM")]);
        assert_eq!(form.pub_date_0, "2012-01-01");
        assert_eq!(form.pub_date_1, "09:30:00");
        assert_eq!(form.choice_set.len(), 1 + EXTRA_CHOICES);
        assert_eq!(form.choice_set[0].id, Some(5));
        assert_eq!(form.choice_set[3].index, 3);
        assert_eq!(form.total_forms, 4);
    }
}
