#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use polls::models::{Choice, NewChoice, Poll};
use polls::{AppState, Config};
use scraper::{Html, Selector};
use tide::http::cookies::Cookie;
use tide::http::{mime, Method, Request, Response, StatusCode, Url};

use std::collections::BTreeMap;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin";

pub struct TestSite {
    pub state: AppState,
    pub server: tide::Server<AppState>,
    /**
     * Session cookie carried between requests, like a browser would
     */
    pub cookie: Option<String>,
}

pub fn config() -> Config {
    Config {
        database_url: "sqlite::memory:".into(),
        listen_addr: "127.0.0.1:0".into(),
        admin_username: ADMIN_USERNAME.into(),
        admin_password: ADMIN_PASSWORD.into(),
        session_secret: "an-integration-test-secret-of-some-length".into(),
        templates_dir: None,
    }
}

pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl TestSite {
    pub async fn new() -> Self {
        let state = AppState::new(config())
            .await
            .expect("Failed to set up application state");
        let server = polls::app(state.clone());
        Self {
            state,
            server,
            cookie: None,
        }
    }

    pub async fn create_poll(&self, question: &str, choices: &[&str]) -> (Poll, Vec<Choice>) {
        let mut conn = self.state.db.acquire().await.unwrap();
        let poll = Poll::create(
            &mut conn,
            question,
            Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap(),
        )
        .await
        .unwrap();

        let mut created = vec![];
        for text in choices {
            created.push(
                Choice::create(&mut conn, poll.id, &NewChoice::new(*text))
                    .await
                    .unwrap(),
            );
        }
        (poll, created)
    }

    pub async fn choices(&self, poll: &Poll) -> Vec<Choice> {
        let mut conn = self.state.db.acquire().await.unwrap();
        poll.choices(&mut conn).await.unwrap()
    }

    pub async fn polls(&self) -> Vec<Poll> {
        let mut conn = self.state.db.acquire().await.unwrap();
        Poll::all(&mut conn).await.unwrap()
    }

    async fn send(&mut self, mut req: Request) -> Page {
        if let Some(cookie) = &self.cookie {
            req.insert_header("Cookie", cookie.as_str());
        }

        let mut res: Response = self.server.respond(req).await.unwrap();

        if let Some(values) = res.header("Set-Cookie") {
            for value in values.iter() {
                let cookie = Cookie::parse(value.as_str()).expect("Malformed Set-Cookie header");
                // An emptied cookie is how the server forgets a session
                self.cookie = if cookie.value().is_empty() {
                    None
                } else {
                    Some(format!("{}={}", cookie.name(), cookie.value()))
                };
            }
        }

        Page {
            status: res.status(),
            location: res.header("Location").map(|v| v.last().as_str().to_string()),
            body: res.body_string().await.unwrap(),
        }
    }

    pub async fn get(&mut self, path: &str) -> Page {
        let url = Url::parse("http://localhost/").unwrap().join(path).unwrap();
        self.send(Request::new(Method::Get, url)).await
    }

    pub async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> Page {
        let fields: BTreeMap<&str, &str> = fields.iter().copied().collect();
        self.post_body(path, &serde_qs::to_string(&fields).unwrap())
            .await
    }

    /**
     * Submit an already encoded form body, for submissions a browser would
     * not normally produce
     */
    pub async fn post_body(&mut self, path: &str, body: &str) -> Page {
        let url = Url::parse("http://localhost/").unwrap().join(path).unwrap();
        let mut req = Request::new(Method::Post, url);
        req.set_body(body);
        req.set_content_type(mime::FORM);
        self.send(req).await
    }

    pub async fn log_in(&mut self) {
        let page = self
            .post(
                "/admin/login/",
                &[("username", ADMIN_USERNAME), ("password", ADMIN_PASSWORD)],
            )
            .await;
        assert_eq!(page.status, StatusCode::Found);
        assert!(self.cookie.is_some(), "no session cookie after logging in");
    }
}

impl Page {
    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /**
     * The visible text of the page body, roughly what a browser would show
     */
    pub fn text(&self) -> String {
        self.texts("body").join(" ")
    }

    /**
     * The text of every element matching a CSS selector, in document order
     */
    pub fn texts(&self, selector: &str) -> Vec<String> {
        let selector = Selector::parse(selector).expect("Invalid selector");
        self.html()
            .select(&selector)
            .map(|element| collapse(element.text()))
            .collect()
    }

    /**
     * Where each link whose text is exactly `text` points
     */
    pub fn links_with_text(&self, text: &str) -> Vec<String> {
        let selector = Selector::parse("a[href]").expect("Invalid selector");
        self.html()
            .select(&selector)
            .filter(|link| collapse(link.text()) == text)
            .filter_map(|link| link.value().attr("href").map(String::from))
            .collect()
    }

    /**
     * The named attribute of every element matching a CSS selector
     */
    pub fn attrs(&self, selector: &str, attr: &str) -> Vec<String> {
        let selector = Selector::parse(selector).expect("Invalid selector");
        self.html()
            .select(&selector)
            .filter_map(|element| element.value().attr(attr).map(String::from))
            .collect()
    }
}

fn collapse<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
