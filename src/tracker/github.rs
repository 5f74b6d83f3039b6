use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{PortError, Result};
use crate::model::{Comment, Field, Issue, Record, SlotId, State};
use crate::tracker::Tracker;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const COMMENTS_PER_PAGE: usize = 100;

/// Issue tracker of one repository on a GitHub-compatible REST API.
pub struct GithubTracker {
    client: Client,
    api_url: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    number: SlotId,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: State,
    #[serde(default)]
    labels: Vec<WireLabel>,
    #[serde(default)]
    assignees: Vec<WireUser>,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireLabel {
    Name(String),
    Object { name: String },
}

#[derive(Debug, Deserialize)]
struct WireUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct WireComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    number: SlotId,
}

impl From<WireIssue> for Issue {
    fn from(wire: WireIssue) -> Self {
        let mut record = Record {
            title: wire.title,
            body: wire.body.unwrap_or_default(),
            state: wire.state,
            labels: wire
                .labels
                .into_iter()
                .map(|label| match label {
                    WireLabel::Name(name) | WireLabel::Object { name } => name,
                })
                .collect(),
            assignees: wire.assignees.into_iter().map(|u| u.login).collect(),
            ..Record::default()
        };
        if let Some(pr) = wire.pull_request {
            record.extra.insert("pull_request".into(), pr);
        }
        Issue {
            number: wire.number,
            record,
        }
    }
}

impl GithubTracker {
    pub fn new(api_url: &str, repo: &str, token: String) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| PortError::InvalidConfig("API token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("trackport/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/repos/{}/{path}", self.api_url, self.repo)
    }

    fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        slot: Option<SlotId>,
    ) -> Result<Response> {
        debug!(operation, slot, repo = %self.repo, "github request");
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(api_error(operation, slot, status, response))
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        slot: Option<SlotId>,
    ) -> Result<T> {
        Ok(self.send(request, operation, slot)?.json()?)
    }
}

fn api_error(
    operation: &'static str,
    slot: Option<SlotId>,
    status: StatusCode,
    response: Response,
) -> PortError {
    let message = response
        .text()
        .unwrap_or_else(|err| format!("<unreadable response body: {err}>"));
    PortError::Api {
        operation,
        slot,
        status: status.as_u16(),
        message,
    }
}

/// The create endpoint takes no state; new issues always open.
fn create_payload(record: &Record, fields: &[Field]) -> Value {
    let mut payload = record.to_fields(fields);
    payload.remove(Field::State.name());
    Value::Object(payload)
}

impl Tracker for GithubTracker {
    fn describe(&self) -> String {
        format!("github:{}", self.repo)
    }

    fn fetch(&self, slot: SlotId) -> Result<Option<Issue>> {
        debug!(slot, "github fetch");
        let response = self
            .client
            .get(self.url(&format!("issues/{slot}")))
            .send()?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            // Deleted issues keep their number but cannot be read or written.
            StatusCode::GONE => Ok(Some(Issue {
                number: slot,
                record: Record {
                    title: "<deleted>".into(),
                    state: State::Closed,
                    ..Record::default()
                },
            })),
            status if status.is_success() => {
                let wire: WireIssue = response.json()?;
                Ok(Some(wire.into()))
            }
            status => Err(api_error("fetch", Some(slot), status, response)),
        }
    }

    /// The newest issue or pull request, which share one number sequence.
    fn last_slot(&self) -> Result<SlotId> {
        let request = self.client.get(self.url("issues")).query(&[
            ("state", "all"),
            ("sort", "created"),
            ("direction", "desc"),
            ("per_page", "1"),
        ]);
        let newest: Vec<Created> = self.send_json(request, "last slot", None)?;
        Ok(newest.first().map_or(0, |issue| issue.number))
    }

    fn create(&self, record: &Record, fields: &[Field]) -> Result<SlotId> {
        let request = self
            .client
            .post(self.url("issues"))
            .json(&create_payload(record, fields));
        let created: Created = self.send_json(request, "create", None)?;
        Ok(created.number)
    }

    fn update(&self, slot: SlotId, record: &Record, fields: &[Field]) -> Result<()> {
        let request = self
            .client
            .patch(self.url(&format!("issues/{slot}")))
            .json(&Value::Object(record.to_fields(fields)));
        self.send(request, "update", Some(slot))?;
        Ok(())
    }

    fn list_comments(&self, slot: SlotId) -> Result<Vec<Comment>> {
        let mut comments = Vec::new();
        for page in 1.. {
            let request = self
                .client
                .get(self.url(&format!("issues/{slot}/comments")))
                .query(&[("per_page", COMMENTS_PER_PAGE), ("page", page)]);
            let batch: Vec<WireComment> = self.send_json(request, "list comments", Some(slot))?;
            let last_page = batch.len() < COMMENTS_PER_PAGE;
            comments.extend(batch.into_iter().map(|c| Comment {
                id: c.id,
                body: c.body.unwrap_or_default(),
            }));
            if last_page {
                break;
            }
        }
        Ok(comments)
    }

    fn add_comment(&self, slot: SlotId, body: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("issues/{slot}/comments")))
            .json(&json!({ "body": body }));
        self.send(request, "add comment", Some(slot))?;
        Ok(())
    }

    fn update_comment(&self, slot: SlotId, comment_id: u64, body: &str) -> Result<()> {
        let request = self
            .client
            .patch(self.url(&format!("issues/comments/{comment_id}")))
            .json(&json!({ "body": body }));
        self.send(request, "update comment", Some(slot))?;
        Ok(())
    }
}
