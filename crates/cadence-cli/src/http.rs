//! HTTP client for the cadence server.
//!
//! Routes (relative to the configured base URL):
//!
//! | call             | route                          |
//! |------------------|--------------------------------|
//! | goals            | `GET /goals`                   |
//! | complete goal    | `POST /goals/{id}/complete`    |
//! | update goal      | `PUT /goals/{id}`              |
//! | delete goal      | `DELETE /goals/{id}`           |
//! | routines         | `GET /routines`                |
//! | delete routine   | `DELETE /routines/{id}`        |
//! | activities       | `GET /activities`              |
//! | record activity  | `POST /activities`             |
//! | delete activity  | `DELETE /activities/{id}`      |

use std::time::Duration;

use cadence_core::model::{ActivityRecord, EventId, Goal, GoalPatch, NewActivity, Routine};
use cadence_core::remote::{RemoteError, RemoteStore};
use serde::de::DeserializeOwned;
use tracing::debug;

/// [`RemoteStore`] over the server's JSON API.
pub struct UreqRemote {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for UreqRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqRemote")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl UreqRemote {
    pub fn new(base_url: &str, timeout: Duration, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("cadence-cli/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = self.url(path);
        debug!(method, %url, "remote request");
        let mut request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self.request("GET", path).call().map_err(map_ureq_error)?;
        decode(response)
    }

    fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.request("DELETE", path)
            .call()
            .map(|_| ())
            .map_err(map_ureq_error)
    }
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, RemoteError> {
    response
        .into_json::<T>()
        .map_err(|err| RemoteError::Transient(format!("failed to decode server response: {err}")))
}

/// Classify an HTTP error status.
fn status_error(status: u16, message: String) -> RemoteError {
    match status {
        401 | 403 => RemoteError::Unauthorized(message),
        404 => RemoteError::NotFound(message),
        400..=499 => RemoteError::Rejected { status, message },
        _ => RemoteError::Transient(format!("server error ({status}): {message}")),
    }
}

fn map_ureq_error(err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            };
            status_error(status, message)
        }
        ureq::Error::Transport(transport) => RemoteError::Transient(transport.to_string()),
    }
}

impl RemoteStore for UreqRemote {
    fn fetch_goals(&self) -> Result<Vec<Goal>, RemoteError> {
        self.get_json("/goals")
    }

    fn fetch_routines(&self) -> Result<Vec<Routine>, RemoteError> {
        self.get_json("/routines")
    }

    fn fetch_activities(&self) -> Result<Vec<ActivityRecord>, RemoteError> {
        self.get_json("/activities")
    }

    fn create_activity(&self, activity: &NewActivity) -> Result<ActivityRecord, RemoteError> {
        let response = self
            .request("POST", "/activities")
            .send_json(activity)
            .map_err(map_ureq_error)?;
        decode(response)
    }

    fn delete_activity(&self, id: &EventId) -> Result<(), RemoteError> {
        self.delete(&format!("/activities/{id}"))
    }

    fn update_goal(&self, id: &str, patch: &GoalPatch) -> Result<Goal, RemoteError> {
        let response = self
            .request("PUT", &format!("/goals/{id}"))
            .send_json(patch)
            .map_err(map_ureq_error)?;
        decode(response)
    }

    fn complete_goal(&self, id: &str) -> Result<Goal, RemoteError> {
        let response = self
            .request("POST", &format!("/goals/{id}/complete"))
            .call()
            .map_err(map_ureq_error)?;
        decode(response)
    }

    fn delete_goal(&self, id: &str) -> Result<(), RemoteError> {
        self.delete(&format!("/goals/{id}"))
    }

    fn delete_routine(&self, id: &str) -> Result<(), RemoteError> {
        self.delete(&format!("/routines/{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_remote_errors() {
        assert_eq!(
            status_error(401, "no".into()),
            RemoteError::Unauthorized("no".into())
        );
        assert_eq!(
            status_error(403, "no".into()),
            RemoteError::Unauthorized("no".into())
        );
        assert_eq!(
            status_error(404, "gone".into()),
            RemoteError::NotFound("gone".into())
        );
        assert_eq!(
            status_error(422, "bad".into()),
            RemoteError::Rejected {
                status: 422,
                message: "bad".into()
            }
        );
        assert!(status_error(503, "busy".into()).is_transient());
        assert!(status_error(500, String::new()).is_transient());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let remote = UreqRemote::new("http://localhost:5000/api/", Duration::from_secs(1), None);
        assert_eq!(remote.url("/goals"), "http://localhost:5000/api/goals");
    }

    #[test]
    fn debug_redacts_token() {
        let remote = UreqRemote::new("http://x", Duration::from_secs(1), Some("secret".into()));
        let shown = format!("{remote:?}");
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn unreachable_server_is_transient() {
        // Port 9 (discard) on localhost is closed in test environments.
        let remote = UreqRemote::new("http://127.0.0.1:9", Duration::from_millis(200), None);
        let err = remote.fetch_goals().expect_err("nothing listens there");
        assert!(err.is_transient(), "{err:?}");
    }
}
