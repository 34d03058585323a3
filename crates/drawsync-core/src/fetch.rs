//! Remote retrieval: request shapes, the HTTP transport, and the bounded
//! retry loop.
//!
//! A [`Fetcher`] turns one [`RemoteRequest`] into one JSON object or a
//! [`FetchError`]. Every failed attempt (transport error, non-2xx status,
//! undecodable body, non-object JSON) is retried after
//! `base_delay * multiplier^attempt`, with no jitter and no delay after the
//! final attempt. Transport and sleeping sit behind traits so tests can run
//! exhaustion scenarios without a network or wall-clock time.

use std::fmt;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::model::{ContestNumber, SeriesId};
use crate::normalize::json_type;

pub const DEFAULT_BASE_URL: &str = "https://apiloterias.com.br/app/v2/resultado";
pub const DEFAULT_ATTEMPTS: u32 = 4;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MULTIPLIER: f64 = 1.6;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

const TOKEN_PARAM: &str = "token";

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// API credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a credential, rejecting blank values.
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// The remote endpoint plus the credential every query carries.
#[derive(Debug, Clone)]
pub struct RemoteApi {
    base_url: String,
    credential: Credential,
}

impl RemoteApi {
    #[must_use]
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
        }
    }

    /// Query for the current (latest) record of `series`.
    #[must_use]
    pub fn latest(&self, series: &SeriesId) -> RemoteRequest {
        RemoteRequest {
            base_url: self.base_url.clone(),
            query: vec![
                ("loteria", series.to_string()),
                (TOKEN_PARAM, self.credential.expose().to_string()),
            ],
        }
    }

    /// Query for one specific contest of `series`.
    #[must_use]
    pub fn contest(&self, series: &SeriesId, contest: ContestNumber) -> RemoteRequest {
        RemoteRequest {
            base_url: self.base_url.clone(),
            query: vec![
                ("loteria", series.to_string()),
                ("concurso", contest.to_string()),
                (TOKEN_PARAM, self.credential.expose().to_string()),
            ],
        }
    }
}

/// One GET against the remote API.
///
/// `Display` renders the URL with the credential redacted, so requests are
/// safe to log and to embed in error messages.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteRequest {
    pub base_url: String,
    pub query: Vec<(&'static str, String)>,
}

impl RemoteRequest {
    /// Value of a query parameter, if set.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)?;
        for (idx, (key, value)) in self.query.iter().enumerate() {
            let sep = if idx == 0 { '?' } else { '&' };
            if *key == TOKEN_PARAM {
                write!(f, "{sep}{key}=***")?;
            } else {
                write!(f, "{sep}{key}={value}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RemoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteRequest({self})")
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("response is not valid JSON: {0}")]
    Decode(String),

    #[error("response JSON is a {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Retry budget exhausted; carries the last attempt's failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GET {request} failed after {attempts} attempt(s): {last}")]
pub struct FetchError {
    /// Redacted request URL.
    pub request: String,
    pub attempts: u32,
    #[source]
    pub last: AttemptError,
}

impl FetchError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::FetchExhausted
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Performs one HTTP GET and decodes the body as JSON.
pub trait Transport {
    /// # Errors
    ///
    /// Returns [`AttemptError`] for transport failures, non-2xx statuses,
    /// and undecodable bodies.
    fn get_json(&self, request: &RemoteRequest) -> Result<Value, AttemptError>;
}

/// Blocks between attempts.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

/// Blocking HTTP transport over a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Build a transport whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("drawsync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn get_json(&self, request: &RemoteRequest) -> Result<Value, AttemptError> {
        let mut call = self
            .agent
            .get(&request.base_url)
            .set("Accept", "application/json");
        for (key, value) in &request.query {
            call = call.query(key, value);
        }

        let response = match call.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(AttemptError::Status(code)),
            // The transport's own Display embeds the URL (and with it the
            // token), so only the kind and message are kept.
            Err(ureq::Error::Transport(transport)) => {
                let detail = transport
                    .message()
                    .map_or_else(String::new, |message| format!(": {message}"));
                return Err(AttemptError::Transport(format!(
                    "{}{detail}",
                    transport.kind()
                )));
            }
        };

        response
            .into_json::<Value>()
            .map_err(|err| AttemptError::Decode(err.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Retry policy + fetcher
// ---------------------------------------------------------------------------

/// Bounded exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with zero-based index `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

/// Stateless retrieval with retry; see the module docs.
pub struct Fetcher {
    transport: Box<dyn Transport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    #[must_use]
    pub fn new(
        transport: Box<dyn Transport>,
        sleeper: Box<dyn Sleeper>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    /// Real HTTP transport with the given per-request timeout.
    #[must_use]
    pub fn http(timeout: Duration, policy: RetryPolicy) -> Self {
        Self::new(
            Box::new(UreqTransport::new(timeout)),
            Box::new(ThreadSleeper),
            policy,
        )
    }

    /// Retrieve `request` as a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] once every attempt has failed; `last` holds
    /// the final attempt's cause.
    pub fn fetch_json(&self, request: &RemoteRequest) -> Result<Map<String, Value>, FetchError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;

        loop {
            let failure = match self.transport.get_json(request) {
                Ok(Value::Object(object)) => {
                    debug!(request = %request, attempt = attempt + 1, "fetched");
                    return Ok(object);
                }
                Ok(other) => AttemptError::NotAnObject(json_type(&other)),
                Err(err) => err,
            };

            attempt += 1;
            if attempt >= attempts {
                return Err(FetchError {
                    request: request.to_string(),
                    attempts,
                    last: failure,
                });
            }

            let delay = self.policy.delay_for(attempt - 1);
            warn!(
                request = %request,
                attempt,
                of = attempts,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "fetch attempt failed"
            );
            self.sleeper.sleep(delay);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted doubles shared by fetcher and reconciler tests.

    use super::{AttemptError, RemoteRequest, Sleeper, Transport};
    use serde_json::Value;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;
    use std::time::Duration;

    /// Replays queued responses in order and records every request.
    #[derive(Clone, Default)]
    pub struct ScriptedTransport {
        responses: Rc<RefCell<VecDeque<Result<Value, AttemptError>>>>,
        requests: Rc<RefCell<Vec<RemoteRequest>>>,
    }

    impl ScriptedTransport {
        pub fn push(&self, response: Result<Value, AttemptError>) {
            self.responses.borrow_mut().push_back(response);
        }

        pub fn requests(&self) -> Vec<RemoteRequest> {
            self.requests.borrow().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn get_json(&self, request: &RemoteRequest) -> Result<Value, AttemptError> {
            self.requests.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(AttemptError::Transport("script exhausted".to_string())))
        }
    }

    /// Records requested delays instead of sleeping.
    #[derive(Clone, Default)]
    pub struct RecordingSleeper {
        delays: Rc<RefCell<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub fn delays(&self) -> Vec<Duration> {
            self.delays.borrow().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, delay: Duration) {
            self.delays.borrow_mut().push(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{RecordingSleeper, ScriptedTransport};
    use super::*;
    use serde_json::json;

    fn api() -> RemoteApi {
        RemoteApi::new(
            "https://example.test/resultado",
            Credential::new("s3cret").expect("credential"),
        )
    }

    fn series() -> SeriesId {
        SeriesId::new("megasena").expect("valid id")
    }

    fn fetcher(transport: &ScriptedTransport, sleeper: &RecordingSleeper) -> Fetcher {
        Fetcher::new(
            Box::new(transport.clone()),
            Box::new(sleeper.clone()),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn request_shapes() {
        let latest = api().latest(&series());
        assert_eq!(latest.param("loteria"), Some("megasena"));
        assert_eq!(latest.param("concurso"), None);
        assert_eq!(latest.param("token"), Some("s3cret"));

        let contest = api().contest(&series(), 2501);
        assert_eq!(contest.param("concurso"), Some("2501"));
        assert_eq!(contest.param("token"), Some("s3cret"));
    }

    #[test]
    fn display_redacts_credential() {
        let text = api().contest(&series(), 7).to_string();
        assert_eq!(
            text,
            "https://example.test/resultado?loteria=megasena&concurso=7&token=***"
        );
        assert!(!format!("{:?}", api()).contains("s3cret"));
    }

    #[test]
    fn blank_credential_is_rejected() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" abc ").map(|c| c.expose().to_string()), Some("abc".into()));
    }

    #[test]
    fn delays_grow_exponentially() {
        let policy = RetryPolicy {
            attempts: 4,
            base_delay: Duration::from_millis(1000),
            multiplier: 1.6,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1600));
        assert_eq!(policy.delay_for(2).as_millis(), 2560);
    }

    #[test]
    fn first_success_returns_without_sleeping() {
        let transport = ScriptedTransport::default();
        let sleeper = RecordingSleeper::default();
        transport.push(Ok(json!({ "concurso": 1 })));

        let object = fetcher(&transport, &sleeper)
            .fetch_json(&api().latest(&series()))
            .expect("fetch");
        assert_eq!(object.get("concurso"), Some(&json!(1)));
        assert!(sleeper.delays().is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn transient_failures_are_retried() {
        let transport = ScriptedTransport::default();
        let sleeper = RecordingSleeper::default();
        transport.push(Err(AttemptError::Status(503)));
        transport.push(Ok(json!(["not", "an", "object"])));
        transport.push(Ok(json!({ "numero": 9 })));

        let object = fetcher(&transport, &sleeper)
            .fetch_json(&api().latest(&series()))
            .expect("fetch");
        assert_eq!(object.get("numero"), Some(&json!(9)));
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(
            sleeper.delays(),
            [Duration::from_millis(1000), Duration::from_millis(1600)]
        );
    }

    #[test]
    fn exhaustion_surfaces_last_error() {
        let transport = ScriptedTransport::default();
        let sleeper = RecordingSleeper::default();
        transport.push(Err(AttemptError::Transport("connection refused".into())));
        transport.push(Err(AttemptError::Status(500)));
        transport.push(Err(AttemptError::Decode("eof".into())));
        transport.push(Ok(json!("plain string")));

        let err = fetcher(&transport, &sleeper)
            .fetch_json(&api().contest(&series(), 3))
            .unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last, AttemptError::NotAnObject("string"));
        assert_eq!(err.code(), ErrorCode::FetchExhausted);
        assert!(!err.to_string().contains("s3cret"));
        assert_eq!(transport.requests().len(), 4);
        // No delay after the final attempt.
        assert_eq!(sleeper.delays().len(), 3);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let transport = ScriptedTransport::default();
        let sleeper = RecordingSleeper::default();
        transport.push(Err(AttemptError::Status(404)));
        let fetcher = Fetcher::new(
            Box::new(transport.clone()),
            Box::new(sleeper.clone()),
            RetryPolicy {
                attempts: 0,
                ..RetryPolicy::default()
            },
        );

        let err = fetcher.fetch_json(&api().latest(&series())).unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.last, AttemptError::Status(404));
        assert!(sleeper.delays().is_empty());
    }
}
