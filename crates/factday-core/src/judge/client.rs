//! Remote judge: challenge download, guess verification and the Final Five
//! endpoints.
//!
//! Every call goes through [`with_retry`] with its own per-endpoint timeout.
//! All of them are idempotent on the server side, so retrying is safe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::retry::{with_retry, RetryPolicy};
use crate::error::JudgeError;
use crate::game::Challenge;
use crate::storage::{keys, ApiConfig, DurableStore, RetryConfig};

/// Minimum number of Final Five candidates a valid response carries.
pub const FINAL_FIVE_OPTIONS: usize = 5;

const SESSION_HEADER: &str = "x-session-id";

/// Source of server truth for a day's play.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn fetch_daily_challenge(&self) -> Result<Challenge, JudgeError>;

    async fn verify_guess(&self, challenge_id: &str, guess: &str) -> Result<bool, JudgeError>;

    /// At least [`FINAL_FIVE_OPTIONS`] candidates, none of them in `previous_guesses`.
    async fn fetch_final_five_options(
        &self,
        challenge_id: &str,
        previous_guesses: &[String],
    ) -> Result<Vec<String>, JudgeError>;

    async fn fetch_correct_answer(&self, challenge_id: &str) -> Result<String, JudgeError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    is_correct: bool,
}

#[derive(Deserialize)]
struct FinalFiveResponse {
    options: Vec<String>,
}

#[derive(Deserialize)]
struct AnswerResponse {
    answer: String,
}

/// [`Judge`] over HTTP.
pub struct HttpJudge {
    client: Client,
    base_url: String,
    language: String,
    session_id: String,
    retry: RetryPolicy,
    challenge_timeout: Duration,
    verify_timeout: Duration,
    final_five_timeout: Duration,
    answer_timeout: Duration,
}

impl HttpJudge {
    pub fn new(
        api: &ApiConfig,
        retry: &RetryConfig,
        session_id: impl Into<String>,
    ) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .build()
            .map_err(|e| JudgeError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            language: api.language.clone(),
            session_id: session_id.into(),
            retry: RetryPolicy::from(retry),
            challenge_timeout: api.challenge_timeout(),
            verify_timeout: api.verify_timeout(),
            final_five_timeout: api.final_five_timeout(),
            answer_timeout: api.answer_timeout(),
        })
    }

    /// Replace the retry policy, e.g. to drop backoff delays in tests.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, JudgeError> {
        Url::parse(&format!("{}/{path}", self.base_url))
            .map_err(|e| JudgeError::Transport(format!("invalid judge url: {e}")))
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        timeout: Duration,
        body: serde_json::Value,
    ) -> Result<T, JudgeError> {
        let url = self.endpoint(path)?;
        let client = &self.client;
        let session_id = self.session_id.as_str();
        let url = &url;
        let body = &body;

        with_retry(&self.retry, operation, timeout, move || async move {
            let resp = client
                .post(url.clone())
                .header(SESSION_HEADER, session_id)
                .json(body)
                .send()
                .await?;
            decode(operation, resp).await
        })
        .await
    }
}

async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    resp: Response,
) -> Result<T, JudgeError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(JudgeError::Status {
            operation,
            status: status.as_u16(),
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| JudgeError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl Judge for HttpJudge {
    async fn fetch_daily_challenge(&self) -> Result<Challenge, JudgeError> {
        let url = Url::parse_with_params(
            &format!("{}/daily-challenge", self.base_url),
            &[("lang", self.language.as_str())],
        )
        .map_err(|e| JudgeError::Transport(format!("invalid judge url: {e}")))?;
        let client = &self.client;
        let session_id = self.session_id.as_str();
        let url = &url;

        with_retry(
            &self.retry,
            "daily-challenge",
            self.challenge_timeout,
            move || async move {
                let resp = client
                    .get(url.clone())
                    .header(SESSION_HEADER, session_id)
                    .send()
                    .await?;
                let challenge: Challenge = decode("daily-challenge", resp).await?;
                if challenge.facts.is_empty() {
                    return Err(JudgeError::InvalidResponse(
                        "challenge has no facts".into(),
                    ));
                }
                Ok(challenge)
            },
        )
        .await
    }

    async fn verify_guess(&self, challenge_id: &str, guess: &str) -> Result<bool, JudgeError> {
        let body = json!({
            "challengeId": challenge_id,
            "guess": guess,
            "language": self.language,
        });
        let resp: VerifyResponse = self
            .post_json("verify-guess", "verify-guess", self.verify_timeout, body)
            .await?;
        Ok(resp.is_correct)
    }

    async fn fetch_final_five_options(
        &self,
        challenge_id: &str,
        previous_guesses: &[String],
    ) -> Result<Vec<String>, JudgeError> {
        let url = self.endpoint("final-five")?;
        let body = json!({
            "challengeId": challenge_id,
            "previousGuesses": previous_guesses,
            "language": self.language,
        });
        let client = &self.client;
        let session_id = self.session_id.as_str();
        let url = &url;
        let body = &body;

        // A short list is a server fault even on 200, so it is checked
        // inside the retried closure.
        with_retry(
            &self.retry,
            "final-five",
            self.final_five_timeout,
            move || async move {
                let resp = client
                    .post(url.clone())
                    .header(SESSION_HEADER, session_id)
                    .json(body)
                    .send()
                    .await?;
                let parsed: FinalFiveResponse = decode("final-five", resp).await?;
                if parsed.options.len() < FINAL_FIVE_OPTIONS {
                    return Err(JudgeError::TooFewOptions {
                        got: parsed.options.len(),
                    });
                }
                Ok(parsed.options)
            },
        )
        .await
    }

    async fn fetch_correct_answer(&self, challenge_id: &str) -> Result<String, JudgeError> {
        let body = json!({
            "challengeId": challenge_id,
            "language": self.language,
        });
        let resp: AnswerResponse = self
            .post_json(
                "final-five-answer",
                "final-five-answer",
                self.answer_timeout,
                body,
            )
            .await?;
        Ok(resp.answer)
    }
}

/// Stable per-install id sent with every request. Created on first use.
pub fn ensure_session_id(store: &DurableStore) -> String {
    if let Some(id) = store.get_opt::<String>(keys::SESSION_ID) {
        if !id.is_empty() {
            return id;
        }
    }
    let id = uuid::Uuid::new_v4().to_string();
    store.set(keys::SESSION_ID, &id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_is_created_once() {
        let store = DurableStore::in_memory();
        let first = ensure_session_id(&store);
        let second = ensure_session_id(&store);
        assert_eq!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn trailing_slash_in_base_url_is_ignored() {
        let api = ApiConfig {
            base_url: "http://judge.test/api/".into(),
            ..ApiConfig::default()
        };
        let judge = HttpJudge::new(&api, &RetryConfig::default(), "sid").unwrap();
        assert_eq!(
            judge.endpoint("verify-guess").unwrap().as_str(),
            "http://judge.test/api/verify-guess"
        );
    }
}
