//! HTTP client for the managed Lingua API.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use super::{MarkerWrite, RemoteError, RemoteResult, RemoteStore};
use crate::models::{DailyActivityMarker, QuizResultRecord, UserId};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteStore {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteStore")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl HttpRemoteStore {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            access_token: normalize_text_option(access_token),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn quiz_result_url(&self, record: &QuizResultRecord) -> String {
        format!(
            "{}/v1/users/{}/quiz-results/{}",
            self.base_url,
            urlencoding::encode(record.user_id.as_str()),
            urlencoding::encode(&record.client_id)
        )
    }

    fn activity_url(&self, user_id: &UserId) -> String {
        format!(
            "{}/v1/users/{}/activity",
            self.base_url,
            urlencoding::encode(user_id.as_str())
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl RemoteStore for HttpRemoteStore {
    async fn put_quiz_result(&self, record: &QuizResultRecord) -> RemoteResult<()> {
        let response = self
            .authorize(self.client.put(self.quiz_result_url(record)))
            .json(record)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn put_activity_marker(&self, marker: &DailyActivityMarker) -> RemoteResult<MarkerWrite> {
        let url = format!(
            "{}/{}",
            self.activity_url(&marker.user_id),
            urlencoding::encode(&marker.date)
        );
        let response = self
            .authorize(self.client.put(url))
            .json(marker)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        if response.status() == StatusCode::CREATED {
            Ok(MarkerWrite::Created)
        } else {
            Ok(MarkerWrite::AlreadyPresent)
        }
    }

    async fn activity_dates(&self, user_id: &UserId) -> RemoteResult<Vec<String>> {
        let response = self
            .authorize(self.client.get(self.activity_url(user_id)))
            .send()
            .await?;

        let payload = ensure_success(response)
            .await?
            .json::<ActivityListResponse>()
            .await?;
        Ok(payload.dates)
    }
}

#[derive(Debug, Deserialize)]
struct ActivityListResponse {
    #[serde(default)]
    dates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn ensure_success(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        return Err(RemoteError::Unavailable(parse_api_error(status, &body)));
    }
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        message: parse_api_message(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    })
}

fn parse_api_message(body: &str) -> Option<String> {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return Some(compact_text(&message));
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    parse_api_message(body).map_or_else(
        || format!("HTTP {}", status.as_u16()),
        |message| format!("{message} ({})", status.as_u16()),
    )
}

fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("API base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PendingResult, ResultSource, TestType};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn learner() -> UserId {
        UserId::new("learner").unwrap()
    }

    fn record() -> QuizResultRecord {
        let pending = PendingResult::new("es", TestType::Words, 5, 10, 1_709_978_400_000).unwrap();
        QuizResultRecord::from_pending(&learner(), &pending, ResultSource::OfflineSync)
    }

    fn store(server: &Server) -> HttpRemoteStore {
        HttpRemoteStore::new(server.url(), Some("secret-token".to_string())).unwrap()
    }

    #[test]
    fn normalize_base_url_rejects_invalid_values() {
        assert!(normalize_base_url(String::new()).is_err());
        assert!(normalize_base_url("api.example.com".to_string()).is_err());
    }

    #[test]
    fn normalize_base_url_trims_trailing_slash() {
        let store = HttpRemoteStore::new(" https://api.example.com/ ", None).unwrap();
        assert_eq!(store.base_url(), "https://api.example.com");
    }

    #[test]
    fn quiz_result_url_is_keyed_by_client_id() {
        let store = HttpRemoteStore::new("https://api.example.com", None).unwrap();
        let user = UserId::new("learner one").unwrap();
        let pending = PendingResult::new("es", TestType::Words, 5, 10, 1).unwrap();
        let record = QuizResultRecord::from_pending(&user, &pending, ResultSource::Live);

        assert_eq!(
            store.quiz_result_url(&record),
            format!(
                "https://api.example.com/v1/users/learner%20one/quiz-results/{}",
                pending.id
            )
        );
    }

    #[test]
    fn parse_api_error_prefers_message_field() {
        let message = parse_api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"message":"maintenance window"}"#,
        );
        assert_eq!(message, "maintenance window (503)");

        let fallback = parse_api_error(StatusCode::BAD_GATEWAY, "  ");
        assert_eq!(fallback, "HTTP 502");
    }

    #[test]
    fn debug_redacts_access_token() {
        let store =
            HttpRemoteStore::new("https://api.example.com", Some("secret".to_string())).unwrap();
        let debug = format!("{store:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_quiz_result_sends_keyed_authorized_put() {
        let mut server = Server::new_async().await;
        let record = record();
        let mock = server
            .mock(
                "PUT",
                format!("/v1/users/learner/quiz-results/{}", record.client_id).as_str(),
            )
            .match_header("authorization", "Bearer secret-token")
            .match_body(Matcher::PartialJson(json!({
                "clientId": record.client_id,
                "correctAnswers": 5,
                "totalQuestions": 10,
                "source": "offline_sync",
            })))
            .with_status(201)
            .create_async()
            .await;

        store(&server).put_quiz_result(&record).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn put_quiz_result_accepts_overwrite() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", Matcher::Regex(r"^/v1/users/learner/quiz-results/".to_string()))
            .with_status(200)
            .create_async()
            .await;

        assert!(store(&server).put_quiz_result(&record()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn client_error_maps_to_permanent_rejection() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", Matcher::Any)
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(json!({"error": "unsupported language"}).to_string())
            .create_async()
            .await;

        let error = store(&server).put_quiz_result(&record()).await.unwrap_err();
        match &error {
            RemoteError::Rejected { status, message } => {
                assert_eq!(*status, 422);
                assert_eq!(message, "unsupported language");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(error.is_permanent());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rate_limit_is_rejected_but_retryable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let error = store(&server).put_quiz_result(&record()).await.unwrap_err();
        assert!(matches!(error, RemoteError::Rejected { status: 429, .. }));
        assert!(!error.is_permanent());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_maps_to_unavailable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("PUT", Matcher::Any)
            .with_status(503)
            .with_body(json!({"message": "maintenance window"}).to_string())
            .create_async()
            .await;

        let error = store(&server).put_quiz_result(&record()).await.unwrap_err();
        match &error {
            RemoteError::Unavailable(message) => assert_eq!(message, "maintenance window (503)"),
            other => panic!("expected unavailable, got {other:?}"),
        }
        assert!(!error.is_permanent());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn marker_created_on_first_write() {
        let mut server = Server::new_async().await;
        let marker = DailyActivityMarker::new(learner(), "2024-03-09");
        let mock = server
            .mock("PUT", "/v1/users/learner/activity/2024-03-09")
            .match_header("authorization", "Bearer secret-token")
            .match_body(Matcher::PartialJson(json!({
                "userId": "learner",
                "date": "2024-03-09",
            })))
            .with_status(201)
            .create_async()
            .await;

        assert_eq!(
            store(&server).put_activity_marker(&marker).await.unwrap(),
            MarkerWrite::Created
        );
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn marker_already_present_on_overwrite() {
        let mut server = Server::new_async().await;
        let marker = DailyActivityMarker::new(learner(), "2024-03-09");
        let _mock = server
            .mock("PUT", "/v1/users/learner/activity/2024-03-09")
            .with_status(200)
            .create_async()
            .await;

        assert_eq!(
            store(&server).put_activity_marker(&marker).await.unwrap(),
            MarkerWrite::AlreadyPresent
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activity_dates_decodes_date_list() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/users/learner/activity")
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"dates": ["2024-03-08", "2024-03-09"]}).to_string())
            .create_async()
            .await;

        let dates = store(&server).activity_dates(&learner()).await.unwrap();
        assert_eq!(dates, vec!["2024-03-08".to_string(), "2024-03-09".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn activity_dates_without_list_is_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/users/learner/activity")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        assert!(store(&server)
            .activity_dates(&learner())
            .await
            .unwrap()
            .is_empty());
    }
}
