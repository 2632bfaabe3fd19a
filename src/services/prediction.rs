//! Thin client for the prediction service's HTTP API
//!
//! Prediction payloads are opaque and passed through as JSON.

use crate::config::PredictionConfig;
use crate::types::{MatchfeedError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_FORM_WINDOW: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct FixtureRequest {
    pub home_team: String,
    pub away_team: String,
}

impl FixtureRequest {
    pub fn new(home_team: impl Into<String>, away_team: impl Into<String>) -> Self {
        Self {
            home_team: home_team.into(),
            away_team: away_team.into(),
        }
    }
}

#[derive(Serialize)]
struct PredictBody<'a> {
    home_team: &'a str,
    away_team: &'a str,
    window: u32,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    matches: &'a [FixtureRequest],
    window: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamList {
    pub teams: Vec<String>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct PredictionClient {
    base_url: String,
    http: reqwest::Client,
}

impl PredictionClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn from_config(config: &PredictionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MatchfeedError::Http(format!("HTTP client error: {}", e)))?;
        Ok(Self::new(config.base_url.clone(), http))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<Value> {
        let url = self.url(&["health"])?;
        self.send(self.http.get(url)).await
    }

    /// `POST /api/predict`
    pub async fn predict(&self, home_team: &str, away_team: &str, window: u32) -> Result<Value> {
        let url = self.url(&["api", "predict"])?;
        let body = PredictBody {
            home_team,
            away_team,
            window,
        };
        self.send(self.http.post(url).json(&body)).await
    }

    /// `POST /api/batch-predict`
    pub async fn batch_predict(&self, fixtures: &[FixtureRequest], window: u32) -> Result<Value> {
        let url = self.url(&["api", "batch-predict"])?;
        let body = BatchBody {
            matches: fixtures,
            window,
        };
        self.send(self.http.post(url).json(&body)).await
    }

    /// `GET /api/teams`
    pub async fn teams(&self) -> Result<TeamList> {
        let url = self.url(&["api", "teams"])?;
        let value = self.send(self.http.get(url)).await?;
        serde_json::from_value(value).map_err(|e| MatchfeedError::Parse(e.to_string()))
    }

    /// `GET /api/team-form/{team}?window=N`
    pub async fn team_form(&self, team: &str, window: u32) -> Result<Value> {
        let url = self.url(&["api", "team-form", team])?;
        let request = self.http.get(url).query(&[("window", window)]);
        self.send(request).await
    }

    /// Base URL plus percent-encoded path segments
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| MatchfeedError::Config(format!("Invalid prediction URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MatchfeedError::Config(format!("Invalid prediction URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| "Prediction service unavailable".to_string());
            return Err(MatchfeedError::Http(format!("{}: {}", status, message)));
        }

        serde_json::from_slice(&body).map_err(|e| MatchfeedError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port_url, StubServer};

    fn client(base_url: &str) -> PredictionClient {
        PredictionClient::new(base_url, reqwest::Client::new())
    }

    fn body_of(request: &str) -> Value {
        let body = request.split("\r\n\r\n").nth(1).unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_predict_posts_teams_and_window() {
        let server = StubServer::start(200, r#"{"prediction":"Home Win","confidence":0.61}"#).await;

        let result = client(&server.base_url)
            .predict("Arsenal FC", "Chelsea FC", DEFAULT_FORM_WINDOW)
            .await
            .unwrap();

        assert_eq!(result["prediction"], "Home Win");
        let request = &server.requests()[0];
        assert!(request.starts_with("POST /api/predict "));
        let body = body_of(request);
        assert_eq!(body["home_team"], "Arsenal FC");
        assert_eq!(body["away_team"], "Chelsea FC");
        assert_eq!(body["window"], 10);
    }

    #[tokio::test]
    async fn test_batch_predict_sends_matches_array() {
        let server = StubServer::start(200, r#"{"predictions":[],"errors":[],"successful":0}"#).await;
        let fixtures = vec![
            FixtureRequest::new("Arsenal FC", "Chelsea FC"),
            FixtureRequest::new("Everton FC", "Fulham FC"),
        ];

        client(&server.base_url).batch_predict(&fixtures, 5).await.unwrap();

        let request = &server.requests()[0];
        assert!(request.starts_with("POST /api/batch-predict "));
        let body = body_of(request);
        assert_eq!(body["matches"].as_array().unwrap().len(), 2);
        assert_eq!(body["matches"][1]["home_team"], "Everton FC");
        assert_eq!(body["window"], 5);
    }

    #[tokio::test]
    async fn test_teams() {
        let server = StubServer::start(200, r#"{"teams":["Arsenal FC","Chelsea FC"],"count":2}"#).await;

        let teams = client(&server.base_url).teams().await.unwrap();

        assert_eq!(teams.teams, vec!["Arsenal FC", "Chelsea FC"]);
        assert_eq!(teams.count, 2);
    }

    #[tokio::test]
    async fn test_team_form_encodes_name() {
        let server = StubServer::start(200, r#"{"team":"Brighton & Hove Albion FC"}"#).await;

        client(&server.base_url)
            .team_form("Brighton & Hove Albion FC", 6)
            .await
            .unwrap();

        let request = &server.requests()[0];
        assert!(request.starts_with(
            "GET /api/team-form/Brighton%20&%20Hove%20Albion%20FC?window=6 "
        ));
    }

    #[tokio::test]
    async fn test_error_field_is_surfaced() {
        let server = StubServer::start(404, r#"{"error":"Team not found: Nowhere FC"}"#).await;

        let err = client(&server.base_url)
            .predict("Nowhere FC", "Arsenal FC", 10)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Team not found: Nowhere FC"));
    }

    #[tokio::test]
    async fn test_error_without_body_has_fallback_message() {
        let server = StubServer::start(500, "oops").await;

        let err = client(&server.base_url).health().await.unwrap_err();

        assert!(err.to_string().contains("Prediction service unavailable"));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_http_error() {
        let err = client(&closed_port_url().await).health().await.unwrap_err();
        assert!(matches!(err, MatchfeedError::Http(_)));
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let client = client("http://localhost:5001/prediction/");
        let url = client.url(&["api", "teams"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5001/prediction/api/teams");
    }
}
