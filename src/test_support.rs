//! Test doubles: loopback HTTP responder and in-memory match source

use crate::sources::MatchSource;
use crate::types::{MatchStatus, RawMatch};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

/// One-connection-per-request HTTP/1.1 stub bound to 127.0.0.1
pub struct StubServer {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// Answer every request with the same status and body
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::with_handler(move |_| (status, body.clone())).await
    }

    /// Answer using `handler(request_line)`
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Handler = Arc::new(handler);

        let task_hits = Arc::clone(&hits);
        let task_requests = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                task_hits.fetch_add(1, Ordering::SeqCst);
                let handler = Arc::clone(&handler);
                let requests = Arc::clone(&task_requests);
                tokio::spawn(async move {
                    serve_one(socket, handler, requests).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            requests,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Raw requests received so far (head + body)
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn serve_one(mut socket: TcpStream, handler: Handler, requests: Arc<Mutex<Vec<String>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    // Read the head, then as much body as Content-Length announces
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(head_end) = find_head_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }

    let raw = String::from_utf8_lossy(&buf).into_owned();
    let request_line = raw.lines().next().unwrap_or_default().to_string();
    requests.lock().unwrap().push(raw);

    let (status, body) = handler(&request_line);
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason(status),
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// Base URL of a loopback port with nothing listening
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// In-memory match source that records every call
#[derive(Default)]
pub struct FakeSource {
    historical: HashMap<(String, String), Vec<RawMatch>>,
    current: HashMap<String, Vec<RawMatch>>,
    upcoming: HashMap<String, Vec<RawMatch>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_historical(mut self, source_id: &str, season: &str, matches: Vec<RawMatch>) -> Self {
        self.historical
            .insert((source_id.to_string(), season.to_string()), matches);
        self
    }

    pub fn with_current(mut self, competition: &str, matches: Vec<RawMatch>) -> Self {
        self.current.insert(competition.to_string(), matches);
        self
    }

    pub fn with_upcoming(mut self, competition: &str, matches: Vec<RawMatch>) -> Self {
        self.upcoming.insert(competition.to_string(), matches);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MatchSource for FakeSource {
    async fn fetch_historical(&self, source_id: &str, season: &str) -> Option<Vec<RawMatch>> {
        self.record(format!("historical {} {}", source_id, season));
        self.historical
            .get(&(source_id.to_string(), season.to_string()))
            .cloned()
    }

    async fn fetch_current(&self, competition: &str, season_year: i32) -> Option<Vec<RawMatch>> {
        self.record(format!("current {} {}", competition, season_year));
        self.current.get(competition).cloned()
    }

    async fn fetch_upcoming(
        &self,
        competition: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Option<Vec<RawMatch>> {
        self.record(format!("upcoming {} {} {}", competition, from, to));
        self.upcoming.get(competition).cloned()
    }
}

/// Raw match at noon UTC on `date`
pub fn raw_match(
    date: NaiveDate,
    home: &str,
    away: &str,
    goals: Option<(u32, u32)>,
    status: MatchStatus,
) -> RawMatch {
    RawMatch {
        kickoff: date.and_hms_opt(12, 0, 0).unwrap(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_goals: goals.map(|g| g.0),
        away_goals: goals.map(|g| g.1),
        status,
        round: None,
        season: None,
    }
}
