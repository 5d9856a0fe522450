use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::utils::{truncate_text, url_escape};

pub const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Gap between the end of one attempt and the start of the next, across all
/// callers; the public service allows one request per second.
const MIN_REQUEST_GAP: Duration = Duration::from_secs(1);
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RETRIES: u32 = 2;
const BODY_SNIPPET_MAX: usize = 500;
const SEARCH_LIMIT: usize = 5;
const PAGE_SIZE: usize = 100;
const EXACT_NAME_BONUS: i64 = 20;

#[derive(Debug)]
pub enum MetadataClientError {
    Http { status: u16, snippet: String },
    Timeout,
    Network(String),
    Decode(String),
    QueueClosed,
}

impl MetadataClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            MetadataClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetadataClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataClientError::Http { status, snippet } => {
                write!(f, "upstream status {}: {}", status, snippet)
            }
            MetadataClientError::Timeout => write!(f, "upstream request timed out"),
            MetadataClientError::Network(message) => write!(f, "network error: {}", message),
            MetadataClientError::Decode(message) => write!(f, "invalid upstream payload: {}", message),
            MetadataClientError::QueueClosed => write!(f, "metadata request queue is closed"),
        }
    }
}

impl std::error::Error for MetadataClientError {}

#[derive(Clone, Debug)]
pub struct ArtistMatch {
    pub mbid: String,
    pub name: String,
    pub score: i64,
}

#[derive(Clone, Debug)]
pub struct ReleaseGroup {
    pub mb_release_group_id: Option<String>,
    pub title: String,
    pub year: Option<i64>,
    pub primary_type: Option<String>,
    pub secondary_types: Vec<String>,
}

/// Seam between the discography service and the wire client, so syncs are
/// testable without the network.
#[async_trait]
pub trait ReleaseGroupSource: Send + Sync {
    async fn find_artist_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ArtistMatch>, MetadataClientError>;

    async fn fetch_artist_albums(
        &self,
        mbid: &str,
    ) -> Result<Vec<ReleaseGroup>, MetadataClientError>;
}

/// Handle to the process-wide fetch queue. Cloning shares the single worker;
/// all requests from all callers are strictly serialized through it.
#[derive(Clone)]
pub struct MusicBrainzClient {
    base_url: String,
    tx: mpsc::Sender<FetchJob>,
}

struct FetchJob {
    url: String,
    reply: oneshot::Sender<Result<Value, MetadataClientError>>,
}

impl MusicBrainzClient {
    pub fn new(user_agent: &str) -> Result<Self, MetadataClientError> {
        Self::with_base_url(MUSICBRAINZ_BASE_URL.to_string(), user_agent)
    }

    pub fn with_base_url(base_url: String, user_agent: &str) -> Result<Self, MetadataClientError> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            // Bind v4 so dual-stack hosts do not stall on broken v6 routes.
            .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
            .build()
            .map_err(|err| MetadataClientError::Network(err.to_string()))?;
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            FetchWorker {
                rx,
                client,
                last_attempt_end: None,
            }
            .run()
            .await;
        });
        Ok(Self { base_url, tx })
    }

    async fn get_json(&self, url: String) -> Result<Value, MetadataClientError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(FetchJob { url, reply })
            .await
            .map_err(|_| MetadataClientError::QueueClosed)?;
        rx.await.map_err(|_| MetadataClientError::QueueClosed)?
    }

    /// Searches the artist index and picks the best of the first five
    /// candidates: upstream score, plus a bonus for an exact
    /// case-insensitive name match, minus the list position.
    pub async fn find_artist_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ArtistMatch>, MetadataClientError> {
        let query = format!("artist:\"{}\"", name);
        let url = format!(
            "{}/artist?query={}&limit={}&fmt=json",
            self.base_url,
            url_escape(&query),
            SEARCH_LIMIT
        );
        let value = self.get_json(url).await?;

        let candidates = value
            .get("artists")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let wanted = name.to_lowercase();
        let mut best: Option<ArtistMatch> = None;
        for (position, candidate) in candidates.iter().take(SEARCH_LIMIT).enumerate() {
            let mbid = match candidate.get("id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let candidate_name = candidate
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let upstream_score = candidate.get("score").and_then(Value::as_i64).unwrap_or(0);
            let exact_bonus = if candidate_name.to_lowercase() == wanted {
                EXACT_NAME_BONUS
            } else {
                0
            };
            let score = upstream_score + exact_bonus - position as i64;
            if best.as_ref().map(|current| score > current.score).unwrap_or(true) {
                best = Some(ArtistMatch {
                    mbid,
                    name: candidate_name,
                    score,
                });
            }
        }
        Ok(best)
    }

    /// Pages through an artist's release-groups and keeps albums and
    /// compilations. The loop ends on an empty page or once the reported
    /// total is reached.
    pub async fn fetch_artist_albums(
        &self,
        mbid: &str,
    ) -> Result<Vec<ReleaseGroup>, MetadataClientError> {
        let mut out = Vec::new();
        let mut offset = 0usize;
        loop {
            let url = format!(
                "{}/release-group?artist={}&limit={}&offset={}&fmt=json",
                self.base_url,
                url_escape(mbid),
                PAGE_SIZE,
                offset
            );
            let value = self.get_json(url).await?;
            let groups = value
                .get("release-groups")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if groups.is_empty() {
                break;
            }
            let total = value
                .get("release-group-count")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;

            for group in &groups {
                let primary_type = group
                    .get("primary-type")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !primary_type.eq_ignore_ascii_case("album")
                    && !primary_type.eq_ignore_ascii_case("compilation")
                {
                    continue;
                }
                let title = match group.get("title").and_then(Value::as_str) {
                    Some(title) => title.to_string(),
                    None => continue,
                };
                let secondary_types = group
                    .get("secondary-types")
                    .and_then(Value::as_array)
                    .map(|types| {
                        types
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                out.push(ReleaseGroup {
                    mb_release_group_id: group
                        .get("id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    title,
                    year: group
                        .get("first-release-date")
                        .and_then(Value::as_str)
                        .and_then(parse_release_year),
                    primary_type: Some(primary_type.to_string()),
                    secondary_types,
                });
            }

            offset += groups.len();
            if offset >= total {
                break;
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl ReleaseGroupSource for MusicBrainzClient {
    async fn find_artist_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ArtistMatch>, MetadataClientError> {
        MusicBrainzClient::find_artist_by_name(self, name).await
    }

    async fn fetch_artist_albums(
        &self,
        mbid: &str,
    ) -> Result<Vec<ReleaseGroup>, MetadataClientError> {
        MusicBrainzClient::fetch_artist_albums(self, mbid).await
    }
}

fn parse_release_year(date: &str) -> Option<i64> {
    let prefix = date.get(0..4)?;
    if prefix.chars().all(|c| c.is_ascii_digit()) {
        prefix.parse().ok()
    } else {
        None
    }
}

enum AttemptError {
    RateLimited {
        status: u16,
        retry_after: Option<Duration>,
        snippet: String,
    },
    Timeout,
    Network(String),
    Fatal(MetadataClientError),
}

struct FetchWorker {
    rx: mpsc::Receiver<FetchJob>,
    client: Client,
    last_attempt_end: Option<Instant>,
}

impl FetchWorker {
    async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            let result = self.fetch_with_retries(&job.url).await;
            // Receiver hung up: caller timed out, nothing to do.
            let _ = job.reply.send(result);
        }
    }

    async fn fetch_with_retries(&mut self, url: &str) -> Result<Value, MetadataClientError> {
        let mut attempt = 0u32;
        let mut network_retried = false;
        loop {
            self.wait_for_gap().await;
            match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::RateLimited {
                    status,
                    retry_after,
                    snippet,
                }) => {
                    if attempt >= MAX_RETRIES {
                        return Err(MetadataClientError::Http { status, snippet });
                    }
                    let backoff = retry_after
                        .unwrap_or_else(|| BASE_BACKOFF * 2u32.saturating_pow(attempt));
                    debug!("upstream {} for {}, backing off {:?}", status, url, backoff);
                    tokio::time::sleep(backoff).await;
                }
                Err(AttemptError::Timeout) => {
                    if network_retried || attempt >= MAX_RETRIES {
                        return Err(MetadataClientError::Timeout);
                    }
                    network_retried = true;
                    warn!("timeout fetching {}, retrying once", url);
                }
                Err(AttemptError::Network(message)) => {
                    if network_retried || attempt >= MAX_RETRIES {
                        return Err(MetadataClientError::Network(message));
                    }
                    network_retried = true;
                    warn!("network error fetching {}: {}, retrying once", url, message);
                }
            }
            attempt += 1;
        }
    }

    async fn wait_for_gap(&self) {
        if let Some(end) = self.last_attempt_end {
            let elapsed = end.elapsed();
            if elapsed < MIN_REQUEST_GAP {
                tokio::time::sleep(MIN_REQUEST_GAP - elapsed).await;
            }
        }
    }

    async fn attempt(&mut self, url: &str) -> Result<Value, AttemptError> {
        let result = self
            .client
            .get(url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let outcome = match result {
            Err(err) if err.is_timeout() => Err(AttemptError::Timeout),
            Err(err) => Err(AttemptError::Network(err.to_string())),
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success() {
                    match response.bytes().await {
                        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                            AttemptError::Fatal(MetadataClientError::Decode(err.to_string()))
                        }),
                        Err(err) => Err(AttemptError::Network(err.to_string())),
                    }
                } else if status == 429 || status == 503 {
                    let retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .and_then(|value| value.trim().parse::<f64>().ok())
                        .filter(|secs| secs.is_finite() && *secs >= 0.0)
                        .map(Duration::from_secs_f64);
                    let snippet = body_snippet(response).await;
                    Err(AttemptError::RateLimited {
                        status,
                        retry_after,
                        snippet,
                    })
                } else {
                    let snippet = body_snippet(response).await;
                    Err(AttemptError::Fatal(MetadataClientError::Http {
                        status,
                        snippet,
                    }))
                }
            }
        };
        self.last_attempt_end = Some(Instant::now());
        outcome
    }
}

async fn body_snippet(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(body) => truncate_text(&body, BODY_SNIPPET_MAX),
        Err(_) => String::new(),
    }
}
