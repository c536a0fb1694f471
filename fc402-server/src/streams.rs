//! The demo stream catalog and the watch session handed out after payment.
//!
//! Playback URLs point at public sample videos; a real deployment would swap in
//! provider-backed HLS feeds.

use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use fc402::MicroAmount;
use regex::Regex;
use serde::Serialize;

use crate::pricing::{CURRENCY, PriceTier, STREAM_WATCH};

/// Lifetime of a watch session.
pub const SESSION_TTL_SECONDS: u32 = 15 * 60;

/// Description attached to a paid watch session.
pub const WATCH_PAYMENT_DESCRIPTION: &str =
    "Pay-per-watch live stream session unlocked via x402 payment";

static STREAM_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[a-z0-9-]+$").unwrap()
});

/// Broadcast state of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamStatus {
    /// On air now.
    Live,
    /// Not started yet.
    Upcoming,
    /// Finished, available as a replay.
    Replay,
}

/// A catalog entry.
///
/// Serializes to the public metadata only; playback details stay private until
/// a session is paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Stream {
    /// Lowercase slug.
    pub id: &'static str,
    pub title: &'static str,
    pub competition: &'static str,
    pub home_team: &'static str,
    pub away_team: &'static str,
    pub status: StreamStatus,
    /// Kickoff, RFC 3339.
    pub starts_at_utc: &'static str,
    pub tagline: &'static str,
    #[serde(skip)]
    pub stream_url: &'static str,
    #[serde(skip)]
    pub fallback_embed_url: Option<&'static str>,
    #[serde(skip)]
    pub source_url: Option<&'static str>,
    #[serde(skip)]
    pub mime_type: Option<&'static str>,
}

/// Every stream on offer.
pub static STREAM_CATALOG: [Stream; 3] = [
    Stream {
        id: "premier-league-live-1",
        title: "Premier League Live Hub",
        competition: "Premier League",
        home_team: "North London FC",
        away_team: "Merseyside United",
        status: StreamStatus::Live,
        starts_at_utc: "2026-02-13T18:00:00Z",
        tagline: "Live tactical cam with stadium audio",
        stream_url: "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerEscapes.mp4",
        fallback_embed_url: Some("https://www.youtube.com/embed/aqz-KE-bpKQ"),
        source_url: Some(
            "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerEscapes.mp4",
        ),
        mime_type: Some("video/mp4"),
    },
    Stream {
        id: "laliga-live-2",
        title: "La Liga Matchroom",
        competition: "La Liga",
        home_team: "Madrid City",
        away_team: "Catalonia Athletic",
        status: StreamStatus::Upcoming,
        starts_at_utc: "2026-02-13T20:30:00Z",
        tagline: "Kickoff build-up + full match stream",
        stream_url: "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
        fallback_embed_url: Some("https://www.youtube.com/embed/ScMzIvxBSi4"),
        source_url: Some(
            "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerBlazes.mp4",
        ),
        mime_type: Some("video/mp4"),
    },
    Stream {
        id: "ucl-night-feed",
        title: "Champions Night Feed",
        competition: "UEFA Champions League",
        home_team: "Royal Blue",
        away_team: "Bavarian XI",
        status: StreamStatus::Replay,
        starts_at_utc: "2026-02-12T19:45:00Z",
        tagline: "Full replay with commentary",
        stream_url: "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
        fallback_embed_url: Some("https://www.youtube.com/embed/aqz-KE-bpKQ"),
        source_url: Some(
            "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
        ),
        mime_type: Some("video/mp4"),
    },
];

/// Returns `true` if `id`, once trimmed, is a lowercase slug.
#[must_use]
pub fn is_valid_stream_id(id: &str) -> bool {
    STREAM_ID_PATTERN.is_match(id.trim())
}

/// Looks a stream up by id, ignoring surrounding whitespace and case.
#[must_use]
pub fn find_stream(id: &str) -> Option<&'static Stream> {
    let id = id.trim();
    STREAM_CATALOG
        .iter()
        .find(|stream| stream.id.eq_ignore_ascii_case(id))
}

/// One entry of `GET /api/streams`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(flatten)]
    stream: &'static Stream,
    price: MicroAmount,
    price_formatted: String,
    is_demo_source: bool,
}

/// Body of `GET /api/streams`.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    /// Short network name.
    pub network: &'static str,
    /// Number of streams.
    pub count: usize,
    /// The streams.
    pub streams: Vec<CatalogEntry>,
}

impl CatalogResponse {
    /// The whole catalog priced at `tier`.
    #[must_use]
    pub fn new(network: &'static str, tier: &PriceTier) -> Self {
        let streams: Vec<_> = STREAM_CATALOG
            .iter()
            .map(|stream| CatalogEntry {
                stream,
                price: tier.amount,
                price_formatted: tier.formatted(),
                is_demo_source: true,
            })
            .collect();
        Self {
            network,
            count: streams.len(),
            streams,
        }
    }
}

/// Home and away teams.
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct Teams {
    pub home: &'static str,
    pub away: &'static str,
}

/// The paid session window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct SessionInfo {
    /// `sess_<streamId>_<unix millis>`.
    pub id: String,
    pub issued_at: String,
    pub expires_at: String,
    pub ttl_seconds: u32,
    /// Payer claimed by the proof, `null` when unknown.
    pub paid_by: Option<String>,
}

/// Where and how to play the stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct Playback {
    pub url: &'static str,
    pub source_url: &'static str,
    pub mime_type: &'static str,
    pub fallback_embed_url: Option<&'static str>,
    pub drm: bool,
    pub low_latency: bool,
    pub is_demo_source: bool,
}

/// What the session was paid with.
#[derive(Debug, Clone, Serialize)]
#[allow(missing_docs)]
pub struct PaymentInfo {
    pub amount: MicroAmount,
    pub asset: &'static str,
    pub description: &'static str,
}

/// Body of a successful `GET /api/streams/{id}/watch`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct WatchSession {
    pub stream_id: &'static str,
    pub title: &'static str,
    pub competition: &'static str,
    pub status: StreamStatus,
    pub starts_at_utc: &'static str,
    pub teams: Teams,
    pub session: SessionInfo,
    pub playback: Playback,
    pub payment_info: PaymentInfo,
}

impl WatchSession {
    /// Opens a session on `stream` starting at `now`.
    #[must_use]
    pub fn issue(stream: &'static Stream, paid_by: Option<String>, now: DateTime<Utc>) -> Self {
        let expires = now + TimeDelta::seconds(i64::from(SESSION_TTL_SECONDS));
        Self {
            stream_id: stream.id,
            title: stream.title,
            competition: stream.competition,
            status: stream.status,
            starts_at_utc: stream.starts_at_utc,
            teams: Teams {
                home: stream.home_team,
                away: stream.away_team,
            },
            session: SessionInfo {
                id: format!("sess_{}_{}", stream.id, now.timestamp_millis()),
                issued_at: iso8601(now),
                expires_at: iso8601(expires),
                ttl_seconds: SESSION_TTL_SECONDS,
                paid_by,
            },
            playback: Playback {
                url: stream.stream_url,
                source_url: stream.source_url.unwrap_or(stream.stream_url),
                mime_type: stream.mime_type.unwrap_or("video/mp4"),
                fallback_embed_url: stream.fallback_embed_url,
                drm: false,
                low_latency: false,
                is_demo_source: true,
            },
            payment_info: PaymentInfo {
                amount: STREAM_WATCH.amount,
                asset: CURRENCY,
                description: WATCH_PAYMENT_DESCRIPTION,
            },
        }
    }
}

/// Formats like JavaScript's `toISOString`: millisecond precision, `Z` suffix.
#[must_use]
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
