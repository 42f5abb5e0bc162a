//! MusicBrainz WS/2 catalog collaborator.
//!
//! Blocking client behind the `Catalog` trait. The service's usage policy
//! requires client self-identification and spaced requests; identification
//! lives in [`ClientConfig`] and is passed in once at construction, spacing
//! is the strategy chain's job.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Results requested per search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 5;

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single catalog call. The chain absorbs these as "zero
/// candidates from this call"; nothing here ever aborts a row.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("catalog response not decodable: {0}")]
    Malformed(String),
}

// ============================================================================
// Hit Models
// ============================================================================

/// One release from a release search.
#[derive(Clone, Debug)]
pub struct ReleaseHit {
    pub id: String,
    pub title: String,
    pub date: Option<String>,
    pub artist_credit_name: String,
}

/// One recording from a recording search.
#[derive(Clone, Debug)]
pub struct RecordingHit {
    pub id: String,
    pub title: String,
    pub first_release_date: Option<String>,
    pub artist_credit_name: String,
}

/// The catalog seam. Query strings use the WS/2 field grammar:
/// `field:"value"` anchors, `AND` combines, bare text is unanchored, and
/// `rid:<id>` selects the releases of one recording.
pub trait Catalog {
    fn search_releases(&self, query: &str, limit: u32) -> Result<Vec<ReleaseHit>, CatalogError>;
    fn search_recordings(&self, query: &str, limit: u32)
        -> Result<Vec<RecordingHit>, CatalogError>;
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Client self-identification required by the catalog usage policy.
/// Built once in `main` and handed to the client constructor.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub app: String,
    pub version: String,
    pub contact: String,
}

impl ClientConfig {
    pub fn user_agent(&self) -> String {
        format!("{}/{} ({})", self.app, self.version, self.contact)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact: "https://github.com/scrolltunes/yearfill".to_string(),
        }
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

/// Blocking MusicBrainz search client.
pub struct MusicBrainzClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl MusicBrainzClient {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self {
            agent,
            user_agent: config.user_agent(),
        }
    }

    fn request(&self, entity: &str, query: &str, limit: u32) -> Result<String, CatalogError> {
        let url = format!(
            "{MUSICBRAINZ_BASE_URL}/{entity}?query={}&limit={limit}&fmt=json",
            urlencoding::encode(query)
        );
        let response = self
            .agent
            .get(&url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json")
            .call()
            .map_err(|error| CatalogError::Transport(error.to_string()))?;
        response
            .into_string()
            .map_err(|error| CatalogError::Transport(format!("failed to read response: {error}")))
    }
}

impl Catalog for MusicBrainzClient {
    fn search_releases(&self, query: &str, limit: u32) -> Result<Vec<ReleaseHit>, CatalogError> {
        let body = self.request("release", query, limit)?;
        let decoded: ReleaseSearchBody = serde_json::from_str(&body)
            .map_err(|error| CatalogError::Malformed(error.to_string()))?;
        Ok(decoded.releases.into_iter().map(ReleaseHit::from).collect())
    }

    fn search_recordings(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<RecordingHit>, CatalogError> {
        let body = self.request("recording", query, limit)?;
        let decoded: RecordingSearchBody = serde_json::from_str(&body)
            .map_err(|error| CatalogError::Malformed(error.to_string()))?;
        Ok(decoded
            .recordings
            .into_iter()
            .map(RecordingHit::from)
            .collect())
    }
}

// ============================================================================
// WS/2 Response Decoding
// ============================================================================

#[derive(Deserialize)]
struct ReleaseSearchBody {
    #[serde(default)]
    releases: Vec<RawRelease>,
}

#[derive(Deserialize)]
struct RawRelease {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<RawArtistCredit>,
}

#[derive(Deserialize)]
struct RecordingSearchBody {
    #[serde(default)]
    recordings: Vec<RawRecording>,
}

#[derive(Deserialize)]
struct RawRecording {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "first-release-date", default)]
    first_release_date: Option<String>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<RawArtistCredit>,
}

#[derive(Deserialize)]
struct RawArtistCredit {
    #[serde(default)]
    name: String,
}

fn first_credit_name(credits: &[RawArtistCredit]) -> String {
    credits
        .first()
        .map(|credit| credit.name.clone())
        .unwrap_or_default()
}

impl From<RawRelease> for ReleaseHit {
    fn from(raw: RawRelease) -> Self {
        let artist_credit_name = first_credit_name(&raw.artist_credit);
        Self {
            id: raw.id,
            title: raw.title,
            date: raw.date,
            artist_credit_name,
        }
    }
}

impl From<RawRecording> for RecordingHit {
    fn from(raw: RawRecording) -> Self {
        let artist_credit_name = first_credit_name(&raw.artist_credit);
        Self {
            id: raw.id,
            title: raw.title,
            first_release_date: raw.first_release_date,
            artist_credit_name,
        }
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    pub fn release(id: &str, title: &str, date: Option<&str>, artist: &str) -> ReleaseHit {
        ReleaseHit {
            id: id.to_string(),
            title: title.to_string(),
            date: date.map(str::to_string),
            artist_credit_name: artist.to_string(),
        }
    }

    pub fn recording(id: &str, title: &str, date: Option<&str>, artist: &str) -> RecordingHit {
        RecordingHit {
            id: id.to_string(),
            title: title.to_string(),
            first_release_date: date.map(str::to_string),
            artist_credit_name: artist.to_string(),
        }
    }

    /// Deterministic in-memory catalog. Hits are keyed by a substring of the
    /// query; queries matching a failure needle return a transport error.
    #[derive(Default)]
    pub struct ScriptedCatalog {
        pub releases: Vec<(String, Vec<ReleaseHit>)>,
        pub recordings: Vec<(String, Vec<RecordingHit>)>,
        pub transport_failures: Vec<String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedCatalog {
        pub fn with_release(mut self, needle: &str, hits: Vec<ReleaseHit>) -> Self {
            self.releases.push((needle.to_string(), hits));
            self
        }

        pub fn with_recording(mut self, needle: &str, hits: Vec<RecordingHit>) -> Self {
            self.recordings.push((needle.to_string(), hits));
            self
        }

        pub fn failing_on(mut self, needle: &str) -> Self {
            self.transport_failures.push(needle.to_string());
            self
        }

        fn check_failure(&self, query: &str) -> Result<(), CatalogError> {
            if self.transport_failures.iter().any(|n| query.contains(n)) {
                return Err(CatalogError::Transport("scripted failure".to_string()));
            }
            Ok(())
        }
    }

    impl Catalog for ScriptedCatalog {
        fn search_releases(
            &self,
            query: &str,
            _limit: u32,
        ) -> Result<Vec<ReleaseHit>, CatalogError> {
            self.calls.borrow_mut().push(format!("release:{query}"));
            self.check_failure(query)?;
            Ok(self
                .releases
                .iter()
                .filter(|(needle, _)| query.contains(needle.as_str()))
                .flat_map(|(_, hits)| hits.clone())
                .collect())
        }

        fn search_recordings(
            &self,
            query: &str,
            _limit: u32,
        ) -> Result<Vec<RecordingHit>, CatalogError> {
            self.calls.borrow_mut().push(format!("recording:{query}"));
            self.check_failure(query)?;
            Ok(self
                .recordings
                .iter()
                .filter(|(needle, _)| query.contains(needle.as_str()))
                .flat_map(|(_, hits)| hits.clone())
                .collect())
        }
    }
}
