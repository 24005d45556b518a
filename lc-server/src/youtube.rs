//! YouTube search and oEmbed integration
//!
//! Thin, best-effort wrappers around two external endpoints:
//!
//! - Search: YouTube Data API v3 `search.list` (requires an API key)
//! - oEmbed: the keyless `youtube.com/oembed` single-video lookup
//!
//! Both fall back to placeholder values when the endpoint is unreachable,
//! returns an error, or no API key is configured. The rest of the service
//! treats the results as plain data; no retry logic lives here.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use lc_common::models::{VideoEmbed, VideoSearchResult};

/// YouTube Data API base URL
const SEARCH_API_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// oEmbed endpoint (no API key required)
const OEMBED_URL: &str = "https://www.youtube.com/oembed";

/// Default timeout for YouTube API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholder thumbnail used when a lookup fails
const PLACEHOLDER_THUMBNAIL: &str = "https://i.ytimg.com/vi/default/hqdefault.jpg";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: String,
    author_name: String,
    thumbnail_url: String,
}

/// Best-effort YouTube client
#[derive(Clone)]
pub struct YouTubeClient {
    http: Client,
    api_key: Option<String>,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http, api_key }
    }

    /// Search for videos matching a query
    ///
    /// Returns placeholder results when no API key is configured or the
    /// request fails; the caller cannot distinguish the two and should not
    /// need to.
    pub async fn search(&self, query: &str) -> Vec<VideoSearchResult> {
        let Some(api_key) = &self.api_key else {
            warn!("YouTube search without API key; returning placeholders");
            return placeholder_results(query);
        };

        let request = self
            .http
            .get(SEARCH_API_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", "10"),
                ("q", query),
                ("key", api_key),
            ])
            .send();

        let response = match request.await {
            Ok(response) => response,
            Err(e) => {
                warn!("YouTube search request failed: {}", e);
                return placeholder_results(query);
            }
        };

        let parsed: SearchResponse = match response.error_for_status() {
            Ok(response) => match response.json().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("YouTube search response unparsable: {}", e);
                    return placeholder_results(query);
                }
            },
            Err(e) => {
                warn!("YouTube search returned error status: {}", e);
                return placeholder_results(query);
            }
        };

        parsed
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                let thumbnail = item
                    .snippet
                    .thumbnails
                    .high
                    .or(item.snippet.thumbnails.default)
                    .map(|t| t.url)
                    .unwrap_or_else(|| PLACEHOLDER_THUMBNAIL.to_string());
                Some(VideoSearchResult {
                    id,
                    title: item.snippet.title,
                    thumbnail,
                    // search.list does not return durations; a second
                    // videos.list call would. Zero means unknown here.
                    duration: 0,
                    channel: item.snippet.channel_title,
                })
            })
            .collect()
    }

    /// Fetch single-video metadata via oEmbed
    pub async fn oembed(&self, video_id: &str) -> VideoEmbed {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);

        let request = self
            .http
            .get(OEMBED_URL)
            .query(&[("url", url.as_str()), ("format", "json")])
            .send();

        match request.await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => match response.json::<OEmbedResponse>().await {
                    Ok(parsed) => {
                        return VideoEmbed {
                            title: parsed.title,
                            author: parsed.author_name,
                            thumbnail: parsed.thumbnail_url,
                        }
                    }
                    Err(e) => warn!("oEmbed response unparsable: {}", e),
                },
                Err(e) => warn!("oEmbed returned error status: {}", e),
            },
            Err(e) => warn!("oEmbed request failed: {}", e),
        }

        placeholder_embed(video_id)
    }
}

fn placeholder_results(query: &str) -> Vec<VideoSearchResult> {
    vec![VideoSearchResult {
        id: "placeholder".to_string(),
        title: format!("Search unavailable: {}", query),
        thumbnail: PLACEHOLDER_THUMBNAIL.to_string(),
        duration: 0,
        channel: "LifeCurriculum".to_string(),
    }]
}

fn placeholder_embed(video_id: &str) -> VideoEmbed {
    VideoEmbed {
        title: format!("Video {}", video_id),
        author: "Unknown".to_string(),
        thumbnail: PLACEHOLDER_THUMBNAIL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_without_key_returns_placeholder() {
        let client = YouTubeClient::new(None);
        let results = client.search("rust lifetimes").await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "placeholder");
        assert!(results[0].title.contains("rust lifetimes"));
    }
}
