//! HTTP+JSON remote.
//!
//! Routes, relative to the configured base URL:
//! - `GET  {collection}/{id}`                 one entity, 404 when absent
//! - `GET  {collection}?scope={scope_id}`     entities of an owner/seeker
//! - `POST {collection}`                      create from a draft
//! - `GET  discover/{seeker_id}?limit={n}`    next page of candidates
//! - `POST discover/{seeker_id}/decisions`    record a swipe

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::model::candidate::{Candidate, SwipeDecision};
use crate::model::entity::CacheableEntity;
use crate::model::listing::{Match, Property, PropertyOwner, Roommate};
use crate::remote::{CandidateSource, RemoteError, RemoteSource};

/// Maps a payload type onto its REST collection.
pub trait RemoteResource {
    const COLLECTION: &'static str;
}

impl RemoteResource for Property {
    const COLLECTION: &'static str = "properties";
}

impl RemoteResource for Roommate {
    const COLLECTION: &'static str = "roommates";
}

impl RemoteResource for PropertyOwner {
    const COLLECTION: &'static str = "owners";
}

impl RemoteResource for Match {
    const COLLECTION: &'static str = "matches";
}

#[derive(Debug, Serialize)]
struct DecisionBody<'a> {
    candidate_id: &'a str,
    decision: SwipeDecision,
}

/// reqwest-backed client for the matching API.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(config.base_url.clone()));
        }
        Ok(Self { client, base_url })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and decode the body; 404 maps to `None`.
    async fn send_optional<R, B>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Option<R>, RemoteError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self.client.request(method.clone(), url.clone()).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        debug!(%method, url = %url, status = status.as_u16(), "Remote call");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(Some(response.json::<R>().await?))
    }
}

#[async_trait]
impl<T> RemoteSource<T> for HttpRemote
where
    T: CacheableEntity + RemoteResource,
{
    async fn fetch_by_id(&self, entity_id: &str) -> Result<Option<T>, RemoteError> {
        let url = self.url(&[T::COLLECTION, entity_id])?;
        self.send_optional::<T, ()>(Method::GET, url, &[], None).await
    }

    async fn fetch_by_scope(&self, scope_id: &str) -> Result<Option<Vec<T>>, RemoteError> {
        let url = self.url(&[T::COLLECTION])?;
        self.send_optional::<Vec<T>, ()>(Method::GET, url, &[("scope", scope_id.to_string())], None)
            .await
    }

    async fn create(&self, draft: &T) -> Result<Option<T>, RemoteError> {
        let url = self.url(&[T::COLLECTION])?;
        self.send_optional(Method::POST, url, &[], Some(draft)).await
    }
}

#[async_trait]
impl CandidateSource for HttpRemote {
    async fn fetch_next_page(
        &self,
        seeker_id: &str,
        limit: usize,
    ) -> Result<Vec<Candidate>, RemoteError> {
        let url = self.url(&["discover", seeker_id])?;
        let page = self
            .send_optional::<Vec<Candidate>, ()>(
                Method::GET,
                url.clone(),
                &[("limit", limit.to_string())],
                None,
            )
            .await?;
        // An unknown seeker is a failure, not an exhausted feed.
        page.ok_or(RemoteError::Status {
            status: StatusCode::NOT_FOUND.as_u16(),
            url: url.to_string(),
        })
    }

    async fn submit_decision(
        &self,
        seeker_id: &str,
        candidate_id: &str,
        decision: SwipeDecision,
    ) -> Result<(), RemoteError> {
        let url = self.url(&["discover", seeker_id, "decisions"])?;
        let body = DecisionBody {
            candidate_id,
            decision,
        };
        let response = self.client.post(url.clone()).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(base: &str) -> HttpRemote {
        HttpRemote::new(&RemoteConfig {
            base_url: base.to_string(),
            request_timeout_ms: 1000,
        })
        .unwrap()
    }

    #[test]
    fn test_url_joins_and_escapes_segments() {
        let remote = remote("http://localhost:9000/api/");
        let url = remote.url(&["properties", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/properties/a%20b%2Fc");
    }

    #[test]
    fn test_url_without_path() {
        let remote = remote("http://localhost:9000");
        let url = remote.url(&["discover", "s1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/discover/s1");
    }

    #[test]
    fn test_rejects_invalid_base() {
        let result = HttpRemote::new(&RemoteConfig {
            base_url: "not a url".to_string(),
            request_timeout_ms: 1000,
        });
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }
}
