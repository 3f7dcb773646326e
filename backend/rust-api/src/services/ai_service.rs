use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::metrics::record_collaborator_request;
use crate::models::activity::{Section, MAX_CHRONOLOGY_EVENTS};

/// Client for the AI collaborator service. Image search, story generation
/// and the like live entirely behind that service; this process only asks
/// it for distractor images and chronology events, and degrades to local
/// fallbacks when it is unreachable.
pub struct AiService {
    http_client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct DistractorRequest<'a> {
    section_text: &'a str,
    exclude_image_id: &'a str,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct DistractorResponse {
    image_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChronologyRequest<'a> {
    story: &'a str,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct ChronologyResponse {
    events: Vec<String>,
}

impl AiService {
    pub fn new(base_url: String) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
        }
    }

    /// Two distractor image ids for a recognition question on `section`.
    pub async fn section_distractors(&self, section: &Section) -> Result<[String; 2]> {
        let favorite_id = section
            .favorite
            .as_ref()
            .map(|image| image.id.as_str())
            .unwrap_or_default();

        let url = format!("{}/internal/generate_distractors", self.base_url);
        let payload = DistractorRequest {
            section_text: &section.text,
            exclude_image_id: favorite_id,
            count: 2,
        };

        let result = self
            .post_json::<_, DistractorResponse>(&url, &payload)
            .await;
        record_collaborator_request("distractors", result.is_ok());

        let response = result?;
        let mut ids = response.image_ids.into_iter();
        match (ids.next(), ids.next()) {
            (Some(first), Some(second)) => Ok([first, second]),
            _ => Err(anyhow!("collaborator returned fewer than 2 distractors")),
        }
    }

    /// Ordered event labels extracted from a generated story, used as the
    /// chronology question's reference order.
    pub async fn chronology_events(&self, story: &str) -> Result<Vec<String>> {
        let url = format!("{}/internal/extract_chronology", self.base_url);
        let payload = ChronologyRequest {
            story,
            count: MAX_CHRONOLOGY_EVENTS as u32,
        };

        let result = self
            .post_json::<_, ChronologyResponse>(&url, &payload)
            .await;
        record_collaborator_request("chronology", result.is_ok());

        let response = result?;
        if response.events.is_empty() {
            return Err(anyhow!("collaborator returned no chronology events"));
        }
        Ok(response
            .events
            .into_iter()
            .take(MAX_CHRONOLOGY_EVENTS)
            .collect())
    }

    async fn post_json<Req, Resp>(&self, url: &str, payload: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .http_client
            .post(url)
            .json(payload)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .context("Failed to call AI collaborator")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!(
                "AI collaborator returned error {}: {}",
                status,
                error_text
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse AI collaborator response")
    }
}

/// Local fallback: the section's own non-favorite candidates, in order.
/// Returns None when the section holds fewer than two of them.
pub fn fallback_distractors(section: &Section) -> Option<[String; 2]> {
    let favorite_id = section.favorite.as_ref().map(|image| image.id.as_str());
    let mut candidates = section
        .images
        .iter()
        .filter(|image| Some(image.id.as_str()) != favorite_id)
        .map(|image| image.id.clone());

    let first = candidates.next()?;
    let second = candidates.next()?;
    Some([first, second])
}

/// Local fallback: naive sentence segmentation of the story, first four
/// sentences become the reference order.
pub fn fallback_chronology_events(story: &str) -> Vec<String> {
    story
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .take(MAX_CHRONOLOGY_EVENTS)
        .map(str::to_string)
        .collect()
}
