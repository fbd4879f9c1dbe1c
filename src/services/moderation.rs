//! HTTP client for the external image-moderation collaborator.

use std::env;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};
use thiserror::Error;

/// Environment variable holding the moderation endpoint URL.
const MODERATION_URL_ENV: &str = "MODERATION_API_URL";
/// Environment variable holding the moderation API key.
const MODERATION_KEY_ENV: &str = "MODERATION_API_KEY";

/// Failures that can occur while talking to the moderation API.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The endpoint URL is configured but its API key is missing.
    #[error("`{MODERATION_URL_ENV}` is set but `{MODERATION_KEY_ENV}` is missing")]
    MissingApiKey,
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build moderation client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The check request could not be sent.
    #[error("failed to send moderation request")]
    RequestSend {
        #[source]
        source: reqwest::Error,
    },
    /// The moderation API returned an unexpected status code.
    #[error("unexpected moderation response status {status}")]
    RequestStatus { status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode moderation response")]
    DecodeResponse {
        #[source]
        source: reqwest::Error,
    },
}

/// Scores returned by the moderation API for one image.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModerationVerdict {
    /// Probability that the image contains nudity.
    #[serde(default)]
    pub nudity: f32,
    /// Probability that the image contains graphic violence.
    #[serde(default)]
    pub violence: f32,
}

impl ModerationVerdict {
    /// Whether any score reaches the configured flag threshold.
    pub fn flagged(&self, threshold: f32) -> bool {
        self.nudity.max(self.violence) >= threshold
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
struct ModerationRequest<'a> {
    #[serde_as(as = "Base64")]
    media: &'a [u8],
    models: &'static str,
}

/// Client for the image-moderation API, absent when unconfigured.
#[derive(Debug)]
pub struct ModerationClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ModerationClient {
    /// Build the client from the environment.
    ///
    /// Returns `Ok(None)` when no endpoint is configured (the background gate
    /// then fails closed), and an error when the endpoint is configured
    /// without its key, which callers treat as fatal at startup.
    pub fn from_env() -> Result<Option<Self>, ModerationError> {
        let Ok(endpoint) = env::var(MODERATION_URL_ENV) else {
            return Ok(None);
        };
        let api_key = env::var(MODERATION_KEY_ENV).map_err(|_| ModerationError::MissingApiKey)?;

        let client = Client::builder()
            .build()
            .map_err(|source| ModerationError::ClientBuilder { source })?;

        Ok(Some(Self {
            client,
            endpoint,
            api_key,
        }))
    }

    /// Submit an image for review and return its scores.
    pub async fn check_image(&self, image: &[u8]) -> Result<ModerationVerdict, ModerationError> {
        let request = ModerationRequest {
            media: image,
            models: "nudity,violence",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|source| ModerationError::RequestSend { source })?;

        if !response.status().is_success() {
            return Err(ModerationError::RequestStatus {
                status: response.status(),
            });
        }

        response
            .json::<ModerationVerdict>()
            .await
            .map_err(|source| ModerationError::DecodeResponse { source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_flags_on_either_score() {
        let clean = ModerationVerdict {
            nudity: 0.1,
            violence: 0.2,
        };
        assert!(!clean.flagged(0.7));

        let nude = ModerationVerdict {
            nudity: 0.9,
            violence: 0.0,
        };
        assert!(nude.flagged(0.7));

        let violent = ModerationVerdict {
            nudity: 0.0,
            violence: 0.7,
        };
        assert!(violent.flagged(0.7));
    }
}
