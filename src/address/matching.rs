//! Client for the commercial property match API.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AddressNormalizer, MatchRequest};
use crate::config::MatchingConfig;

/// Addresses per match or lookup call
pub const MATCH_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct MatchResponse {
    matches: Vec<MatchEntry>,
}

#[derive(Debug, Deserialize)]
struct MatchEntry {
    #[serde(default)]
    property_id: Option<String>,
    #[serde(default)]
    params: Option<MatchEcho>,
}

#[derive(Debug, Deserialize)]
struct MatchEcho {
    #[serde(default)]
    custom_id: String,
}

#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    properties: Vec<PropertyEntry>,
}

#[derive(Debug, Deserialize)]
struct PropertyEntry {
    id: String,
    #[serde(default)]
    addresses: Vec<AddressLine>,
}

#[derive(Debug, Deserialize)]
struct AddressLine {
    line1: String,
}

/// Every address line known for a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyAddresses {
    pub id: String,
    pub addresses: Vec<String>,
}

/// Matches addresses to property ids
pub struct PropertyMatchClient {
    client: Client,
    match_url: String,
    properties_url: String,
    user: String,
    api_key: String,
    normalizer: AddressNormalizer,
}

impl PropertyMatchClient {
    /// `base_url` is the properties collection, e.g. `https://api.example.com/v1/nyc/properties`
    pub fn new(
        base_url: &str,
        user: &str,
        api_key: &str,
        timeout: Duration,
        normalizer: AddressNormalizer,
    ) -> Result<Self> {
        let base = base_url.trim_end_matches('/');
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            match_url: format!("{}/matches", base),
            properties_url: base.to_string(),
            user: user.to_string(),
            api_key: api_key.to_string(),
            normalizer,
        })
    }

    /// Client for the configured endpoint; the API key comes from the
    /// environment variable named by `api_key_env`
    pub fn from_config(
        config: &MatchingConfig,
        timeout: Duration,
        normalizer: AddressNormalizer,
    ) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::new(&config.endpoint, &config.user, &api_key, timeout, normalizer)
    }

    /// Property id for one address, `None` when nothing matched
    pub async fn match_address(&self, address: &str) -> Result<Option<String>> {
        let parsed = self.normalizer.parse(address)?;
        let request = MatchRequest::from_parsed(&parsed, None)?;

        let response = self.post_matches(&[request]).await?;
        let property_id = response
            .matches
            .into_iter()
            .next()
            .and_then(|m| m.property_id);

        match &property_id {
            Some(id) => debug!("Matched '{}' to {}", address, id),
            None => info!("No matching building found for '{}'", address),
        }
        Ok(property_id)
    }

    /// Property ids for many addresses, in input order.
    ///
    /// A batch that fails is logged and leaves its rows unmatched.
    pub async fn match_batch(&self, addresses: &[String]) -> Vec<Option<String>> {
        let mut results = vec![None; addresses.len()];

        for (batch, chunk) in addresses.chunks(MATCH_BATCH_SIZE).enumerate() {
            let offset = batch * MATCH_BATCH_SIZE;
            let requests = self.batch_requests(chunk, offset);
            if requests.is_empty() {
                continue;
            }

            match self.post_matches(&requests).await {
                Ok(response) => {
                    apply_matches(&mut results, response);
                    info!("Matched rows {}..{}", offset, offset + chunk.len());
                }
                Err(e) => warn!(
                    "Match call failed for rows {}..{}: {:#}",
                    offset,
                    offset + chunk.len(),
                    e
                ),
            }
        }

        results
    }

    /// Address lines for each property id, batched
    pub async fn addresses_for(&self, property_ids: &[String]) -> Vec<PropertyAddresses> {
        let mut results = Vec::with_capacity(property_ids.len());

        for (batch, chunk) in property_ids.chunks(MATCH_BATCH_SIZE).enumerate() {
            match self.post_properties(chunk).await {
                Ok(response) => results.extend(response.properties.into_iter().map(|p| {
                    PropertyAddresses {
                        id: p.id,
                        addresses: p.addresses.into_iter().map(|a| a.line1).collect(),
                    }
                })),
                Err(e) => warn!("Property lookup failed for batch {}: {:#}", batch, e),
            }
        }

        results
    }

    /// Match requests for the parseable addresses of a chunk, tagged with their global row
    fn batch_requests(&self, chunk: &[String], offset: usize) -> Vec<MatchRequest> {
        chunk
            .iter()
            .enumerate()
            .filter_map(|(i, address)| {
                let row = offset + i;
                let parsed = self
                    .normalizer
                    .parse(address)
                    .map_err(|e| warn!("Row {}: {}", row, e))
                    .ok()?;
                MatchRequest::from_parsed(&parsed, Some(row))
                    .map_err(|e| warn!("Row {}: {}", row, e))
                    .ok()
            })
            .collect()
    }

    async fn post_matches(&self, requests: &[MatchRequest]) -> Result<MatchResponse> {
        let response = self
            .client
            .post(&self.match_url)
            .basic_auth(&self.user, Some(&self.api_key))
            .json(&json!({ "params": requests }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Match endpoint returned {}: {}", status, error_text);
        }

        Ok(response.json().await?)
    }

    async fn post_properties(&self, property_ids: &[String]) -> Result<PropertiesResponse> {
        let body = json!({
            "property_ids": property_ids,
            "include_contacts": false,
            "include_financials": false,
            "include_rent_regulated": false
        });

        let response = self
            .client
            .post(&self.properties_url)
            .basic_auth(&self.user, Some(&self.api_key))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// Write matched ids into their rows, using the echoed custom id
fn apply_matches(results: &mut [Option<String>], response: MatchResponse) {
    for entry in response.matches {
        let row = entry
            .params
            .as_ref()
            .and_then(|p| p.custom_id.parse::<usize>().ok());
        match row {
            Some(row) if row < results.len() => results[row] = entry.property_id,
            _ => warn!("Match result without a usable custom_id, dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PropertyMatchClient {
        PropertyMatchClient::new(
            "https://api.example.com/v1/nyc/properties/",
            "user",
            "key",
            Duration::from_secs(5),
            AddressNormalizer::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoints() {
        let c = client();
        assert_eq!(c.match_url, "https://api.example.com/v1/nyc/properties/matches");
        assert_eq!(c.properties_url, "https://api.example.com/v1/nyc/properties");
    }

    #[test]
    fn test_from_config_reads_key_from_env() {
        let config = MatchingConfig {
            endpoint: "https://api.example.com/v1/nyc/properties".to_string(),
            user: "analyst".to_string(),
            api_key_env: "BLDGFINDER_TEST_MATCH_KEY".to_string(),
        };
        std::env::set_var("BLDGFINDER_TEST_MATCH_KEY", "s3cret");

        let c = PropertyMatchClient::from_config(
            &config,
            Duration::from_secs(5),
            AddressNormalizer::new(),
        )
        .unwrap();
        assert_eq!(c.user, "analyst");
        assert_eq!(c.api_key, "s3cret");
        assert_eq!(c.match_url, "https://api.example.com/v1/nyc/properties/matches");
    }

    #[test]
    fn test_from_config_without_key() {
        let config = MatchingConfig {
            api_key_env: "BLDGFINDER_TEST_UNSET_KEY".to_string(),
            ..MatchingConfig::default()
        };
        std::env::remove_var("BLDGFINDER_TEST_UNSET_KEY");

        let err = PropertyMatchClient::from_config(
            &config,
            Duration::from_secs(5),
            AddressNormalizer::new(),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("BLDGFINDER_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_batch_requests_skip_unparseable_rows() {
        let c = client();
        let chunk = vec![
            "1 Wall St, New York, NY 10005".to_string(),
            "x".to_string(),
            "350 5th Ave".to_string(),
        ];

        let requests = c.batch_requests(&chunk, 200);
        let ids: Vec<&str> = requests.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(ids, vec!["200", "202"]);
        assert_eq!(requests[0].addresses[0].line1, "1 Wall Street");
        assert_eq!(requests[0].addresses[0].postal_code.as_deref(), Some("10005"));
    }

    #[test]
    fn test_apply_matches_by_custom_id() {
        let response: MatchResponse = serde_json::from_value(json!({
            "matches": [
                { "property_id": "p-2", "params": { "custom_id": "2" } },
                { "params": { "custom_id": "0" } },
                { "property_id": "p-9", "params": { "custom_id": "9" } },
                { "property_id": "p-x" }
            ]
        }))
        .unwrap();

        let mut results = vec![None, Some("stale".to_string()), None];
        apply_matches(&mut results, response);
        assert_eq!(
            results,
            vec![None, Some("stale".to_string()), Some("p-2".to_string())]
        );
    }

    #[test]
    fn test_properties_response_shape() {
        let response: PropertiesResponse = serde_json::from_value(json!({
            "properties": [
                {
                    "id": "a",
                    "addresses": [{ "line1": "1 Wall Street" }, { "line1": "3 Wall Street" }]
                },
                { "id": "b" }
            ]
        }))
        .unwrap();
        assert_eq!(response.properties[0].addresses.len(), 2);
        assert!(response.properties[1].addresses.is_empty());
    }
}
