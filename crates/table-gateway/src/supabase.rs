//! Supabase PostgREST gateway.

use crate::{GatewayError, GatewayResult, TableGateway};
use async_trait::async_trait;
use campus_config_and_utils::Config;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct PostgrestError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// Table gateway backed by Supabase's REST API.
#[derive(Clone)]
pub struct SupabaseGateway {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
    access_token: String,
}

impl SupabaseGateway {
    /// Create a gateway.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    /// * `access_token` - Bearer token; the anon key for anonymous access
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_url: impl Into<String>,
        anon_key: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: access_token.into(),
        })
    }

    /// Create a gateway from the application config.
    pub fn from_config(config: &Config) -> GatewayResult<Self> {
        Self::new(
            config.supabase_url.clone(),
            config.supabase_anon_key.clone(),
            config.bearer_token(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, self.rest_url(table))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.access_token))
    }

    /// Turn a non-success response into a gateway error.
    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> GatewayResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), body = %body, "Supabase request failed");
        Err(error_for_status(status.as_u16(), &body))
    }

    /// Send a by-id mutation that asks for the affected rows back, so a
    /// missing id can be told apart from success.
    async fn mutate_by_id(
        &self,
        method: reqwest::Method,
        table: &str,
        id: &str,
        body: Option<&Value>,
    ) -> GatewayResult<()> {
        let mut request = self
            .request(method, table)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self.check_response(request.send().await?).await?;
        let rows: Vec<Value> = serde_json::from_str(&response.text().await?)?;
        if rows.is_empty() {
            return Err(GatewayError::NotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

/// Map a PostgREST failure to a gateway error.
fn error_for_status(status: u16, body: &str) -> GatewayError {
    let parsed: PostgrestError = serde_json::from_str(body).unwrap_or_default();
    let message = match (parsed.message, parsed.details) {
        (Some(message), Some(details)) => format!("{} ({})", message, details),
        (Some(message), None) => message,
        _ => body.to_string(),
    };
    let integrity_violation = parsed
        .code
        .as_deref()
        .is_some_and(|code| code.starts_with("23"));

    match status {
        _ if integrity_violation => GatewayError::Constraint(message),
        400 | 409 | 422 => GatewayError::Constraint(message),
        401 | 403 => GatewayError::Unauthorized(message),
        404 => GatewayError::NotFound {
            table: String::new(),
            id: message,
        },
        _ => GatewayError::Remote { status, message },
    }
}

#[async_trait]
impl TableGateway for SupabaseGateway {
    async fn list(&self, table: &str) -> GatewayResult<Vec<Value>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await?;
        let response = self.check_response(response).await?;
        let rows: Vec<Value> = serde_json::from_str(&response.text().await?)?;
        debug!(table = %table, count = rows.len(), "Listed rows");
        Ok(rows)
    }

    async fn insert(&self, table: &str, fields: Value) -> GatewayResult<()> {
        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=minimal")
            .json(&fields)
            .send()
            .await?;
        self.check_response(response).await?;
        debug!(table = %table, "Inserted row");
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> GatewayResult<()> {
        self.mutate_by_id(reqwest::Method::PATCH, table, id, Some(&patch)).await?;
        debug!(table = %table, id = %id, "Updated row");
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> GatewayResult<()> {
        self.mutate_by_id(reqwest::Method::DELETE, table, id, None).await?;
        debug!(table = %table, id = %id, "Deleted row");
        Ok(())
    }
}

impl std::fmt::Debug for SupabaseGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseGateway")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
