use crate::errors::EngineError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use std::time::Duration;

/// Every dataplane call authenticates with the raw access token in the
/// `Authorization` header, without a `Bearer ` prefix.
fn authorize(builder: reqwest::RequestBuilder, access_token: &str) -> reqwest::RequestBuilder {
    builder.header("Authorization", access_token)
}

fn encode_id(id: &str) -> String {
    BASE64.encode(id.as_bytes())
}

pub struct ShellLookupPage {
    pub shell_ids: Vec<String>,
    pub next_cursor: Option<String>,
}

/// `GET {dataplane_url}/lookup/shellsByAssetLink?limit=&cursor=`, POSTing
/// `query_spec` as the request body.
pub async fn lookup_shells_by_asset_link(
    http: &reqwest::Client,
    dataplane_url: &str,
    access_token: &str,
    query_spec: &Value,
    limit: Option<u64>,
    cursor: Option<&str>,
    timeout: Duration,
) -> Result<ShellLookupPage, EngineError> {
    let mut url = format!("{}/lookup/shellsByAssetLink", dataplane_url.trim_end_matches('/'));
    let mut query_params = Vec::new();
    if let Some(limit) = limit {
        query_params.push(format!("limit={limit}"));
    }
    if let Some(cursor) = cursor {
        query_params.push(format!("cursor={cursor}"));
    }
    if !query_params.is_empty() {
        url.push('?');
        url.push_str(&query_params.join("&"));
    }

    let mut builder = http.post(&url).timeout(timeout).json(query_spec);
    builder = authorize(builder, access_token);
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let body: Value = response.json().await?;
    let shell_ids = body
        .get("result")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let next_cursor = body
        .get("paging")
        .and_then(|p| p.get("cursor"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(ShellLookupPage { shell_ids, next_cursor })
}

/// `GET {dataplane_url}/shell-descriptors/{base64(shell_id)}`.
pub async fn get_shell_descriptor(
    http: &reqwest::Client,
    dataplane_url: &str,
    access_token: &str,
    shell_id: &str,
    timeout: Duration,
) -> Result<Option<Value>, EngineError> {
    let url = format!(
        "{}/shell-descriptors/{}",
        dataplane_url.trim_end_matches('/'),
        encode_id(shell_id)
    );
    let mut builder = http.get(&url).timeout(timeout);
    builder = authorize(builder, access_token);
    let response = builder.send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    let body: Value = response.json().await?;
    Ok(Some(body))
}

/// `GET {dataplane_url}/shell-descriptors/{base64(shell_id)}/submodel-descriptors/{base64(submodel_id)}`.
pub async fn get_submodel_descriptor(
    http: &reqwest::Client,
    dataplane_url: &str,
    access_token: &str,
    shell_id: &str,
    submodel_id: &str,
    timeout: Duration,
) -> Result<Option<Value>, EngineError> {
    let url = format!(
        "{}/shell-descriptors/{}/submodel-descriptors/{}",
        dataplane_url.trim_end_matches('/'),
        encode_id(shell_id),
        encode_id(submodel_id),
    );
    let mut builder = http.get(&url).timeout(timeout);
    builder = authorize(builder, access_token);
    let response = builder.send().await?;

    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    let body: Value = response.json().await?;
    Ok(Some(body))
}

/// `GET {href}` for submodel payload data, authenticated with the asset's
/// negotiated token.
pub async fn fetch_submodel_payload(
    http: &reqwest::Client,
    href: &str,
    access_token: &str,
    timeout: Duration,
) -> Result<Value, EngineError> {
    let mut builder = http.get(href).timeout(timeout);
    builder = authorize(builder, access_token);
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Rejected {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}
