use serde_json::{json, Value};

use crate::cli::{utils, OutputFormat};

pub async fn handle(url: String, output_format: OutputFormat) -> anyhow::Result<()> {
    let endpoint = format!("{}/health", url.trim_end_matches('/'));
    let response = reqwest::get(&endpoint).await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        utils::output_success(
            &output_format,
            &format!("{} is healthy", url),
            Some(json!({ "status": status.as_u16(), "body": body })),
        )
    } else {
        let message = body["error"].as_str().unwrap_or("unhealthy").to_string();
        utils::output_error(&output_format, &format!("{} responded {}: {}", url, status, message), Some("UNHEALTHY"))?;
        anyhow::bail!("health check failed")
    }
}
