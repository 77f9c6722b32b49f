//! `exec` command handler.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::common::{build_client, load_config};

/// Send one command through the session client and print the result.
pub(crate) async fn cmd_exec(command: String, payload: Option<String>) -> Result<()> {
    let config = load_config()?;
    let client = build_client(&config)?;

    let payload: Option<Value> = payload
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .context("--payload must be valid JSON")?;
    if let Some(p) = &payload {
        if !p.is_object() {
            bail!("--payload must be a JSON object");
        }
    }

    let route = client.router().classify(&command, payload.as_ref());
    tracing::debug!(command = %command, route = ?route, "Executing command");

    let response = client.execute(&command, payload).await;

    for note in &response.notifications {
        println!("[notification] {}", note);
    }
    if let Some(error) = response.error {
        bail!("{}", error);
    }
    match response.result {
        Some(Value::String(text)) => println!("{}", text),
        Some(other) => println!("{}", serde_json::to_string_pretty(&other)?),
        None => println!("OK"),
    }
    Ok(())
}
