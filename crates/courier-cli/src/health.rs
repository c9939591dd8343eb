//! Health-check mode: validate local dependencies, and optionally probe the
//! remote API, without sending anything.

use std::io::Write;

use serde_json::{json, Value};
use tracing::info;

use courier_slack::ApiClient;

use crate::descriptor::{resolve, Descriptor, ENV_TOKEN};

pub struct HealthReport {
    pub healthy: bool,
    pub document: Value,
}

pub async fn run_health_check(
    descriptor_text: Option<&str>,
    probe_remote: bool,
    env: &dyn Fn(&str) -> Option<String>,
) -> HealthReport {
    let mut checks = Vec::new();

    checks.push(check("staging", staging_probe()));

    let descriptor = descriptor_text.map(|text| serde_json::from_str::<Descriptor>(text));
    if let Some(parsed) = &descriptor {
        checks.push(check(
            "descriptor",
            parsed
                .as_ref()
                .map(|_| "parsed".to_string())
                .map_err(|error| format!("not a valid descriptor: {error}")),
        ));
    }

    if probe_remote {
        checks.push(check("remote", remote_probe(descriptor, env).await));
    }

    let healthy = checks
        .iter()
        .all(|check| check["status"] == "ok");
    info!(healthy, "health check finished");
    HealthReport {
        healthy,
        document: json!({ "ok": healthy, "checks": checks }),
    }
}

/// Staging files hold message content and credentials in transit; make sure
/// we can actually create and write one.
fn staging_probe() -> Result<String, String> {
    let mut staged = tempfile::NamedTempFile::new()
        .map_err(|error| format!("cannot create staging files: {error}"))?;
    staged
        .write_all(b"probe")
        .map_err(|error| format!("cannot write staging files: {error}"))?;
    Ok("staging files are writable".to_string())
}

async fn remote_probe(
    descriptor: Option<Result<Descriptor, serde_json::Error>>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<String, String> {
    let (credential, api_base) = match descriptor {
        Some(Ok(descriptor)) => {
            let resolved = resolve(descriptor, env)
                .map_err(|error| format!("cannot resolve a credential: {error}"))?;
            (resolved.credential, resolved.api_base)
        }
        Some(Err(error)) => return Err(format!("descriptor is unusable: {error}")),
        None => {
            let credential = env(ENV_TOKEN)
                .filter(|credential| !credential.trim().is_empty())
                .ok_or_else(|| {
                    format!("no descriptor given and {ENV_TOKEN} is not set")
                })?;
            (credential, courier_slack::DEFAULT_API_BASE.to_string())
        }
    };
    let client = ApiClient::new(&api_base, &credential)
        .map_err(|error| format!("cannot build api client: {error}"))?;
    let user_id = client
        .auth_probe()
        .await
        .map_err(|error| format!("auth probe failed: {error}"))?;
    Ok(format!("authenticated as {user_id}"))
}

fn check(name: &str, outcome: Result<String, String>) -> Value {
    match outcome {
        Ok(detail) => json!({ "name": name, "status": "ok", "detail": detail }),
        Err(detail) => json!({ "name": name, "status": "failed", "detail": detail }),
    }
}
