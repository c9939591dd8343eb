//! Result emission: one JSON object on stdout (or a file), nothing else.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};

use crate::orchestrate::RunReport;

pub fn emit_report(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string(&render(report)).context("failed to render result")?;
    match output {
        Some(path) => std::fs::write(path, format!("{rendered}\n"))
            .with_context(|| format!("failed to write result to {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

/// `{version: {timestamp}, metadata: [...]}`. The timestamp is the primary
/// message ts; a dry run stamps the current epoch second instead.
pub fn render(report: &RunReport) -> Value {
    let timestamp = report
        .primary
        .ts
        .clone()
        .unwrap_or_else(|| Utc::now().timestamp().to_string());

    let mut metadata = vec![entry("channel", &report.primary.channel)];
    if report.primary.dry_run {
        metadata.push(entry("dry_run", "true"));
    }
    if let Some(ts) = &report.primary.ts {
        metadata.push(entry("ts", ts));
    }
    if let Some(permalink) = &report.primary.permalink {
        metadata.push(entry("permalink", permalink));
    }
    metadata.push(entry("blocks", &report.block_count.to_string()));
    metadata.push(entry("attachments", &report.attachment_count.to_string()));
    for crosspost in &report.crossposts {
        let value = match &crosspost.result {
            Ok(outcome) => format!("ok {}", outcome.ts.as_deref().unwrap_or("(dry run)")),
            Err(detail) => format!("failed: {detail}"),
        };
        metadata.push(entry(&format!("crosspost:{}", crosspost.channel), &value));
    }

    json!({
        "version": { "timestamp": timestamp },
        "metadata": metadata,
    })
}

fn entry(name: &str, value: &str) -> Value {
    json!({ "name": name, "value": value })
}

#[cfg(test)]
mod tests {
    use super::render;
    use crate::orchestrate::{CrosspostOutcome, RunReport};
    use courier_slack::SendOutcome;

    #[test]
    fn unit_render_carries_version_timestamp_and_metadata() {
        let report = RunReport {
            primary: SendOutcome {
                channel: "#c".to_string(),
                ts: Some("1720000000.000100".to_string()),
                permalink: Some("https://acme.slack.com/p17".to_string()),
                dry_run: false,
            },
            block_count: 3,
            attachment_count: 1,
            crossposts: vec![CrosspostOutcome {
                channel: "#second".to_string(),
                result: Err("channel_not_found".to_string()),
            }],
        };
        let rendered = render(&report);
        assert_eq!(rendered["version"]["timestamp"], "1720000000.000100");
        let metadata = rendered["metadata"].as_array().unwrap();
        assert!(metadata
            .iter()
            .any(|entry| entry["name"] == "permalink"));
        assert!(metadata
            .iter()
            .any(|entry| entry["name"] == "crosspost:#second"
                && entry["value"].as_str().unwrap().starts_with("failed")));
    }

    #[test]
    fn unit_dry_run_render_stamps_an_epoch_timestamp() {
        let report = RunReport {
            primary: SendOutcome {
                channel: "#c".to_string(),
                ts: None,
                permalink: None,
                dry_run: true,
            },
            block_count: 1,
            attachment_count: 0,
            crossposts: Vec::new(),
        };
        let rendered = render(&report);
        let timestamp = rendered["version"]["timestamp"].as_str().unwrap();
        assert!(timestamp.parse::<i64>().unwrap() > 1_600_000_000);
        let metadata = rendered["metadata"].as_array().unwrap();
        assert!(metadata.iter().any(|entry| entry["name"] == "dry_run"));
    }
}
