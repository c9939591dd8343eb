//! Message descriptor schema and resolution.
//!
//! The descriptor arrives as `{source: {...}, params: {...}}`. `params.raw`
//! (an inline JSON string) and `params.from_file` (an external file path) are
//! alternate ways to supply `params` itself and win over inline fields.
//! Environment fallbacks apply ONLY when the containing object is entirely
//! absent from the descriptor: a present-but-empty field is an error, not a
//! fallback.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use courier_blocks::{BlockDescriptor, ValidationError};
use courier_slack::DEFAULT_API_BASE;

use crate::de;

pub const ENV_TOKEN: &str = "SLACK_COURIER_TOKEN";
pub const ENV_CHANNEL: &str = "SLACK_COURIER_CHANNEL";
pub const ENV_DRY_RUN: &str = "SLACK_COURIER_DRY_RUN";

const DEFAULT_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Deserialize)]
pub struct Descriptor {
    pub source: Option<Source>,
    pub params: Option<Params>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    pub credential: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Params {
    pub channel: Option<String>,
    #[serde(default)]
    pub blocks: Vec<BlockDescriptor>,
    #[serde(default, deserialize_with = "de::flexible_bool_opt")]
    pub dry_run: Option<bool>,
    pub thread_ts: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_bool")]
    pub create_thread: bool,
    pub crosspost: Option<Crosspost>,
    pub text: Option<String>,
    pub raw: Option<String>,
    pub from_file: Option<PathBuf>,
    #[serde(default, deserialize_with = "de::flexible_bool")]
    pub debug: bool,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Crosspost {
    #[serde(default)]
    pub channels: Vec<String>,
    pub channel: Option<String>,
    pub text: Option<String>,
    #[serde(default, deserialize_with = "de::flexible_bool")]
    pub no_link: bool,
    #[serde(default, deserialize_with = "de::flexible_bool")]
    pub fail_on_error: bool,
}

impl Crosspost {
    /// Secondary channels in declaration order; `channels` wins over the
    /// singular `channel` form, blank entries are dropped.
    pub fn channel_list(&self) -> Vec<String> {
        let candidates: Vec<String> = if self.channels.is_empty() {
            self.channel.iter().cloned().collect()
        } else {
            self.channels.clone()
        };
        candidates
            .into_iter()
            .map(|channel| channel.trim().to_string())
            .filter(|channel| !channel.is_empty())
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("raw params are not valid JSON: {detail}")]
    BadRawParams { detail: String },
    #[error("params file {path} could not be used: {detail}")]
    BadParamsFile { path: PathBuf, detail: String },
}

/// The fully resolved send request: credential, channel, and flags settled,
/// `raw`/`from_file` substitution applied.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub credential: String,
    pub api_base: String,
    pub channel: String,
    pub dry_run: bool,
    pub params: Params,
}

impl ResolvedRequest {
    /// Deadline around the whole delivery pipeline; `timeout: 0` disables it.
    pub fn overall_deadline(&self) -> Option<Duration> {
        match self.params.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        }
    }
}

pub fn resolve(
    descriptor: Descriptor,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedRequest, DescriptorError> {
    let (credential, api_base) = match &descriptor.source {
        Some(source) => {
            let credential = source
                .credential
                .as_deref()
                .map(str::trim)
                .filter(|credential| !credential.is_empty())
                .ok_or(ValidationError::MissingCredential)?
                .to_string();
            let api_base = source
                .api_base
                .as_deref()
                .map(str::trim)
                .filter(|api_base| !api_base.is_empty())
                .unwrap_or(DEFAULT_API_BASE)
                .to_string();
            (credential, api_base)
        }
        None => {
            let credential = env(ENV_TOKEN)
                .filter(|credential| !credential.trim().is_empty())
                .ok_or(ValidationError::MissingCredential)?;
            (credential.trim().to_string(), DEFAULT_API_BASE.to_string())
        }
    };

    let params_present = descriptor.params.is_some();
    let params = expand_params(descriptor.params.unwrap_or_default())?;

    let channel = match params
        .channel
        .as_deref()
        .map(str::trim)
        .filter(|channel| !channel.is_empty())
    {
        Some(channel) => channel.to_string(),
        None if params_present => return Err(ValidationError::MissingChannel.into()),
        None => env(ENV_CHANNEL)
            .map(|channel| channel.trim().to_string())
            .filter(|channel| !channel.is_empty())
            .ok_or(ValidationError::MissingChannel)?,
    };

    let dry_run = match params.dry_run {
        Some(flag) => flag,
        None if params_present => false,
        None => env(ENV_DRY_RUN)
            .as_deref()
            .map(de::parse_bool_text)
            .transpose()
            .unwrap_or(Some(false))
            .unwrap_or(false),
    };

    Ok(ResolvedRequest {
        credential,
        api_base,
        channel,
        dry_run,
        params,
    })
}

/// Apply the `raw` / `from_file` substitution; `raw` wins when both appear.
fn expand_params(params: Params) -> Result<Params, DescriptorError> {
    if let Some(raw) = &params.raw {
        return serde_json::from_str(raw).map_err(|error| DescriptorError::BadRawParams {
            detail: error.to_string(),
        });
    }
    if let Some(path) = &params.from_file {
        let contents =
            std::fs::read_to_string(path).map_err(|error| DescriptorError::BadParamsFile {
                path: path.clone(),
                detail: error.to_string(),
            })?;
        return serde_json::from_str(&contents).map_err(|error| DescriptorError::BadParamsFile {
            path: path.clone(),
            detail: error.to_string(),
        });
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use courier_blocks::ValidationError;

    use super::{resolve, Descriptor, DescriptorError, ENV_CHANNEL, ENV_DRY_RUN, ENV_TOKEN};

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn parse(text: &str) -> Descriptor {
        serde_json::from_str(text).expect("descriptor should parse")
    }

    #[test]
    fn unit_credential_comes_from_source_when_present() {
        let descriptor = parse(r##"{ "source": { "credential": "xoxb-1" }, "params": { "channel": "#c" } }"##);
        let resolved = resolve(descriptor, &env_from(&[(ENV_TOKEN, "xoxb-env")])).unwrap();
        assert_eq!(resolved.credential, "xoxb-1");
    }

    #[test]
    fn unit_env_credential_only_applies_when_source_is_absent() {
        let with_empty_source = parse(r##"{ "source": {}, "params": { "channel": "#c" } }"##);
        let error = resolve(with_empty_source, &env_from(&[(ENV_TOKEN, "xoxb-env")])).unwrap_err();
        assert!(matches!(
            error,
            DescriptorError::Validation(ValidationError::MissingCredential)
        ));

        let without_source = parse(r##"{ "params": { "channel": "#c" } }"##);
        let resolved = resolve(without_source, &env_from(&[(ENV_TOKEN, "xoxb-env")])).unwrap();
        assert_eq!(resolved.credential, "xoxb-env");
    }

    #[test]
    fn unit_env_channel_and_dry_run_only_apply_when_params_are_absent() {
        let without_params = parse(r#"{ "source": { "credential": "t" } }"#);
        let resolved = resolve(
            without_params,
            &env_from(&[(ENV_CHANNEL, "#fallback"), (ENV_DRY_RUN, "true")]),
        )
        .unwrap();
        assert_eq!(resolved.channel, "#fallback");
        assert!(resolved.dry_run);

        let with_params = parse(r#"{ "source": { "credential": "t" }, "params": { "blocks": [] } }"#);
        let error = resolve(
            with_params,
            &env_from(&[(ENV_CHANNEL, "#fallback")]),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            DescriptorError::Validation(ValidationError::MissingChannel)
        ));
    }

    #[test]
    fn unit_raw_params_win_over_from_file_and_inline_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br##"{ "channel": "#from-file" }"##).unwrap();
        file.flush().unwrap();

        let descriptor = parse(&format!(
            r##"{{ "source": {{ "credential": "t" }}, "params": {{
                "channel": "#inline",
                "raw": "{{ \"channel\": \"#raw\", \"dry_run\": \"true\" }}",
                "from_file": {:?}
            }} }}"##,
            file.path()
        ));
        let resolved = resolve(descriptor, &env_from(&[])).unwrap();
        assert_eq!(resolved.channel, "#raw");
        assert!(resolved.dry_run);
    }

    #[test]
    fn unit_from_file_params_replace_inline_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br##"{ "channel": "#from-file", "text": "hello" }"##)
            .unwrap();
        file.flush().unwrap();

        let descriptor = parse(&format!(
            r##"{{ "source": {{ "credential": "t" }}, "params": {{
                "channel": "#inline", "from_file": {:?}
            }} }}"##,
            file.path()
        ));
        let resolved = resolve(descriptor, &env_from(&[])).unwrap();
        assert_eq!(resolved.channel, "#from-file");
        assert_eq!(resolved.params.text.as_deref(), Some("hello"));
    }

    #[test]
    fn unit_bad_raw_params_are_reported_as_such() {
        let descriptor = parse(
            r#"{ "source": { "credential": "t" }, "params": { "raw": "not json" } }"#,
        );
        assert!(matches!(
            resolve(descriptor, &env_from(&[])).unwrap_err(),
            DescriptorError::BadRawParams { .. }
        ));
    }

    #[test]
    fn unit_overall_deadline_defaults_and_can_be_disabled() {
        let descriptor = parse(r##"{ "source": { "credential": "t" }, "params": { "channel": "#c" } }"##);
        let resolved = resolve(descriptor, &env_from(&[])).unwrap();
        assert_eq!(resolved.overall_deadline().map(|d| d.as_secs()), Some(600));

        let descriptor = parse(
            r##"{ "source": { "credential": "t" }, "params": { "channel": "#c", "timeout": 0 } }"##,
        );
        let resolved = resolve(descriptor, &env_from(&[])).unwrap();
        assert_eq!(resolved.overall_deadline(), None);
    }

    #[test]
    fn unit_crosspost_channel_list_prefers_plural_and_drops_blanks() {
        let descriptor = parse(
            r##"{ "source": { "credential": "t" }, "params": {
                "channel": "#c",
                "crosspost": { "channels": ["#a", " ", "#b"], "channel": "#ignored" }
            } }"##,
        );
        let resolved = resolve(descriptor, &env_from(&[])).unwrap();
        let crosspost = resolved.params.crosspost.unwrap();
        assert_eq!(crosspost.channel_list(), vec!["#a", "#b"]);
    }
}
