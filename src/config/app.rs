//! Process configuration
//!
//! Built once at process entry from the environment and handed to each
//! component by value or reference. Nothing in the crate reads the
//! environment after this point.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::{AssistantError, AssistantResult};
use crate::mcp::{ToolServerConfig, DEFAULT_CALL_TIMEOUT_SECS};

use super::permissions::PermissionsConfig;

const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TOOL_COMMAND: &str = "npx";
const DEFAULT_STORE_DIR: &str = "approvals";
const MAX_CALL_TIMEOUT_SECS: u64 = 15 * 60;
/// Default budget for one batch, matching the longest a queue consumer may run
const DEFAULT_INVOCATION_TIMEOUT_SECS: u64 = 15 * 60;
const MAX_INVOCATION_TIMEOUT_SECS: u64 = 60 * 60;

/// Chat API credentials
#[derive(Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub api_base: String,
}

/// Chat-completion credentials
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
}

/// Payment provider credentials handed to the tool server
#[derive(Clone)]
pub struct AdyenConfig {
    pub api_key: String,
    /// `TEST` or `LIVE`
    pub environment: String,
    pub live_prefix: String,
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl std::fmt::Debug for AdyenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdyenConfig")
            .field("api_key", &"<redacted>")
            .field("environment", &self.environment)
            .field("live_prefix", &self.live_prefix)
            .finish()
    }
}

/// Everything the processor needs, loaded once
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub llm: LlmConfig,
    pub adyen: AdyenConfig,
    pub permissions: PermissionsConfig,
    pub tool_server: ToolServerConfig,
    /// Directory backing the file approval store
    pub approval_store_dir: PathBuf,
    /// Deadline for processing one batch
    pub invocation_timeout: Duration,
}

impl AppConfig {
    /// Load from process environment variables
    pub fn from_env() -> AssistantResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AssistantResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| AssistantError::config(format!("{} is not set", key)))
        };

        let slack = SlackConfig {
            bot_token: require("SLACK_BOT_TOKEN")?,
            api_base: get("SLACK_API_BASE").unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string()),
        };

        let llm = LlmConfig {
            api_key: require("ANTHROPIC_API_KEY")?,
            model: get("ANTHROPIC_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        let adyen = AdyenConfig {
            api_key: require("ADYEN_API_KEY")?,
            environment: get("ADYEN_ENVIRONMENT").unwrap_or_else(|| "TEST".to_string()),
            live_prefix: get("ADYEN_LIVE_PREFIX").unwrap_or_default(),
        };

        if adyen.environment != "TEST" && adyen.environment != "LIVE" {
            return Err(AssistantError::config(format!(
                "ADYEN_ENVIRONMENT must be TEST or LIVE, got '{}'",
                adyen.environment
            )));
        }

        let permissions = match (get("PERMISSIONS_JSON"), get("PERMISSIONS_FILE")) {
            (Some(json), _) => PermissionsConfig::from_json(&json)?,
            (None, Some(path)) => {
                let json = std::fs::read_to_string(&path).map_err(|e| {
                    AssistantError::config(format!("cannot read PERMISSIONS_FILE {}: {}", path, e))
                })?;
                PermissionsConfig::from_json(&json)?
            }
            (None, None) => {
                tracing::warn!("[AppConfig] No permission policy configured, using defaults");
                PermissionsConfig::default_policy()
            }
        };

        let call_timeout_secs = parse_secs(
            &get,
            "TOOL_CALL_TIMEOUT_SECS",
            DEFAULT_CALL_TIMEOUT_SECS,
            MAX_CALL_TIMEOUT_SECS,
        )?;
        let invocation_timeout_secs = parse_secs(
            &get,
            "INVOCATION_TIMEOUT_SECS",
            DEFAULT_INVOCATION_TIMEOUT_SECS,
            MAX_INVOCATION_TIMEOUT_SECS,
        )?;

        let tool_server = ToolServerConfig::adyen(
            get("TOOL_SERVER_COMMAND").unwrap_or_else(|| DEFAULT_TOOL_COMMAND.to_string()),
            &adyen.api_key,
            &adyen.environment,
            Some(adyen.live_prefix.as_str()),
        )
        .with_call_timeout(call_timeout_secs);

        let approval_store_dir = PathBuf::from(
            get("APPROVAL_STORE_DIR").unwrap_or_else(|| DEFAULT_STORE_DIR.to_string()),
        );

        Ok(Self {
            slack,
            llm,
            adyen,
            permissions,
            tool_server,
            approval_store_dir,
            invocation_timeout: Duration::from_secs(invocation_timeout_secs),
        })
    }
}

/// Read a whole number of seconds in `1..=max`
fn parse_secs<F>(get: &F, key: &str, default: u64, max: u64) -> AssistantResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| (1..=max).contains(secs))
        .ok_or_else(|| {
            AssistantError::config(format!("{} must be between 1 and {}, got '{}'", key, max, raw))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActionPolicy;
    use crate::permissions::ActionCategory;
    use std::collections::HashMap;
    use std::io::Write;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("SLACK_BOT_TOKEN", "xoxb-test".to_string()),
            ("ANTHROPIC_API_KEY", "sk-test".to_string()),
            ("ADYEN_API_KEY", "adyen-test".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> AssistantResult<AppConfig> {
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.slack.api_base, DEFAULT_SLACK_API_BASE);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.adyen.environment, "TEST");
        assert_eq!(config.tool_server.command, "npx");
        assert_eq!(config.tool_server.call_timeout_secs, 60);
        assert_eq!(config.approval_store_dir, PathBuf::from("approvals"));
        assert_eq!(config.invocation_timeout, Duration::from_secs(900));
        assert_eq!(config.permissions, PermissionsConfig::default_policy());
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        for key in ["SLACK_BOT_TOKEN", "ANTHROPIC_API_KEY", "ADYEN_API_KEY"] {
            let mut env = base_env();
            env.remove(key);
            let err = load(&env).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }

        let mut env = base_env();
        env.insert("SLACK_BOT_TOKEN", "   ".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_permissions_json_overrides_defaults() {
        let mut env = base_env();
        env.insert(
            "PERMISSIONS_JSON",
            r#"{"channels": ["C1"], "actions": {"refund": {"level": "admin", "approve": true, "maxAmount": 500}}}"#
                .to_string(),
        );

        let config = load(&env).unwrap();
        assert_eq!(config.permissions.channels, vec!["C1"]);
        assert_eq!(
            config.permissions.policy(ActionCategory::Refund),
            Some(&ActionPolicy::admin_with_approval(500))
        );
        assert_eq!(config.permissions.policy(ActionCategory::Read), None);
    }

    #[test]
    fn test_malformed_permissions_are_fatal() {
        let mut env = base_env();
        env.insert("PERMISSIONS_JSON", "{\"channels\": [".to_string());
        assert!(matches!(load(&env), Err(AssistantError::InvalidConfig(_))));
    }

    #[test]
    fn test_permissions_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"auditChannel": "C77"}}"#).unwrap();

        let mut env = base_env();
        env.insert("PERMISSIONS_FILE", file.path().display().to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.permissions.audit_channel(), Some("C77"));

        env.insert("PERMISSIONS_FILE", "/definitely/not/here.json".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_tool_server_settings() {
        let mut env = base_env();
        env.insert("ADYEN_ENVIRONMENT", "LIVE".to_string());
        env.insert("ADYEN_LIVE_PREFIX", "acme".to_string());
        env.insert("TOOL_SERVER_COMMAND", "/usr/local/bin/npx".to_string());
        env.insert("TOOL_CALL_TIMEOUT_SECS", "30".to_string());
        env.insert("INVOCATION_TIMEOUT_SECS", "120".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.tool_server.command, "/usr/local/bin/npx");
        assert_eq!(config.tool_server.call_timeout_secs, 30);
        assert_eq!(config.invocation_timeout, Duration::from_secs(120));
        assert!(config.tool_server.args.contains(&"--livePrefix=acme".to_string()));
    }

    #[test]
    fn test_invalid_values_are_fatal() {
        let mut env = base_env();
        env.insert("TOOL_CALL_TIMEOUT_SECS", "0".to_string());
        assert!(load(&env).is_err());

        let mut env = base_env();
        env.insert("TOOL_CALL_TIMEOUT_SECS", "soon".to_string());
        assert!(load(&env).is_err());

        let mut env = base_env();
        env.insert("INVOCATION_TIMEOUT_SECS", "7200".to_string());
        let err = load(&env).unwrap_err();
        assert!(err.to_string().contains("INVOCATION_TIMEOUT_SECS"), "{}", err);

        let mut env = base_env();
        env.insert("ADYEN_ENVIRONMENT", "PROD".to_string());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&base_env()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("xoxb-test"));
        assert!(!debug.contains("sk-test"));
        assert!(!debug.contains("adyen-test"));
    }
}
