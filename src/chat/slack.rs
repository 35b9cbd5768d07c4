//! Slack Web API client

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::SlackConfig;
use crate::core::{AssistantError, AssistantResult};
use crate::permissions::GroupDirectory;

use super::ChatClient;

/// Envelope every Web API method answers with
#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PostMessageBody {
    ts: String,
}

#[derive(Debug, Deserialize)]
struct UsergroupUsersBody {
    #[serde(default)]
    users: Vec<String>,
}

impl<T> SlackEnvelope<T> {
    fn into_result(self, method: &str) -> AssistantResult<T> {
        if !self.ok {
            let error = self.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(AssistantError::Chat(format!("{}: {}", method, error)));
        }
        self.body
            .ok_or_else(|| AssistantError::Chat(format!("{}: malformed response", method)))
    }
}

/// Slack Web API client authenticated with a bot token
#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    bot_token: String,
    api_base: String,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SlackClient {
    /// Create a client from configuration
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            client: Client::new(),
            bot_token: config.bot_token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> AssistantResult<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AssistantError::Chat(format!("{}: {}", method, e)))?;

        tracing::debug!("[SlackClient] {} -> {}: {}", method, status, text);

        if !status.is_success() {
            return Err(AssistantError::Chat(format!(
                "{}: HTTP {}: {}",
                method, status, text
            )));
        }

        let envelope: SlackEnvelope<T> = serde_json::from_str(&text)?;
        envelope.into_result(method)
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> AssistantResult<String> {
        let mut payload = json!({
            "channel": channel,
            "text": text,
        });
        if let Some(thread) = thread_ts.filter(|t| !t.is_empty()) {
            payload["thread_ts"] = json!(thread);
        }

        let response = self
            .client
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AssistantError::Chat(format!("chat.postMessage: {}", e)))?;

        let body: PostMessageBody = Self::decode("chat.postMessage", response).await?;
        Ok(body.ts)
    }
}

#[async_trait]
impl GroupDirectory for SlackClient {
    async fn group_members(&self, group_id: &str) -> AssistantResult<Vec<String>> {
        let response = self
            .client
            .get(self.url("usergroups.users.list"))
            .bearer_auth(&self.bot_token)
            .query(&[("usergroup", group_id)])
            .send()
            .await
            .map_err(|e| AssistantError::Chat(format!("usergroups.users.list: {}", e)))?;

        let body: UsergroupUsersBody = Self::decode("usergroups.users.list", response).await?;
        Ok(body.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_ok() {
        let envelope: SlackEnvelope<PostMessageBody> =
            serde_json::from_str(r#"{"ok": true, "channel": "C1", "ts": "1700000000.000300"}"#)
                .unwrap();
        let body = envelope.into_result("chat.postMessage").unwrap();
        assert_eq!(body.ts, "1700000000.000300");
    }

    #[test]
    fn test_envelope_error() {
        let envelope: SlackEnvelope<PostMessageBody> =
            serde_json::from_str(r#"{"ok": false, "error": "channel_not_found"}"#).unwrap();
        let err = envelope.into_result("chat.postMessage").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Chat API error: chat.postMessage: channel_not_found"
        );
    }

    #[test]
    fn test_usergroup_users() {
        let envelope: SlackEnvelope<UsergroupUsersBody> =
            serde_json::from_str(r#"{"ok": true, "users": ["U1", "U2"]}"#).unwrap();
        assert_eq!(
            envelope.into_result("usergroups.users.list").unwrap().users,
            vec!["U1", "U2"]
        );
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = SlackClient::new(&SlackConfig {
            bot_token: "xoxb".into(),
            api_base: "https://slack.example/api/".into(),
        });
        assert_eq!(client.url("chat.postMessage"), "https://slack.example/api/chat.postMessage");
        assert!(!format!("{:?}", client).contains("xoxb"));
    }
}
