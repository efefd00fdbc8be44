use serde::Deserialize;

use crate::CHAT_API_BASE;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat request failed")]
    Http(#[from] reqwest::Error),

    #[error("chat API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// A channel message, trimmed to the fields the watcher reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub author: Author,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bot: bool,
}

/// Minimal bot-token REST client for the chat platform. Cheap to clone; the
/// command listener and the notifier each hold one.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl ChatClient {
    pub fn new(token: String) -> Self {
        Self::with_base(CHAT_API_BASE.to_string(), token)
    }

    pub fn with_base(base: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
            token,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message: String = response
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(200)
            .collect();
        Err(ChatError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Post a message to a channel.
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        let url = format!("{}/channels/{}/messages", self.base, channel_id);
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Messages newer than `after` (a message id), oldest first. With no
    /// cursor the most recent messages come back.
    pub async fn messages_after(
        &self,
        channel_id: &str,
        after: Option<&str>,
        limit: u8,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let url = format!("{}/channels/{}/messages", self.base, channel_id);
        let mut request = self
            .http
            .get(&url)
            .header("Authorization", self.auth())
            .query(&[("limit", limit.to_string())]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }
        let mut messages: Vec<ChatMessage> =
            Self::check(request.send().await?).await?.json().await?;
        // The API returns newest first.
        messages.reverse();
        Ok(messages)
    }

    /// Crosspost an announcement-channel message to its followers.
    pub async fn crosspost(&self, channel_id: &str, message_id: &str) -> Result<(), ChatError> {
        let url = format!(
            "{}/channels/{}/messages/{}/crosspost",
            self.base, channel_id, message_id
        );
        let response = self
            .http
            .post(&url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ChatClient {
        ChatClient::with_base(server.uri(), "t0k3n".into())
    }

    #[tokio::test]
    async fn send_message_posts_content_with_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/123/messages"))
            .and(header("Authorization", "Bot t0k3n"))
            .and(body_json(serde_json::json!({ "content": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "900",
                "content": "hello",
                "author": { "username": "kadwatch", "bot": true }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let message = client(&server).send_message("123", "hello").await.unwrap();
        assert_eq!(message.id, "900");
        assert!(message.author.bot);
    }

    #[tokio::test]
    async fn messages_after_returns_oldest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels/123/messages"))
            .and(query_param("after", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "id": "103", "content": "third" },
                { "id": "102", "content": "second" },
                { "id": "101", "content": "first" }
            ])))
            .mount(&server)
            .await;

        let messages = client(&server)
            .messages_after("123", Some("100"), 50)
            .await
            .unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["101", "102", "103"]);
    }

    #[tokio::test]
    async fn api_failures_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Missing Access"))
            .mount(&server)
            .await;

        let err = client(&server).send_message("123", "x").await.unwrap_err();
        match err {
            ChatError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("Missing Access"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
