//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Notifier, NotifyError};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Upper bound for one Bot API call, connect to last byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the subset of the Bot API the watcher uses.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

/// Envelope around every Bot API response.
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// The bot's own account, from `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

impl TelegramClient {
    /// Create a client for the public Bot API.
    pub fn new(token: String) -> Result<Self, NotifyError> {
        Self::with_base_url(DEFAULT_API_URL.to_string(), token)
    }

    /// Create a client for a Bot API server at `base_url` (no trailing slash needed).
    pub fn with_base_url(base_url: String, token: String) -> Result<Self, NotifyError> {
        Self::with_timeout(base_url, token, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: String,
        token: String,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: Option<&SendMessage<'_>>,
    ) -> Result<T, NotifyError> {
        let url = self.method_url(method);
        debug!(method, "calling Bot API");
        let req = match body {
            Some(body) => self.client.post(&url).json(body),
            None => self.client.get(&url),
        };
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        parse_response(status.as_u16(), &bytes)
    }

    /// Identity of the bot behind the token.
    pub async fn get_me(&self) -> Result<BotUser, NotifyError> {
        self.call("getMe", None).await
    }

    /// Pending updates; used to discover chat ids of people who messaged the bot.
    pub async fn get_updates(&self) -> Result<Vec<Update>, NotifyError> {
        let updates: Vec<Update> = self.call("getUpdates", None).await?;
        info!(count = updates.len(), "fetched updates");
        Ok(updates)
    }

    /// Send `text` to the chat `chat_id`.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let body = SendMessage { chat_id, text };
        let _: serde_json::Value = self.call("sendMessage", Some(&body)).await?;
        info!(chat_id, "message sent");
        Ok(())
    }
}

/// Decode a Bot API response body, turning `ok: false` into [`NotifyError::Api`].
fn parse_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, NotifyError> {
    let parsed: ApiResponse<T> = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(e) if (200..300).contains(&status) => return Err(e.into()),
        Err(_) => {
            return Err(NotifyError::Api {
                status,
                description: String::from_utf8_lossy(body).into_owned(),
            });
        }
    };
    match (parsed.ok, parsed.result) {
        (true, Some(result)) => Ok(result),
        (ok, _) => Err(NotifyError::Api {
            status,
            description: parsed.description.unwrap_or_else(|| {
                if ok {
                    "response without result".to_string()
                } else {
                    "request rejected".to_string()
                }
            }),
        }),
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, text: &str, recipient: &str) -> Result<(), NotifyError> {
        self.send_message(recipient, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client =
            TelegramClient::with_base_url("http://localhost:8081/".into(), "t".into()).unwrap();
        assert_eq!(client.base_url, "http://localhost:8081");
        assert_eq!(client.method_url("getMe"), "http://localhost:8081/bott/getMe");
    }

    #[tokio::test]
    async fn unresponsive_server_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = TelegramClient::with_timeout(
            format!("http://{addr}"),
            "t".into(),
            Duration::from_millis(200),
        )
        .unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.send_message("42", "hello"),
        )
        .await
        .expect("request was not bounded by the client timeout");
        match result {
            Err(NotifyError::Http(e)) => assert!(e.is_timeout(), "{e}"),
            other => panic!("unexpected result: {other:?}"),
        }
        server.abort();
    }

    #[test]
    fn send_message_body() {
        let body = SendMessage {
            chat_id: "123456789",
            text: "ICMS-Watcher Update:\n",
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"chat_id":"123456789","text":"ICMS-Watcher Update:\n"}"#
        );
    }

    #[test]
    fn parses_get_me() {
        let body = br#"{"ok":true,"result":{"id":42,"is_bot":true,"first_name":"Watcher","username":"icms_watch_bot"}}"#;
        let me: BotUser = parse_response(200, body).unwrap();
        assert_eq!(me.id, 42);
        assert_eq!(me.username.as_deref(), Some("icms_watch_bot"));
    }

    #[test]
    fn parses_updates_with_and_without_messages() {
        let body = br#"{"ok":true,"result":[
            {"update_id":1,"message":{"message_id":5,"chat":{"id":123456789,"type":"private","first_name":"Kim"},"text":"/start"}},
            {"update_id":2,"edited_message":{}}
        ]}"#;
        let updates: Vec<Update> = parse_response(200, body).unwrap();
        assert_eq!(updates.len(), 2);
        let chat = &updates[0].message.as_ref().unwrap().chat;
        assert_eq!(chat.id, 123456789);
        assert_eq!(chat.kind, "private");
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn api_rejection_carries_description() {
        let body = br#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = parse_response::<serde_json::Value>(400, body).unwrap_err();
        match err {
            NotifyError::Api {
                status,
                description,
            } => {
                assert_eq!(status, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_json_error_page() {
        let err = parse_response::<serde_json::Value>(502, b"<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, NotifyError::Api { status: 502, .. }));
    }

    #[test]
    fn non_json_success_is_a_parse_error() {
        let err = parse_response::<serde_json::Value>(200, b"not json").unwrap_err();
        assert!(matches!(err, NotifyError::Json(_)));
    }
}
