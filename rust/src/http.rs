// REST adapter for the assistant chat endpoints.
//
//   GET    {base}/chat/history?limit=&offset=   -> [message] | {"messages": [message]}
//   POST   {base}/chat/send   {"content": ...}  -> any 2xx
//   DELETE {base}/chat/history                  -> any 2xx

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use crate::backend::{ChatBackend, HistoryQuery, ServiceError};
use crate::state::{ChatMessage, MessageDeliveryState, MessageRole};

#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpChatBackend {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            auth_token: auth_token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<String, ServiceError> {
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpChatBackend {
    async fn fetch_history(&self, query: HistoryQuery) -> Result<Vec<ChatMessage>, ServiceError> {
        let req = self
            .client
            .get(self.url("/chat/history"))
            .query(&[("limit", query.limit), ("offset", query.offset)]);
        let body = self.execute(req).await?;
        let messages = parse_history_body(&body)?;
        tracing::debug!(
            limit = query.limit,
            offset = query.offset,
            count = messages.len(),
            "history page fetched"
        );
        Ok(messages)
    }

    async fn send_message(&self, content: &str) -> Result<(), ServiceError> {
        let req = self
            .client
            .post(self.url("/chat/send"))
            .json(&serde_json::json!({ "content": content }));
        self.execute(req).await.map(|_| ())
    }

    async fn clear_history(&self) -> Result<(), ServiceError> {
        let req = self.client.delete(self.url("/chat/history"));
        self.execute(req).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryBody {
    Bare(Vec<WireMessage>),
    Wrapped { messages: Vec<WireMessage> },
    Data { data: Vec<WireMessage> },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default, alias = "_id")]
    id: serde_json::Value,
    #[serde(default)]
    content: String,
    #[serde(default)]
    role: String,
    #[serde(default)]
    order: Option<i64>,
    #[serde(default, alias = "session_id")]
    session_id: Option<String>,
    #[serde(default, alias = "created_at")]
    created_at: serde_json::Value,
}

pub(crate) fn parse_history_body(body: &str) -> Result<Vec<ChatMessage>, ServiceError> {
    let parsed: HistoryBody =
        serde_json::from_str(body).map_err(|e| ServiceError::Decode(e.to_string()))?;
    let wire = match parsed {
        HistoryBody::Bare(v) => v,
        HistoryBody::Wrapped { messages } => messages,
        HistoryBody::Data { data } => data,
    };
    let mut out = Vec::with_capacity(wire.len());
    for w in wire {
        match w.into_message() {
            Ok(m) => out.push(m),
            Err(reason) => tracing::warn!(%reason, "skipping malformed history entry"),
        }
    }
    Ok(out)
}

impl WireMessage {
    fn into_message(self) -> Result<ChatMessage, String> {
        let id = match self.id {
            serde_json::Value::String(s) if !s.is_empty() => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => return Err(format!("bad id: {other}")),
        };
        let role = MessageRole::parse(&self.role)
            .ok_or_else(|| format!("message {id}: unknown role {:?}", self.role))?;
        let created_at_ms = parse_timestamp_ms(&self.created_at)
            .ok_or_else(|| format!("message {id}: bad createdAt {}", self.created_at))?;
        Ok(ChatMessage {
            id,
            content: self.content,
            role,
            order: self.order.unwrap_or(0),
            session_id: self.session_id.unwrap_or_default(),
            created_at_ms,
            delivery: MessageDeliveryState::Sent,
        })
    }
}

/// RFC 3339 strings, zone-less ISO strings (taken as UTC) and integer milliseconds.
pub(crate) fn parse_timestamp_ms(raw: &serde_json::Value) -> Option<i64> {
    match raw {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.timestamp_millis());
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc().timestamp_millis())
        }
        _ => None,
    }
}
