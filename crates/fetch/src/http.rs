use reqwest::RequestBuilder;
use serde_json::Value;

/// Outcome of one GET. Transport failures and undecodable bodies are folded
/// into `code == 0` with a diagnostic string body, so callers branch on the
/// status code alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub code: u16,
    pub body: Option<Value>,
}

impl RawResponse {
    pub const TRANSPORT_FAILURE: u16 = 0;

    fn transport_failure(diagnostic: String) -> Self {
        Self {
            code: Self::TRANSPORT_FAILURE,
            body: Some(Value::String(diagnostic)),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 200
    }

    /// Body as text, for log fields.
    pub fn diagnostic(&self) -> String {
        match &self.body {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "<empty body>".to_string(),
        }
    }
}

pub async fn send_json(request: RequestBuilder) -> RawResponse {
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => return RawResponse::transport_failure(format!("unhandled fetch error: {e}")),
    };

    let code = response.status().as_u16();
    match response.json::<Value>().await {
        Ok(Value::Null) => RawResponse { code, body: None },
        Ok(body) => RawResponse {
            code,
            body: Some(body),
        },
        Err(e) => RawResponse::transport_failure(format!(
            "unhandled fetch error: status {code}, undecodable body: {e}"
        )),
    }
}
