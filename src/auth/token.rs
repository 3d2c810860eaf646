use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token payload returned by the provider's token endpoint.
///
/// The record is always replaced as a whole, never merged, since the provider may rotate the
/// refresh token on every grant. Fields the crate does not read are kept in `extra` and
/// written back out unchanged.
///
/// # Example
/// ```
/// use whoop_coach::auth::TokenRecord;
///
/// let record: TokenRecord = serde_json::from_str(
///     r#"{"access_token":"a","refresh_token":"r","token_type":"bearer","expires_in":3600,"user_id":7}"#,
/// )?;
/// assert_eq!(record.access_token, "a");
/// assert_eq!(record.extra["user_id"], 7);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Advisory lifetime, kept as the provider sent it. See [`TokenRecord::lifetime_secs`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenRecord {
    /// Record with just an access and refresh token.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_type: Some("bearer".to_string()),
            expires_in: None,
            scope: None,
            extra: Map::new(),
        }
    }

    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(Value::from(seconds));
        self
    }

    /// `expires_in` as whole seconds, if it reads as a non-negative number.
    ///
    /// Integers, floats and numeric strings are accepted; anything else is `None`.
    pub fn lifetime_secs(&self) -> Option<u64> {
        match self.expires_in.as_ref()? {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_secs)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_secs))
            }
            _ => None,
        }
    }
}

fn whole_secs(secs: f64) -> Option<u64> {
    if secs.is_finite() && secs >= 0.0 {
        // Saturates above u64::MAX.
        Some(secs as u64)
    } else {
        None
    }
}
