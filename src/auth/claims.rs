use serde::{Deserialize, Serialize};

/// Access-token claims. Signature, `iss`, `aud`, `exp` and `nbf` are already
/// checked by the time a `Claims` value exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Provider user id; becomes the local user id.
    pub sub: String,
    pub aud: Audience,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    /// Often only "authenticated"; the procurement role lives in `app_metadata`.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<AppMetadata>,
}

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Self::One(aud) => aud == audience,
            Self::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

impl From<&str> for Audience {
    fn from(aud: &str) -> Self {
        Self::One(aud.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppMetadata {
    #[serde(default)]
    pub provider: Option<String>,
    /// admin, procurement_officer, bidder or evaluator
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_audience_string_or_list() {
        let base = json!({
            "sub": "6f1c2b1e-0f47-4a43-9a3c-2f3e9f0b7d11",
            "iss": "https://id.example/auth/v1",
            "iat": 0,
            "exp": 0,
        });

        let mut single = base.clone();
        single["aud"] = json!("authenticated");
        let claims: Claims = serde_json::from_value(single).unwrap();
        assert!(claims.aud.contains("authenticated"));
        assert!(claims.app_metadata.is_none());

        let mut list = base;
        list["aud"] = json!(["portal", "authenticated"]);
        let claims: Claims = serde_json::from_value(list).unwrap();
        assert!(claims.aud.contains("authenticated"));
        assert!(!claims.aud.contains("admin-console"));
    }
}
