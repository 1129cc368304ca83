use serde::{Deserialize, Serialize};

pub(crate) const CONFIG_VERSION: u32 = 1;

/// Identity provider and OAuth client settings
///
/// The hosted UI base URL serves the `/oauth2/*` endpoints (authorize, token,
/// revoke); the issuer URL is the value expected in the `iss` claim and hosts
/// the published key set under `/.well-known/jwks.json`. For Cognito-style
/// providers these are two different domains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    /// OAuth client ID registered with the identity provider
    pub client_id: String,

    /// Base URL of the provider's hosted sign-in UI
    pub hosted_ui_url: String,

    /// Issuer URL expected in token `iss` claims
    pub issuer_url: String,

    /// Requested scopes
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Port for the local callback server
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// Seconds before an unanswered authorization attempt is abandoned
    #[serde(default = "default_flow_timeout_secs")]
    pub flow_timeout_secs: i64,
}

fn default_scopes() -> Vec<String> {
    vec!["email".to_string(), "openid".to_string(), "phone".to_string()]
}

fn default_callback_port() -> u16 {
    5000
}

fn default_flow_timeout_secs() -> i64 {
    300
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            hosted_ui_url: String::new(),
            issuer_url: String::new(),
            scopes: default_scopes(),
            callback_port: default_callback_port(),
            flow_timeout_secs: default_flow_timeout_secs(),
        }
    }
}

impl AuthConfig {
    /// Redirect URI registered with the provider, derived from the callback
    /// port so the authorize and token requests can never disagree.
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}/callback", self.callback_port)
    }

    /// Authorization endpoint on the hosted UI domain
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/authorize", self.hosted_ui_url)
    }

    /// Token endpoint on the hosted UI domain
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.hosted_ui_url)
    }

    /// Revocation endpoint on the hosted UI domain
    pub fn revoke_endpoint(&self) -> String {
        format!("{}/oauth2/revoke", self.hosted_ui_url)
    }

    /// Published signing-key set location on the issuer domain
    pub fn jwks_endpoint(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer_url)
    }

    /// Space-separated scope string for the authorize request
    pub fn scopes_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            auth: AuthConfig::default(),
        }
    }
}
