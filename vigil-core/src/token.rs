//! Backend credential acquisition.

use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use vigil_config::{BackendConfig, OAuthClientConfig};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint answered {status}")]
    Rejected { status: u16 },
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Where the bearer token for the backend comes from.
#[derive(Clone)]
pub enum TokenProvider {
    /// A pre-issued token from configuration.
    Static(String),
    /// OAuth2 client-credentials grant.
    ClientCredentials {
        http: reqwest::Client,
        client: OAuthClientConfig,
        token_url: String,
    },
    /// No credential configured; registration is skipped.
    Disabled,
}

impl fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenProvider::Static(_) => f.write_str("Static(<redacted>)"),
            TokenProvider::ClientCredentials {
                client, token_url, ..
            } => f
                .debug_struct("ClientCredentials")
                .field("client", client)
                .field("token_url", token_url)
                .finish(),
            TokenProvider::Disabled => f.write_str("Disabled"),
        }
    }
}

impl TokenProvider {
    /// A static token wins over client credentials.
    pub fn from_config(config: &BackendConfig, http: reqwest::Client) -> Self {
        if let Some(token) = &config.token {
            return TokenProvider::Static(token.clone());
        }
        match &config.oauth {
            Some(client) => TokenProvider::ClientCredentials {
                http,
                token_url: client.token_url(),
                client: client.clone(),
            },
            None => TokenProvider::Disabled,
        }
    }

    /// Overrides the token endpoint of a client-credentials provider.
    pub fn with_token_url(self, url: impl Into<String>) -> Self {
        match self {
            TokenProvider::ClientCredentials { http, client, .. } => {
                TokenProvider::ClientCredentials {
                    http,
                    client,
                    token_url: url.into(),
                }
            }
            other => other,
        }
    }

    /// `Ok(None)` when no credential is configured.
    pub async fn token(&self) -> Result<Option<String>, TokenError> {
        match self {
            TokenProvider::Static(token) => Ok(Some(token.clone())),
            TokenProvider::Disabled => Ok(None),
            TokenProvider::ClientCredentials {
                http,
                client,
                token_url,
            } => {
                debug!(tenant = %client.tenant_id, "requesting backend token");
                let response = http
                    .post(token_url)
                    .form(&[
                        ("client_id", client.client_id.as_str()),
                        ("scope", client.scope.as_str()),
                        ("client_secret", client.client_secret.as_str()),
                        ("grant_type", "client_credentials"),
                    ])
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(TokenError::Rejected {
                        status: status.as_u16(),
                    });
                }
                let body: TokenResponse = response.json().await?;
                Ok(Some(body.access_token))
            }
        }
    }
}
