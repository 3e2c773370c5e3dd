use crate::ebay::config::{CLIENT_ID, CLIENT_SECRET, OAUTH_SCOPE, OAUTH_TOKEN_URL};
use crate::http::build_client;
use crate::retry::{Attempt, Retrier};
use crate::token::{AuthError, TokenGrant, TokenProvider};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Client-credentials OAuth grant against the marketplace identity
/// endpoint. The exchange itself goes through the retrier since the token
/// host throws the same overload responses as the data endpoints.
pub struct EbayTokenProvider {
    http: Client,
    retrier: Retrier,
}

impl EbayTokenProvider {
    pub fn new(retrier: Retrier) -> Self {
        Self {
            http: build_client(),
            retrier,
        }
    }

    pub fn credentials_configured() -> bool {
        !CLIENT_ID.is_empty() && !CLIENT_SECRET.is_empty()
    }

    fn basic_auth_header() -> Result<String, AuthError> {
        if !Self::credentials_configured() {
            return Err(AuthError::MissingCredentials);
        }
        let raw = format!("{}:{}", *CLIENT_ID, *CLIENT_SECRET);
        Ok(format!("Basic {}", BASE64.encode(raw)))
    }
}

#[async_trait]
impl TokenProvider for EbayTokenProvider {
    async fn exchange(&self) -> Result<TokenGrant, AuthError> {
        let authorization = Self::basic_auth_header()?;
        let body = [("grant_type", "client_credentials"), ("scope", OAUTH_SCOPE)];

        let response = self
            .retrier
            .run(|| {
                let request = self
                    .http
                    .post(OAUTH_TOKEN_URL.as_str())
                    .header("Authorization", &authorization)
                    .form(&body);
                async move {
                    match request.send().await {
                        Ok(resp) if resp.status() == StatusCode::SERVICE_UNAVAILABLE => {
                            Ok(Attempt::Busy(resp))
                        }
                        Ok(resp) => Ok(Attempt::Ready(resp)),
                        Err(err) => Err(err.to_string()),
                    }
                }
            })
            .await
            .map_err(|err| AuthError::Exchange(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::Exchange(format!("HTTP {}", response.status())));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|err| AuthError::Exchange(err.to_string()))?;
        Ok(TokenGrant {
            access_token: payload.access_token,
            expires_in_secs: payload.expires_in,
        })
    }
}
