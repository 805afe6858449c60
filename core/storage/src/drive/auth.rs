//! OAuth2 consent and token exchange for Google Drive.
//!
//! The one-time consent exchange yields a refresh credential the
//! configuration record stores; each adapter session then trades that
//! credential for a short-lived access token.

use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenResponse,
    TokenUrl,
};
use serde::{Deserialize, Serialize};

use driveloft_common::{Error, Result, SecretString};

/// OAuth2 authorization endpoint.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// OAuth2 token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Redirect URL for the consent callback.
const DEFAULT_REDIRECT_URL: &str = "http://localhost:8099/callback";
/// Google Drive OAuth2 scope: per-file access to files the app creates.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// OAuth2 client credentials the deployment provides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OauthCredentials {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Redirect URL for the consent callback.
    pub redirect_url: String,
}

impl OauthCredentials {
    /// Read credentials from `DRIVELOFT_CLIENT_ID`, `DRIVELOFT_CLIENT_SECRET`
    /// and optionally `DRIVELOFT_REDIRECT_URL`.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("DRIVELOFT_CLIENT_ID").ok()?;
        let client_secret = std::env::var("DRIVELOFT_CLIENT_SECRET").ok()?;
        let redirect_url = std::env::var("DRIVELOFT_REDIRECT_URL")
            .unwrap_or_else(|_| DEFAULT_REDIRECT_URL.to_string());

        Some(Self {
            client_id,
            client_secret,
            redirect_url,
        })
    }
}

/// OAuth2 flow handler.
///
/// Thin wrapper over the provider endpoints; the surrounding system decides
/// when to start a consent exchange and where tokens are stored.
pub struct OauthHelper {
    client: BasicClient,
}

impl OauthHelper {
    /// Create a helper from deployment credentials.
    ///
    /// # Errors
    /// - Malformed endpoint or redirect URL
    pub fn new(credentials: OauthCredentials) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            AuthUrl::new(GOOGLE_AUTH_URL.to_string())
                .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            Some(
                TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            ),
        )
        .set_redirect_uri(
            RedirectUrl::new(credentials.redirect_url.clone())
                .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
        );

        Ok(Self { client })
    }

    /// The consent URL the user must visit to authorize access.
    ///
    /// Requests offline access with a forced consent prompt so the exchange
    /// returns a refresh credential.
    pub fn consent_url(&self) -> String {
        let (auth_url, _csrf_token) = self
            .client
            .authorize_url(oauth2::CsrfToken::new_random)
            .add_scope(Scope::new(DRIVE_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        auth_url.to_string()
    }

    /// Exchange a one-time authorization code for a refresh credential.
    ///
    /// # Errors
    /// - Invalid authorization code
    /// - Provider did not return a refresh token
    pub async fn exchange_code(&self, code: &str) -> Result<SecretString> {
        use oauth2::reqwest::async_http_client;
        use oauth2::AuthorizationCode;

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        let refresh_token = token_result
            .refresh_token()
            .ok_or_else(|| {
                Error::Authentication(
                    "No refresh token received. Ensure 'offline' access and 'consent' prompt were requested.".to_string(),
                )
            })?
            .secret()
            .clone();

        Ok(SecretString::new(refresh_token))
    }

    /// Trade the stored refresh credential for a short-lived access token.
    ///
    /// # Errors
    /// - Invalid or revoked refresh token
    pub async fn access_token(&self, refresh_token: &str) -> Result<String> {
        use oauth2::reqwest::async_http_client;
        use oauth2::RefreshToken;

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| Error::Authentication(format!("Token refresh failed: {}", e)))?;

        Ok(token_result.access_token().secret().clone())
    }
}
