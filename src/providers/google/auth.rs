//! Google Wallet credentials: static tokens and service accounts.

use crate::http::ApiClient;
use crate::session::{AccessToken, Session, TokenCache};
use crate::{Result, WalletError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use reqwest::Method;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use std::path::Path;
use tracing::debug;

pub(crate) const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const WALLET_SCOPE: &str = "https://www.googleapis.com/auth/wallet_object.issuer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Fields of a service account key file that matter here.
#[derive(Deserialize)]
struct ServiceAccountFile {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Service account identity with its RS256 signing key.
pub struct ServiceAccount {
    client_email: String,
    token_uri: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Parses a service account key file (JSON).
    ///
    /// `token_uri` overrides the one in the file.
    pub fn from_json(json: &str, token_uri: Option<&str>) -> Result<Self> {
        let file: ServiceAccountFile = serde_json::from_str(json).map_err(|e| {
            WalletError::Configuration(format!("malformed service account file: {}", e))
        })?;
        let key = RsaPrivateKey::from_pkcs8_pem(&file.private_key).map_err(|e| {
            WalletError::Signing(format!("cannot parse service account key: {}", e))
        })?;

        Ok(Self {
            client_email: file.client_email,
            token_uri: token_uri
                .map(str::to_string)
                .or(file.token_uri)
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            signing_key: SigningKey::<Sha256>::new(key),
        })
    }

    pub fn from_file(path: impl AsRef<Path>, token_uri: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            WalletError::Configuration(format!(
                "cannot read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&json, token_uri)
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Signs `claims` as a compact RS256 JWT.
    pub fn sign_jwt<C: Serialize>(&self, claims: &C) -> Result<String> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{}.{}", header, payload);

        let signature = self
            .signing_key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| WalletError::Signing(format!("cannot sign JWT: {}", e)))?;
        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    /// Exchanges a signed assertion for an OAuth access token.
    async fn exchange(&self, client: &ApiClient) -> Result<AccessToken> {
        let now = Utc::now().timestamp();
        let assertion = self.sign_jwt(&json!({
            "iss": self.client_email,
            "scope": WALLET_SCOPE,
            "aud": self.token_uri,
            "iat": now,
            "exp": now + ASSERTION_LIFETIME_SECS,
        }))?;

        let response = client
            .send(client.request_url(Method::POST, &self.token_uri).form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ]))
            .await?;

        let token = response
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                WalletError::provider_api("google", None, "token response has no access_token")
            })?;
        let expires_in = response
            .get("expires_in")
            .and_then(Value::as_i64)
            .unwrap_or(ASSERTION_LIFETIME_SECS);
        debug!(client_email = %self.client_email, expires_in, "Obtained Google access token");

        Ok(AccessToken::expiring_in(token, expires_in))
    }
}

/// How requests to the Google Wallet API are authorized.
#[derive(Debug)]
pub enum GoogleAuth {
    /// Pre-issued bearer token
    Static(AccessToken),
    /// Service account; tokens are exchanged on demand and cached
    ServiceAccount {
        account: ServiceAccount,
        cache: TokenCache,
    },
}

impl GoogleAuth {
    pub fn service_account(account: ServiceAccount) -> Self {
        Self::ServiceAccount {
            account,
            cache: TokenCache::new(),
        }
    }

    /// Current bearer token.
    pub(crate) async fn bearer(&self, client: &ApiClient) -> Result<String> {
        match self {
            Self::Static(token) => Ok(token.token().to_string()),
            Self::ServiceAccount { account, cache } => {
                let token = cache.get_or_refresh(|| account.exchange(client)).await?;
                Ok(token.token().to_string())
            }
        }
    }

    /// Service account used to sign save links, if any.
    pub fn account(&self) -> Option<&ServiceAccount> {
        match self {
            Self::Static(_) => None,
            Self::ServiceAccount { account, .. } => Some(account),
        }
    }
}
