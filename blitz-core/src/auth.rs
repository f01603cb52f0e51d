//! Bearer-token adapter for the external auth collaborator.
//!
//! Access tokens are validated against the provider's JWKS endpoint and
//! mapped to a [`Principal`]. Dev mode skips signature validation and
//! just decodes the payload, for local development against fake tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use blitz_store::PrincipalSource;
use blitz_types::Principal;

const KEY_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id at the provider.
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksKey {
    pub kid: String,
    pub n: Option<String>,
    pub e: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<JwksKey>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to fetch JWKS")]
    JwksFetchError,
    #[error("Key not found")]
    KeyNotFound,
    #[error("Invalid key")]
    InvalidKey,
}

pub struct AuthService {
    client: Client,
    jwks_cache: RwLock<HashMap<String, (DecodingKey, SystemTime)>>,
    jwks_url: String,
    audience: String,
    dev_mode: bool,
}

impl AuthService {
    pub fn new(jwks_url: String, audience: String) -> Self {
        Self {
            client: Client::new(),
            jwks_cache: RwLock::new(HashMap::new()),
            jwks_url,
            audience,
            dev_mode: false,
        }
    }

    pub fn new_dev_mode() -> Self {
        Self {
            client: Client::new(),
            jwks_cache: RwLock::new(HashMap::new()),
            jwks_url: String::new(),
            audience: "dev".to_string(),
            dev_mode: true,
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<Principal, AuthError> {
        if self.dev_mode {
            return self.validate_dev_token(token);
        }

        let header = decode_header(token).map_err(|err| {
            warn!("Failed to decode JWT header: {err}");
            AuthError::InvalidToken
        })?;
        let kid = header.kid.ok_or_else(|| {
            warn!("JWT header missing 'kid' field");
            AuthError::InvalidToken
        })?;

        let decoding_key = self.get_decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        let token_data =
            decode::<SessionClaims>(token, &decoding_key, &validation).map_err(|err| {
                warn!("JWT validation failed: {err}");
                AuthError::InvalidToken
            })?;

        let claims = token_data.claims;
        if claims.exp < now_secs() {
            warn!("Token expired: exp={}, now={}", claims.exp, now_secs());
            return Err(AuthError::TokenExpired);
        }
        principal_from_claims(claims)
    }

    async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some((key, cached_at)) = cache.get(kid) {
                if cached_at.elapsed().unwrap_or(KEY_TTL) < KEY_TTL {
                    debug!("Using cached decoding key for kid {kid}");
                    return Ok(key.clone());
                }
            }
        }

        debug!("Fetching JWKS from {}", self.jwks_url);
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|err| {
                warn!("Failed to fetch JWKS: {err}");
                AuthError::JwksFetchError
            })?;
        if !response.status().is_success() {
            warn!("JWKS fetch returned status: {}", response.status());
            return Err(AuthError::JwksFetchError);
        }
        let jwks: JwksResponse = response.json().await.map_err(|err| {
            warn!("Failed to parse JWKS JSON: {err}");
            AuthError::JwksFetchError
        })?;

        let jwks_key = jwks.keys.iter().find(|key| key.kid == kid).ok_or_else(|| {
            warn!("Key {kid} not found in JWKS; the key rotated or the token is foreign");
            AuthError::KeyNotFound
        })?;
        let (n, e) = jwks_key
            .n
            .as_deref()
            .zip(jwks_key.e.as_deref())
            .ok_or(AuthError::InvalidKey)?;
        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
            warn!("Failed to build decoding key from RSA components: {err}");
            AuthError::InvalidKey
        })?;

        self.jwks_cache
            .write()
            .await
            .insert(kid.to_string(), (decoding_key.clone(), SystemTime::now()));
        Ok(decoding_key)
    }

    /// Dev mode: the token must look like a JWT, but only the payload is
    /// read; nothing is verified.
    fn validate_dev_token(&self, token: &str) -> Result<Principal, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::InvalidToken);
        }
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|err| {
                warn!("Failed to decode JWT payload in dev mode: {err}");
                AuthError::InvalidToken
            })?;
        let claims: SessionClaims = serde_json::from_slice(&payload).map_err(|err| {
            warn!("Failed to parse JWT claims in dev mode: {err}");
            AuthError::InvalidToken
        })?;
        if claims.exp < now_secs() {
            return Err(AuthError::TokenExpired);
        }
        principal_from_claims(claims)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn principal_from_claims(claims: SessionClaims) -> Result<Principal, AuthError> {
    let id = Uuid::parse_str(&claims.sub).map_err(|_| {
        warn!("Token subject is not a valid account id");
        AuthError::InvalidToken
    })?;
    Ok(Principal {
        id,
        email: claims.email,
        role: claims.app_metadata.role,
    })
}

/// Principal source over a settable bearer token, for clients that hold
/// the user's access token. A rejected token yields no principal rather
/// than an error, so calling flows degrade to unauthenticated.
pub struct BearerSession {
    auth: Arc<AuthService>,
    token: RwLock<Option<String>>,
}

impl BearerSession {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self {
            auth,
            token: RwLock::new(None),
        }
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }
}

#[async_trait]
impl PrincipalSource for BearerSession {
    async fn current_principal(&self) -> Option<Principal> {
        let token = self.token.read().await.clone()?;
        match self.auth.validate_token(&token).await {
            Ok(principal) => Some(principal),
            Err(err) => {
                warn!("Bearer token rejected: {err}");
                None
            }
        }
    }
}
