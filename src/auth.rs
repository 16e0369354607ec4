//! Contract with the authentication client and the token it returns.
//!
//! The token is a JWT whose claims carry the channel grants (as an
//! `x-ably-capability` JSON document) and the expiration deadline.  Both are
//! decoded here, from the middle segment of the raw token; the signature is
//! the streaming service's business, not ours.

use crate::event::OCCUPANCY_PREFIX;

use async_trait::async_trait;
use base64::prelude::*;
use serde::Deserialize;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub enum AuthErr {
    /// The authentication endpoint answered with this HTTP status.  5xx is
    /// the only retriable failure.
    Http(u16),
    /// The raw token is not a three-segment JWT.
    MalformedToken,
    Base64(base64::DecodeError),
    SerdeParse(serde_json::Error),
    /// Implementation-specific failure of the auth client itself.
    Client(String),
}

impl AuthErr {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthErr::Http(status) if (500..600).contains(status))
    }
}

impl std::error::Error for AuthErr {}

impl fmt::Display for AuthErr {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use AuthErr::*;
        match self {
            Http(status) => write!(f, "authentication returned HTTP {}", status),
            MalformedToken => write!(f, "the auth token is not a three-segment JWT"),
            Base64(inner) => write!(f, "could not decode the token claims: {}", inner),
            SerdeParse(inner) => write!(f, "could not parse the token claims: {}", inner),
            Client(msg) => write!(f, "{}", msg),
        }?;
        Ok(())
    }
}

impl From<base64::DecodeError> for AuthErr {
    fn from(error: base64::DecodeError) -> Self {
        Self::Base64(error)
    }
}
impl From<serde_json::Error> for AuthErr {
    fn from(error: serde_json::Error) -> Self {
        Self::SerdeParse(error)
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<Token, AuthErr>;
}

/// The result of a successful authentication.
#[derive(Debug, Clone)]
pub struct Token {
    token: String,
    push_enabled: bool,
}

#[derive(Deserialize)]
struct TokenClaims {
    #[serde(rename = "x-ably-capability")]
    capability: String,
    exp: i64,
}

impl Token {
    pub fn new(token: impl Into<String>, push_enabled: bool) -> Self {
        Self {
            token: token.into(),
            push_enabled,
        }
    }

    /// The raw JWT, passed verbatim to the streaming transport.
    pub fn raw(&self) -> &str {
        &self.token
    }

    /// When `false`, streaming must not be attempted at all.
    pub fn push_enabled(&self) -> bool {
        self.push_enabled
    }

    /// The channels this token grants, in stable order.  Control channels
    /// are subscribed through their occupancy variant, so they come back
    /// with the occupancy prefix already attached.
    pub fn channel_list(&self) -> Result<Vec<String>, AuthErr> {
        let capability: hashbrown::HashMap<String, Vec<String>> =
            serde_json::from_str(&self.claims()?.capability)?;
        let mut channels: Vec<String> = capability
            .into_keys()
            .map(|channel| {
                if channel.contains("control_") {
                    format!("{}{}", OCCUPANCY_PREFIX, channel)
                } else {
                    channel
                }
            })
            .collect();
        channels.sort();
        Ok(channels)
    }

    /// How long until the token's `exp` deadline.  A deadline already in the
    /// past comes back as zero, so the expiration timer fires promptly.
    pub fn calculate_next_token_expiration(&self) -> Result<Duration, AuthErr> {
        let exp = self.claims()?.exp;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        Ok(Duration::from_secs(exp.saturating_sub(now).max(0) as u64))
    }

    fn claims(&self) -> Result<TokenClaims, AuthErr> {
        let segment = self.token.split('.').nth(1).ok_or(AuthErr::MalformedToken)?;
        let decoded = BASE64_URL_SAFE_NO_PAD.decode(segment)?;
        Ok(serde_json::from_slice(&decoded)?)
    }
}
