//! Access Tokens
//!
//! Holds the session's bearer tokens and exposes them to the request
//! pipeline. The pipeline treats token lookup as best effort: an absent token
//! means the request goes out without an `Authorization` header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A bearer token issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Token {
    pub id: String,
    pub access_token: String,
}

impl Token {
    pub fn new(id: &str, access_token: &str) -> Self {
        Self {
            id: id.to_string(),
            access_token: access_token.to_string(),
        }
    }
}

/// Source of bearer tokens for the token-attach stages.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current session access token, if any.
    async fn current_token(&self) -> Option<String>;

    /// Short-lived elevated access token, if any.
    async fn elevated_token(&self) -> Option<String>;
}

/// In-memory token holder, mutated only through dispatched token actions.
#[derive(Default)]
pub struct TokenStore {
    current: RwLock<Option<Token>>,
    elevated: RwLock<Option<Token>>,
}

impl TokenStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn set_current(&self, token: Token) {
        let mut current = self.current.write().await;
        *current = Some(token);
    }

    pub async fn set_elevated(&self, token: Token) {
        let mut elevated = self.elevated.write().await;
        *elevated = Some(token);
    }

    /// Drop both tokens (logout).
    pub async fn reset(&self) {
        {
            let mut current = self.current.write().await;
            *current = None;
        }
        let mut elevated = self.elevated.write().await;
        *elevated = None;
    }

    pub async fn current(&self) -> Option<Token> {
        self.current.read().await.clone()
    }
}

#[async_trait]
impl TokenProvider for TokenStore {
    async fn current_token(&self) -> Option<String> {
        let current = self.current.read().await;
        current.as_ref().map(|t| t.access_token.clone())
    }

    async fn elevated_token(&self) -> Option<String> {
        let elevated = self.elevated.read().await;
        elevated.as_ref().map(|t| t.access_token.clone())
    }
}
