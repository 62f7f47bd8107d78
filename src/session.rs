use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::model::Section;
use crate::storage::StateStore;

pub const AUTH_TOKEN_KEY: &str = "authToken";
pub const ACTIVE_SECTION_KEY: &str = "activeSection";

/// Claims read from the admin's bearer token. The signature is not checked;
/// the server remains the authority.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdminProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "adminId", default)]
    pub admin_id: Option<String>,
    #[serde(rename = "iat", default)]
    pub issued_at: Option<i64>,
    #[serde(rename = "exp", default)]
    pub expires_at: Option<i64>,
}

impl AdminProfile {
    pub fn from_token(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at
            .map(|exp| exp <= now.unix_timestamp())
            .unwrap_or(false)
    }

    pub fn display_name(&self) -> &str {
        self.admin_id
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("admin")
    }

    /// Key/value lines for the profile panel.
    pub fn summary_at(&self, now: OffsetDateTime) -> Vec<(&'static str, String)> {
        let status = if self.is_expired_at(now) {
            "expired; run `estatedesk login` again"
        } else {
            "active"
        };
        vec![
            ("Admin", self.display_name().to_string()),
            ("ID", self.id.clone().unwrap_or_else(|| "-".into())),
            ("Issued", claim_time(self.issued_at)),
            ("Expires", claim_time(self.expires_at)),
            ("Token", status.to_string()),
        ]
    }
}

fn claim_time(seconds: Option<i64>) -> String {
    seconds
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|dt| {
            dt.format(time::macros::format_description!(
                "[year]-[month]-[day] [hour]:[minute] UTC"
            ))
            .ok()
        })
        .unwrap_or_else(|| "-".into())
}

/// Bearer token and UI position, persisted through a [`StateStore`].
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn StateStore>,
    token: Option<String>,
    profile: Option<AdminProfile>,
}

impl Session {
    pub fn restore(store: Arc<dyn StateStore>) -> Result<Self> {
        let token = store
            .load(AUTH_TOKEN_KEY)
            .context("loading stored auth token")?
            .filter(|token| !token.trim().is_empty());
        let profile = token.as_deref().and_then(AdminProfile::from_token);
        if token.is_some() && profile.is_none() {
            tracing::warn!("stored auth token is not a readable JWT; profile unavailable");
        }
        Ok(Self {
            store,
            token,
            profile,
        })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn profile(&self) -> Option<&AdminProfile> {
        self.profile.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn login(&mut self, token: &str) -> Result<()> {
        let token = token.trim();
        anyhow::ensure!(!token.is_empty(), "auth token cannot be empty");
        self.store
            .save(AUTH_TOKEN_KEY, token)
            .context("persisting auth token")?;
        self.profile = AdminProfile::from_token(token);
        self.token = Some(token.to_string());
        tracing::info!(
            admin = self.profile.as_ref().map(AdminProfile::display_name),
            "session token stored"
        );
        Ok(())
    }

    /// Forgets the token and the remembered section.
    pub fn logout(&mut self) -> Result<()> {
        self.store
            .remove(AUTH_TOKEN_KEY)
            .context("removing auth token")?;
        self.store
            .remove(ACTIVE_SECTION_KEY)
            .context("removing active section")?;
        self.token = None;
        self.profile = None;
        Ok(())
    }

    pub fn active_section(&self) -> Result<Option<Section>> {
        let raw = self
            .store
            .load(ACTIVE_SECTION_KEY)
            .context("loading active section")?;
        Ok(raw.and_then(|raw| match Section::from_str(&raw) {
            Ok(section) => Some(section),
            Err(_) => {
                tracing::warn!(%raw, "ignoring unknown stored section");
                None
            }
        }))
    }

    pub fn remember_section(&self, section: Section) -> Result<()> {
        self.store
            .save(ACTIVE_SECTION_KEY, &section.to_string())
            .context("persisting active section")
    }
}
