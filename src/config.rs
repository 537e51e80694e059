//! Client configuration.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use oauth2::AccessToken;
use url::Url;

use crate::error::{Error, Result};

pub const SANDBOX_BASE_URL: &str = "https://sandbox-quickbooks.api.intuit.com/";
pub const PRODUCTION_BASE_URL: &str = "https://quickbooks.api.intuit.com/";

/// Minor version pinned on every request unless overridden.
pub const DEFAULT_MINOR_VERSION: u32 = 75;

/// Which of the two hosted API environments requests go to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    #[default]
    Production,
}

impl Environment {
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        })
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "development" => Ok(Self::Sandbox),
            "production" | "prod" => Ok(Self::Production),
            other => Err(Error::config(format!("unknown environment `{other}`"))),
        }
    }
}

/// Settings shared by every request a [`Client`](crate::Client) makes.
///
/// Defaults: production environment, minor version
/// [`DEFAULT_MINOR_VERSION`], no base URL override, no cap on the number of
/// pages an exhaustive query may fetch.
#[derive(Debug, Clone)]
pub struct Config {
    realm_id: String,
    access_token: AccessToken,
    environment: Environment,
    minor_version: u32,
    base_url: Option<Url>,
    max_query_pages: Option<NonZeroU32>,
}

impl Config {
    #[must_use]
    pub fn new(realm_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            realm_id: realm_id.into(),
            access_token: AccessToken::new(access_token.into()),
            environment: Environment::default(),
            minor_version: DEFAULT_MINOR_VERSION,
            base_url: None,
            max_query_pages: None,
        }
    }

    /// Reads `QBO_REALM_ID`, `QBO_ACCESS_TOKEN` and the optional
    /// `QBO_ENVIRONMENT` and `QBO_MINOR_VERSION` variables.
    pub fn from_env() -> Result<Self> {
        let realm_id = std::env::var("QBO_REALM_ID")
            .map_err(|_| Error::config("QBO_REALM_ID is not set"))?;
        let access_token = std::env::var("QBO_ACCESS_TOKEN")
            .map_err(|_| Error::config("QBO_ACCESS_TOKEN is not set"))?;

        let mut config = Self::new(realm_id, access_token);
        if let Ok(environment) = std::env::var("QBO_ENVIRONMENT") {
            config.environment = environment.parse()?;
        }
        if let Ok(minor_version) = std::env::var("QBO_MINOR_VERSION") {
            config.minor_version = minor_version.trim().parse().map_err(|_| {
                Error::config(format!("QBO_MINOR_VERSION `{minor_version}` is not a number"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_minor_version(mut self, minor_version: u32) -> Self {
        self.minor_version = minor_version;
        self
    }

    /// Sends requests to `base_url` instead of the environment's host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Stops exhaustive queries after `pages` pages.
    #[must_use]
    pub fn with_max_query_pages(mut self, pages: NonZeroU32) -> Self {
        self.max_query_pages = Some(pages);
        self
    }

    /// Replaces the bearer token, e.g. after the caller refreshed it.
    pub fn set_access_token(&mut self, access_token: impl Into<String>) {
        self.access_token = AccessToken::new(access_token.into());
    }

    #[must_use]
    pub fn realm_id(&self) -> &str {
        &self.realm_id
    }

    #[must_use]
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn minor_version(&self) -> u32 {
        self.minor_version
    }

    #[must_use]
    pub fn max_query_pages(&self) -> Option<NonZeroU32> {
        self.max_query_pages
    }

    /// Checks the settings eagerly so a bad configuration fails at setup
    /// rather than on the first request.
    pub fn validate(&self) -> Result<()> {
        let realm_id = self.realm_id.trim();
        if realm_id.is_empty() {
            return Err(Error::config("realm id must not be empty"));
        }
        if !realm_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::config(format!(
                "realm id `{realm_id}` must be alphanumeric"
            )));
        }
        if self.access_token.secret().trim().is_empty() {
            return Err(Error::config("access token must not be empty"));
        }
        if self.minor_version == 0 {
            return Err(Error::config("minor version must be positive"));
        }
        if let Some(base_url) = &self.base_url {
            if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
                return Err(Error::config(format!(
                    "base url `{base_url}` must be an absolute http(s) URL"
                )));
            }
        }
        Ok(())
    }

    /// The tenant-scoped root every resource path is joined onto,
    /// `<host>/v3/company/<realm id>/`.
    pub fn company_url(&self) -> Result<Url> {
        let base = match &self.base_url {
            Some(url) => url.clone(),
            None => Url::parse(self.environment.base_url()).map_err(|_| Error::InvalidEndpoint)?,
        };
        let base = if base.path().ends_with('/') {
            base
        } else {
            let mut base = base;
            let path = format!("{}/", base.path());
            base.set_path(&path);
            base
        };
        base.join(&format!("v3/company/{}/", self.realm_id.trim()))
            .map_err(|_| Error::InvalidEndpoint)
    }
}
