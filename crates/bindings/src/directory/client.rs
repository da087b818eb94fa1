//! Directory-service client contract, entry types and the HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a directory client.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The admin credentials were rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No user has this login.
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// The directory refused the request.
    #[error("directory rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The configured endpoint is not a usable URL.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Login section of a user entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    /// Login name.
    #[serde(rename = "userName")]
    pub username: String,
    /// Password, only present when set or changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Domain administrator.
    #[serde(default)]
    pub admin: bool,
    /// Suspended account.
    #[serde(default)]
    pub suspended: bool,
}

/// Name section of a user entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    /// Given name.
    #[serde(rename = "givenName", default)]
    pub given_name: String,
    /// Family name.
    #[serde(rename = "familyName", default)]
    pub family_name: String,
}

/// One user of the directory, as the service represents it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Login section.
    pub login: Login,
    /// Name section.
    #[serde(default)]
    pub name: Name,
}

/// A user to create.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Given name.
    pub given_name: String,
    /// Family name.
    pub family_name: String,
    /// Initial password.
    pub password: String,
}

impl NewUser {
    /// The entry submitted to the directory.
    pub fn to_entry(&self) -> UserEntry {
        UserEntry {
            login: Login {
                username: self.username.clone(),
                password: Some(self.password.clone()),
                admin: false,
                suspended: false,
            },
            name: Name {
                given_name: self.given_name.clone(),
                family_name: self.family_name.clone(),
            },
        }
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("given_name", &self.given_name)
            .field("family_name", &self.family_name)
            .finish_non_exhaustive()
    }
}

/// Operations of a directory-service user API.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Lists every user of the domain.
    async fn list_users(&self) -> Result<Vec<UserEntry>, DirectoryError>;

    /// Fetches one user by login.
    async fn get_user(&self, login: &str) -> Result<UserEntry, DirectoryError>;

    /// Creates a user and returns the created entry.
    async fn create_user(&self, user: &NewUser) -> Result<UserEntry, DirectoryError>;

    /// Saves a modified entry under its current `login` and returns it as
    /// stored. The entry's own username may differ, which renames the user.
    async fn save_user(&self, login: &str, user: &UserEntry) -> Result<UserEntry, DirectoryError>;

    /// Deletes a user by login.
    async fn delete_user(&self, login: &str) -> Result<(), DirectoryError>;
}

#[cfg(feature = "directory")]
pub use http::HttpDirectoryClient;

#[cfg(feature = "directory")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::{RequestBuilder, Response, StatusCode};
    use serde::Deserialize;
    use tokio::sync::RwLock;
    use tracing::{debug, instrument, warn};
    use url::Url;

    use super::{DirectoryClient, DirectoryError, NewUser, UserEntry};
    use crate::directory::settings::DirectorySettings;

    /// Service name sent with the login request.
    const AUTH_SERVICE_NAME: &str = "apps";

    #[derive(Debug, Deserialize)]
    struct UserFeed {
        #[serde(default)]
        users: Vec<UserEntry>,
    }

    fn transport(e: reqwest::Error) -> DirectoryError {
        DirectoryError::Transport(e.to_string())
    }

    /// Directory client speaking JSON over HTTP.
    ///
    /// Logs in with the admin credentials on first use and caches the token;
    /// a rejected token is dropped so the next call logs in again.
    pub struct HttpDirectoryClient {
        http: reqwest::Client,
        endpoint: Url,
        auth_url: String,
        username: String,
        password: String,
        token: RwLock<Option<String>>,
    }

    impl std::fmt::Debug for HttpDirectoryClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HttpDirectoryClient")
                .field("endpoint", &self.endpoint)
                .field("auth_url", &self.auth_url)
                .field("username", &self.username)
                .finish_non_exhaustive()
        }
    }

    impl HttpDirectoryClient {
        /// Creates a client for `settings`. No request is made.
        pub fn new(settings: &DirectorySettings) -> Result<Self, DirectoryError> {
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(settings.timeout_secs))
                .build()
                .map_err(transport)?;

            let raw = settings.endpoint();
            let endpoint = Url::parse(raw.trim_end_matches('/'))
                .ok()
                .filter(|url| !url.cannot_be_a_base())
                .ok_or(DirectoryError::InvalidEndpoint(raw))?;

            Ok(Self {
                http,
                endpoint,
                auth_url: settings.auth_url.clone(),
                username: settings.username.clone(),
                password: settings.password.clone(),
                token: RwLock::new(None),
            })
        }

        fn user_url(&self, login: &str) -> Url {
            let mut url = self.endpoint.clone();
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(login);
            }
            url
        }

        async fn token(&self) -> Result<String, DirectoryError> {
            if let Some(token) = self.token.read().await.as_ref() {
                return Ok(token.clone());
            }

            let mut slot = self.token.write().await;
            if let Some(token) = slot.as_ref() {
                return Ok(token.clone());
            }
            let token = self.login().await?;
            *slot = Some(token.clone());
            Ok(token)
        }

        #[instrument(skip(self), fields(username = %self.username))]
        async fn login(&self) -> Result<String, DirectoryError> {
            debug!("Logging in to directory service");
            let params = [
                ("accountType", "HOSTED"),
                ("Email", self.username.as_str()),
                ("Passwd", self.password.as_str()),
                ("service", AUTH_SERVICE_NAME),
            ];

            let response = self
                .http
                .post(&self.auth_url)
                .form(&params)
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            let body = response.text().await.map_err(transport)?;
            if !status.is_success() {
                return Err(DirectoryError::Authentication(format!(
                    "login returned {}: {}",
                    status,
                    body.trim()
                )));
            }

            body.lines()
                .find_map(|line| line.strip_prefix("Auth="))
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty())
                .ok_or_else(|| {
                    DirectoryError::Authentication("login response carried no token".to_string())
                })
        }

        async fn send(
            &self,
            request: RequestBuilder,
            login: Option<&str>,
        ) -> Result<Response, DirectoryError> {
            let token = self.token().await?;
            let response = request
                .header("Authorization", format!("GoogleLogin auth={}", token))
                .send()
                .await
                .map_err(transport)?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            match (status, login) {
                (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
                    warn!(status = status.as_u16(), "Directory token rejected, discarding it");
                    *self.token.write().await = None;
                    Err(DirectoryError::Authentication(format!("request returned {}", status)))
                }
                (StatusCode::NOT_FOUND, Some(login)) => {
                    Err(DirectoryError::UserNotFound(login.to_string()))
                }
                _ => {
                    let message = response.text().await.unwrap_or_default();
                    Err(DirectoryError::Rejected {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
        }

        async fn decode<T: serde::de::DeserializeOwned>(
            response: Response,
        ) -> Result<T, DirectoryError> {
            response
                .json()
                .await
                .map_err(|e| DirectoryError::InvalidResponse(e.to_string()))
        }
    }

    #[async_trait]
    impl DirectoryClient for HttpDirectoryClient {
        #[instrument(skip(self))]
        async fn list_users(&self) -> Result<Vec<UserEntry>, DirectoryError> {
            let response = self.send(self.http.get(self.endpoint.clone()), None).await?;
            let feed: UserFeed = Self::decode(response).await?;
            debug!(count = feed.users.len(), "Listed directory users");
            Ok(feed.users)
        }

        #[instrument(skip(self))]
        async fn get_user(&self, login: &str) -> Result<UserEntry, DirectoryError> {
            let response = self
                .send(self.http.get(self.user_url(login)), Some(login))
                .await?;
            Self::decode(response).await
        }

        #[instrument(skip(self, user), fields(username = %user.username))]
        async fn create_user(&self, user: &NewUser) -> Result<UserEntry, DirectoryError> {
            let response = self
                .send(self.http.post(self.endpoint.clone()).json(&user.to_entry()), None)
                .await?;
            Self::decode(response).await
        }

        #[instrument(skip(self, user), fields(username = %user.login.username))]
        async fn save_user(
            &self,
            login: &str,
            user: &UserEntry,
        ) -> Result<UserEntry, DirectoryError> {
            let response = self
                .send(self.http.put(self.user_url(login)).json(user), Some(login))
                .await?;
            Self::decode(response).await
        }

        #[instrument(skip(self))]
        async fn delete_user(&self, login: &str) -> Result<(), DirectoryError> {
            self.send(self.http.delete(self.user_url(login)), Some(login))
                .await?;
            Ok(())
        }
    }
}
