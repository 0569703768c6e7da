//! Resolving the identity used to log in to a CAS server

use std::path::{Path, PathBuf};

use url::Url;

use crate::{error::CredentialsError, netrc::Netrc, Password, Username};

/// Credentials posted to the CAS server to obtain a ticket-granting ticket
#[derive(Clone, Debug)]
pub struct Credentials {
    /// The username
    pub username: Username,

    /// The password
    pub password: Password,
}

/// Where to find the credentials for logging in
///
/// Explicit credentials take precedence over the netrc file.
#[derive(Clone, Debug, Default)]
pub struct CredentialSource {
    username: Option<String>,
    password: Option<Password>,
    netrc_path: Option<PathBuf>,
}

impl CredentialSource {
    /// A source with no inputs, which will fail to resolve
    pub const fn new() -> Self {
        Self {
            username: None,
            password: None,
            netrc_path: None,
        }
    }

    /// Explicit username and password
    pub fn explicit(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new()
            .with_username(username)
            .with_password(password)
    }

    /// The netrc file in the user's home directory
    pub fn default_netrc() -> Self {
        Self::new().with_netrc_path(expand_home("~/.netrc"))
    }

    /// Sets the explicit username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the explicit password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Password::new(password.into()));
        self
    }

    /// Sets the netrc file to consult when no explicit username is given
    ///
    /// A leading `~` is expanded to the user's home directory.
    pub fn with_netrc_path(mut self, path: impl AsRef<Path>) -> Self {
        self.netrc_path = Some(expand_home(path));
        self
    }

    /// Resolves credentials for logging in to `server`
    pub async fn resolve(&self, server: &Url) -> Result<Credentials, CredentialsError> {
        resolve(
            self.username.as_deref(),
            self.password.as_ref().map(|p| p.as_str()),
            self.netrc_path.as_deref(),
            server,
        )
        .await
    }
}

/// Resolves credentials from explicit values or a netrc file
///
/// A non-blank `username` is used together with `password`, which may be
/// empty. Otherwise, the entry for the host of `server` is taken from the
/// netrc file at `netrc_path`. Supplying a password without a username is
/// an error, regardless of the netrc contents.
pub async fn resolve(
    username: Option<&str>,
    password: Option<&str>,
    netrc_path: Option<&Path>,
    server: &Url,
) -> Result<Credentials, CredentialsError> {
    let username = username.map(str::trim).filter(|u| !u.is_empty());
    let password = password.unwrap_or_default();

    if let Some(username) = username {
        tracing::debug!(%username, "using explicitly provided credentials");
        return Ok(Credentials {
            username: Username::new(username.to_owned()),
            password: Password::new(password.to_owned()),
        });
    }

    if !password.trim().is_empty() {
        return Err(CredentialsError::PasswordWithoutUsername);
    }

    let Some(path) = netrc_path else {
        return Err(CredentialsError::NotEnoughData);
    };

    let host = server
        .host_str()
        .ok_or_else(|| CredentialsError::NoHost {
            server: server.to_string(),
        })?;

    tracing::debug!(%host, path = %path.display(), "retrieving credentials from netrc");

    let netrc = Netrc::from_file(path).await?;
    let entry = netrc
        .authenticators(host)
        .ok_or_else(|| CredentialsError::NoNetrcEntry {
            host: host.to_owned(),
            path: path.to_owned(),
        })?;

    if entry.login.trim().is_empty() {
        return Err(CredentialsError::EmptyNetrcEntry {
            host: host.to_owned(),
            path: path.to_owned(),
        });
    }

    Ok(Credentials {
        username: Username::new(entry.login.clone()),
        password: Password::new(entry.password.clone()),
    })
}

pub(crate) fn expand_home(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_owned(),
        },
        Err(_) => path.to_owned(),
    }
}
