//! Configuration for authenticating against a CAS server

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::{
    credentials::expand_home,
    error::ConfigurationError,
    stores::{FileTicketStore, InMemoryTicketStore, TicketStore},
    ServiceName, TicketGrantingTicket,
};

/// CAS settings, as provided by the client configuration
///
/// ```
/// use cas_tickets::CasConfig;
///
/// let config: CasConfig = serde_json::from_str(r#"{
///     "server_url": "https://cas.example.com/cas",
///     "service_name": "https://api.example.com/",
///     "granting_ticket_filepath": "~/.cas/tgt"
/// }"#).unwrap();
///
/// assert!(config.verify_ssl);
/// assert_eq!(config.ticket_path, ["v1", "tickets"]);
/// ```
#[derive(Clone, Debug, Deserialize)]
pub struct CasConfig {
    /// The base URL of the CAS server
    pub server_url: Url,

    /// The service name registered with the CAS server
    pub service_name: ServiceName,

    /// Segments of the ticket-creation path, relative to `server_url`
    #[serde(default = "default_ticket_path")]
    pub ticket_path: Vec<String>,

    /// Whether certificates presented by the CAS server are verified
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,

    /// Where the ticket-granting ticket is persisted
    #[serde(default)]
    pub granting_ticket_filepath: Option<PathBuf>,

    /// Keep the ticket-granting ticket in memory instead of on disk
    #[serde(default)]
    pub tgt_volatile_storage: bool,

    /// A ticket-granting ticket to start with when using volatile storage
    #[serde(default)]
    pub ticket_granting_ticket: Option<String>,

    /// Upper bound, in seconds, on each call made to the CAS server
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_ticket_path() -> Vec<String> {
    vec!["v1".to_owned(), "tickets".to_owned()]
}

const fn default_verify_ssl() -> bool {
    true
}

/// Where the ticket-granting ticket is kept
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TicketStorage {
    /// In a file at the given path
    File(PathBuf),
    /// In memory, optionally starting with a ticket
    Volatile(Option<TicketGrantingTicket>),
}

impl TicketStorage {
    /// Constructs the store for this storage location
    pub fn into_store(self) -> Box<dyn TicketStore> {
        match self {
            Self::File(path) => Box::new(FileTicketStore::new(path)),
            Self::Volatile(Some(ticket)) => Box::new(InMemoryTicketStore::with_ticket(ticket)),
            Self::Volatile(None) => Box::new(InMemoryTicketStore::new()),
        }
    }
}

impl CasConfig {
    /// Constructs a configuration with default settings and file storage at
    /// `granting_ticket_filepath`
    pub fn new(
        server_url: Url,
        service_name: impl Into<ServiceName>,
        granting_ticket_filepath: impl Into<PathBuf>,
    ) -> Self {
        Self {
            server_url,
            service_name: service_name.into(),
            ticket_path: default_ticket_path(),
            verify_ssl: default_verify_ssl(),
            granting_ticket_filepath: Some(granting_ticket_filepath.into()),
            tgt_volatile_storage: false,
            ticket_granting_ticket: None,
            request_timeout_secs: None,
        }
    }

    /// The validated server URL
    pub fn server_url(&self) -> Result<Url, ConfigurationError> {
        if self.server_url.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidServerUrl {
                server: self.server_url.to_string(),
            });
        }

        Ok(self.server_url.clone())
    }

    /// Selects the storage location for the ticket-granting ticket
    pub fn storage(&self) -> Result<TicketStorage, ConfigurationError> {
        if self.tgt_volatile_storage {
            let ticket = self
                .ticket_granting_ticket
                .as_deref()
                .map(TicketGrantingTicket::parse)
                .transpose()
                .map_err(ConfigurationError::InvalidInitialTicket)?;
            return Ok(TicketStorage::Volatile(ticket));
        }

        match &self.granting_ticket_filepath {
            Some(path) if !path.as_os_str().is_empty() => Ok(TicketStorage::File(expand_home(path))),
            _ => Err(ConfigurationError::MissingTicketPath),
        }
    }

    /// The upper bound on each call made to the CAS server, if any
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Builds the HTTP client used to talk to the CAS server
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigurationError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("cas_tickets/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!self.verify_ssl);

        if let Some(timeout) = self.request_timeout() {
            builder = builder.timeout(timeout);
        }

        if !self.verify_ssl {
            tracing::warn!(server = %self.server_url, "certificate verification for CAS server is disabled");
        }

        builder.build().map_err(ConfigurationError::Client)
    }
}
