//! Errors raised while authenticating against a CAS server

use std::{io, path::PathBuf};

use thiserror::Error;

/// The identity to log in with could not be determined
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// A password was supplied without a username
    #[error("provided password but not username")]
    PasswordWithoutUsername,
    /// Neither explicit credentials nor a netrc file were supplied
    #[error("not enough data to authenticate")]
    NotEnoughData,
    /// The server URL has no host to look up in the netrc file
    #[error("server URL '{server}' has no host to look up in the netrc file")]
    NoHost {
        /// The server URL
        server: String,
    },
    /// The netrc file could not be read
    #[error("unable to read netrc file at '{}'", .path.display())]
    NetrcRead {
        /// The netrc location
        path: PathBuf,
        /// The underlying I/O error
        source: io::Error,
    },
    /// The netrc file could not be parsed
    #[error("malformed netrc file at '{}': {reason}", .path.display())]
    NetrcSyntax {
        /// The netrc location
        path: PathBuf,
        /// What was wrong
        reason: String,
    },
    /// The netrc file has no entry for the host
    #[error("no credentials found for host '{host}' or 'default' in the netrc file at '{}'", .path.display())]
    NoNetrcEntry {
        /// The host that was looked up
        host: String,
        /// The netrc location
        path: PathBuf,
    },
    /// The netrc entry for the host has an empty login
    #[error("no valid credentials found for host '{host}' or 'default' in the netrc file at '{}'", .path.display())]
    EmptyNetrcEntry {
        /// The host that was looked up
        host: String,
        /// The netrc location
        path: PathBuf,
    },
}

/// A ticket-granting ticket could not be obtained, read, or stored
#[derive(Debug, Error)]
pub enum GrantingTicketError {
    /// The CAS server rejected the credentials
    #[error("could not authenticate with provided credentials")]
    BadCredentials,
    /// The CAS server answered with an unexpected status
    #[error("unable to obtain ticket-granting ticket from CAS server, HTTP status code: {status}")]
    UnexpectedStatus {
        /// The status code returned
        status: u16,
    },
    /// The CAS server did not return a `Location` header
    #[error("CAS server response did not include the ticket-granting ticket location")]
    MissingLocation,
    /// The ticket is not an absolute `http`/`https` URL
    #[error("ticket-granting ticket is malformed: {reason}")]
    MalformedTicket {
        /// What was wrong
        reason: String,
    },
    /// The persisted ticket file was empty
    #[error("TGT file at '{}' was empty and has been removed", .path.display())]
    EmptyFile {
        /// The ticket file location
        path: PathBuf,
    },
    /// The persisted ticket file could not be read or written
    #[error("unable to access TGT file at '{}'", .path.display())]
    Io {
        /// The ticket file location
        path: PathBuf,
        /// The underlying I/O error
        source: io::Error,
    },
    /// The request to the CAS server could not be sent
    #[error("error sending ticket-granting ticket request to CAS server")]
    RequestSend(#[source] reqwest::Error),
    /// The request to the CAS server did not complete before the deadline
    #[error("ticket-granting ticket request to CAS server timed out")]
    Timeout,
}

/// A service ticket could not be obtained
#[derive(Debug, Error)]
pub enum ServiceTicketError {
    /// The CAS server refused to issue a service ticket
    #[error("CAS server refused to issue a service ticket, HTTP status code: {status}")]
    Rejected {
        /// The status code returned
        status: u16,
    },
    /// The CAS server returned an empty service ticket
    #[error("CAS server returned an empty service ticket")]
    EmptyTicket,
    /// The service ticket is not usable as a header value
    #[error("service ticket contains characters not allowed in a header value")]
    InvalidHeaderValue,
    /// The request to the CAS server could not be sent
    #[error("error sending service ticket request to CAS server")]
    RequestSend(#[source] reqwest::Error),
    /// The response body could not be read
    #[error("error reading service ticket response body")]
    BodyRead(#[source] reqwest::Error),
    /// The request to the CAS server did not complete before the deadline
    #[error("service ticket request to CAS server timed out")]
    Timeout,
}

/// Authentication against the CAS server failed
///
/// Wraps the error from the stage that failed: resolving credentials,
/// obtaining a ticket-granting ticket, or exchanging it for a service ticket.
#[derive(Debug, Error)]
pub enum LoginError {
    /// A ticket-granting ticket had to be minted, but no credentials were given
    #[error("a new ticket-granting ticket is required, but no credentials are available")]
    NoCredentials,
    /// Credentials could not be resolved
    #[error("unable to resolve credentials: {0}")]
    Credentials(#[from] CredentialsError),
    /// A ticket-granting ticket could not be obtained
    #[error("unable to obtain ticket-granting ticket: {0}")]
    GrantingTicket(#[from] GrantingTicketError),
    /// A service ticket could not be obtained
    #[error("unable to obtain service ticket: {0}")]
    ServiceTicket(#[from] ServiceTicketError),
}

/// The CAS configuration is inconsistent
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// File storage was selected without a path
    #[error("TGT path must be set if volatile storage is not enabled")]
    MissingTicketPath,
    /// The initial ticket-granting ticket is malformed
    #[error("initial ticket-granting ticket is invalid")]
    InvalidInitialTicket(#[source] GrantingTicketError),
    /// The server URL cannot have paths appended to it
    #[error("server URL '{server}' cannot be used as a base URL")]
    InvalidServerUrl {
        /// The server URL
        server: String,
    },
    /// The HTTP client could not be built
    #[error("unable to construct HTTP client")]
    Client(#[source] reqwest::Error),
}
