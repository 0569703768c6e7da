//! Ticket management for clients of services protected by a Central
//! Authentication Service (CAS)
//!
//! A CAS server authenticates a user once, issuing a _ticket-granting ticket_
//! (TGT). The TGT is then exchanged for a single-use _service ticket_ (ST)
//! each time a request is made to a protected service, and the service ticket
//! is presented to the service in the `Authorization` header.
//!
//! This crate keeps the TGT in a [`TicketStore`][stores::TicketStore], either
//! on disk so that it survives restarts, or in memory. Every request signed by
//! a [`CasAuthenticator`] receives a freshly issued service ticket. When the
//! CAS server stops accepting the TGT, a new one is minted with the credentials
//! given at login, and the exchange is retried exactly once before giving up.
//!
//! Renewal is entirely reactive. No background task watches the ticket; it is
//! replaced when a request finds it rejected.
//!
//! # Logging in
//!
//! Credentials can be given explicitly or read from a netrc file, keyed by the
//! host of the CAS server. An explicit username always takes precedence.
//!
//! ```
//! use cas_tickets::{stores::FileTicketStore, CasAuthenticator, CredentialSource};
//!
//! # struct Opts {
//! #     cas_url: url::Url,
//! #     ticket_file: std::path::PathBuf,
//! # }
//! #
//! # let opts = Opts {
//! #     cas_url: url::Url::parse("https://cas.example.com/cas").unwrap(),
//! #     ticket_file: std::path::PathBuf::from(".cas/tgt"),
//! # };
//! #
//! let authenticator = CasAuthenticator::new(opts.cas_url, "https://api.example.com/")
//!     .with_store(FileTicketStore::new(opts.ticket_file));
//!
//! let credentials = CredentialSource::default_netrc();
//! # async move {
//! authenticator.login(credentials).await?;
//!
//! let request = reqwest::Request::new(
//!     reqwest::Method::GET,
//!     "https://api.example.com/items".parse()?,
//! );
//! let request = authenticator.sign(request).await?;
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! # };
//! ```
//!
//! For `reqwest` clients, the `cas_reqwest` crate provides a middleware that
//! signs every outgoing request.
//!
//! # Configuration
//!
//! A [`CasConfig`] can be deserialized from the client's configuration and
//! turned into an authenticator with [`CasAuthenticator::from_config()`]. The
//! storage backend is chosen by the `tgt_volatile_storage` setting.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authenticator;
mod braids;
pub mod cas;
pub mod config;
pub mod credentials;
pub mod error;
pub mod netrc;
mod signer;
pub mod stores;
mod ticket;

pub use authenticator::CasAuthenticator;
pub use braids::*;
pub use config::{CasConfig, TicketStorage};
pub use credentials::{CredentialSource, Credentials};
pub use error::{
    ConfigurationError, CredentialsError, GrantingTicketError, LoginError, ServiceTicketError,
};
pub use signer::RequestSigner;
pub use ticket::TicketGrantingTicket;
