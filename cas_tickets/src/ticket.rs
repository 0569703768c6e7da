use std::{fmt, str::FromStr};

use url::Url;

use crate::error::GrantingTicketError;

/// A ticket-granting ticket issued by a CAS server
///
/// The ticket is the URL of the session resource created by the CAS server. It
/// is always an absolute `http` or `https` URL. Service tickets are requested by
/// posting to this URL.
///
/// The formatting implementations only reveal the scheme and authority, as the
/// path identifies an authenticated session.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TicketGrantingTicket {
    url: Url,
}

impl TicketGrantingTicket {
    /// Parses and validates a ticket-granting ticket
    pub fn parse(value: &str) -> Result<Self, GrantingTicketError> {
        let trimmed = value.trim();
        let url = Url::parse(trimmed).map_err(|source| GrantingTicketError::MalformedTicket {
            reason: source.to_string(),
        })?;

        Self::try_from(url)
    }

    /// The URL to which service ticket requests are sent
    #[inline]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The full ticket value, as persisted
    #[inline]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Consumes the ticket, returning the underlying URL
    pub fn into_url(self) -> Url {
        self.url
    }
}

impl TryFrom<Url> for TicketGrantingTicket {
    type Error = GrantingTicketError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(GrantingTicketError::MalformedTicket {
                    reason: format!("unsupported scheme '{}'", other),
                })
            }
        }

        if url.cannot_be_a_base() || !url.has_host() {
            return Err(GrantingTicketError::MalformedTicket {
                reason: "ticket is not an absolute URL".to_owned(),
            });
        }

        Ok(Self { url })
    }
}

impl FromStr for TicketGrantingTicket {
    type Err = GrantingTicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for TicketGrantingTicket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("TicketGrantingTicket")
            .field(&format_args!("{}", self))
            .finish()
    }
}

impl fmt::Display for TicketGrantingTicket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.url.scheme())?;
        f.write_str("://")?;
        f.write_str(self.url.host_str().unwrap_or_default())?;
        if let Some(port) = self.url.port() {
            write!(f, ":{}", port)?;
        }
        f.write_str("/***TGT***")
    }
}
