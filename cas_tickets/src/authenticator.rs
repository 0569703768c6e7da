//! Signing requests with CAS service tickets

use std::{error, fmt, time::Duration};

use async_trait::async_trait;
use reqwest::header::{self, HeaderValue};
use tokio::{
    sync::{Mutex, MutexGuard},
    time::Instant,
};
use url::Url;

use crate::{
    cas::{within, CasClient, FormBody, JsonBody, RequestType},
    config::CasConfig,
    error::{ConfigurationError, GrantingTicketError, LoginError, ServiceTicketError},
    signer::RequestSigner,
    stores::{InMemoryTicketStore, TicketStore},
    CredentialSource, Credentials, ServiceName, ServiceTicket, TicketGrantingTicket,
};

/// How many times a rejected ticket-granting ticket is replaced while
/// obtaining a single service ticket
const MAX_TICKET_RENEWALS: usize = 1;

/// Everything that must change together when the ticket is replaced
struct TicketState {
    store: Box<dyn TicketStore>,
    source: Option<CredentialSource>,
    credentials: Option<Credentials>,
}

impl TicketState {
    async fn credentials(&mut self, server: &Url) -> Result<Credentials, LoginError> {
        if let Some(credentials) = &self.credentials {
            return Ok(credentials.clone());
        }

        let source = self.source.as_ref().ok_or(LoginError::NoCredentials)?;
        let credentials = source.resolve(server).await?;
        self.credentials = Some(credentials.clone());
        Ok(credentials)
    }
}

/// Authenticates requests against a CAS-protected service
///
/// A ticket-granting ticket is kept in a [`TicketStore`] and exchanged for a
/// fresh service ticket every time a request is signed. When the CAS server
/// no longer accepts the ticket-granting ticket, a new one is minted with the
/// credentials given at [`login()`][Self::login()] and the exchange is retried
/// once.
///
/// The authenticator can be shared between tasks. Reading, minting, and
/// replacing the ticket-granting ticket happen under a single lock, so
/// concurrent callers that find the ticket missing or stale wait for one
/// renewal rather than each minting their own.
pub struct CasAuthenticator<T = FormBody> {
    cas: CasClient<T>,
    state: Mutex<TicketState>,
    timeout: Option<Duration>,
}

impl CasAuthenticator<FormBody> {
    /// Constructs a new authenticator for `service` on the CAS server at `server`
    ///
    /// The ticket-granting ticket is kept in memory until a different store is
    /// provided with [`with_store()`][Self::with_store()].
    pub fn new(server: Url, service: impl Into<ServiceName>) -> Self {
        Self {
            cas: CasClient::new(reqwest::Client::new(), server, service.into()),
            state: Mutex::new(TicketState {
                store: Box::new(InMemoryTicketStore::new()),
                source: None,
                credentials: None,
            }),
            timeout: None,
        }
    }

    /// Constructs an authenticator from configuration
    ///
    /// The storage backend and the HTTP client, including certificate
    /// verification and timeouts, are built from `config`.
    pub fn from_config(config: &CasConfig) -> Result<Self, ConfigurationError> {
        let server = config.server_url()?;
        let storage = config.storage()?;
        let client = config.http_client()?;

        let mut authenticator = Self::new(server, config.service_name.clone())
            .with_ticket_path(&config.ticket_path)
            .with_client(client);
        authenticator.state.get_mut().store = storage.into_store();
        authenticator.timeout = config.request_timeout();

        Ok(authenticator)
    }

    /// Configures the authenticator to send payloads to the CAS server as JSON
    pub fn using_json(self) -> CasAuthenticator<JsonBody> {
        CasAuthenticator {
            cas: self.cas.using_json(),
            state: self.state,
            timeout: self.timeout,
        }
    }
}

impl<T> CasAuthenticator<T> {
    /// Sets the path of the ticket-creation endpoint from its segments
    ///
    /// Defaults to `v1/tickets`.
    pub fn with_ticket_path<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cas = self.cas.with_ticket_path(segments);
        self
    }

    /// Sets the HTTP client used to talk to the CAS server
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.cas = self.cas.with_client(client);
        self
    }

    /// Sets the store that holds the ticket-granting ticket
    pub fn with_store(mut self, store: impl TicketStore + 'static) -> Self {
        self.state.get_mut().store = Box::new(store);
        self
    }

    /// Sets where credentials come from, without contacting the CAS server
    pub fn with_credentials(mut self, source: CredentialSource) -> Self {
        let state = self.state.get_mut();
        state.source = Some(source);
        state.credentials = None;
        self
    }

    /// Bounds each call to the CAS server made while signing a request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The CAS server URL
    pub fn server(&self) -> &Url {
        self.cas.server()
    }

    /// The service name that service tickets are requested for
    pub fn service(&self) -> &ServiceName {
        self.cas.service()
    }

    /// The ticket-granting ticket currently held, if any
    ///
    /// Useful for handing a ticket from an in-memory store to another
    /// authenticator.
    pub async fn ticket_granting_ticket(
        &self,
    ) -> Result<Option<TicketGrantingTicket>, GrantingTicketError> {
        self.state.lock().await.store.get().await
    }

    /// Forgets the ticket-granting ticket, forcing the next request to mint a new one
    pub async fn clear_ticket_granting_ticket(&self) -> Result<(), GrantingTicketError> {
        self.state.lock().await.store.clear().await
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| Instant::now() + timeout)
    }

    /// Waits for the ticket state, giving up at `deadline`
    async fn lock_state(
        &self,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'_, TicketState>, GrantingTicketError> {
        within(deadline, self.state.lock())
            .await
            .ok_or(GrantingTicketError::Timeout)
    }
}

impl<T: RequestType> CasAuthenticator<T> {
    /// Logs in with credentials from `source`
    ///
    /// The credentials are kept for the lifetime of the authenticator and used
    /// whenever a new ticket-granting ticket is needed. A service ticket is
    /// requested to verify the session. If the store already holds a ticket
    /// that the CAS server accepts, the credentials are not resolved or
    /// checked until that ticket is rejected.
    #[tracing::instrument(err, skip_all, fields(server = %self.server(), service = %self.service()))]
    pub async fn login(&self, source: CredentialSource) -> Result<(), LoginError> {
        let deadline = self.deadline();
        {
            let mut state = self.lock_state(deadline).await?;
            state.source = Some(source);
            state.credentials = None;
        }

        self.service_ticket_before(deadline).await?;

        tracing::info!("logged in to CAS server");
        Ok(())
    }

    /// Obtains a fresh service ticket
    pub async fn service_ticket(&self) -> Result<ServiceTicket, LoginError> {
        self.service_ticket_before(self.deadline()).await
    }

    /// Sets the `Authorization` header of `request` to a fresh service ticket
    ///
    /// Any existing `Authorization` header is replaced. Nothing else about the
    /// request is changed.
    pub async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request, LoginError> {
        self.sign_before(request, self.deadline()).await
    }

    /// Signs `request`, giving up on the CAS server at `deadline`
    pub async fn sign_until(
        &self,
        request: reqwest::Request,
        deadline: Instant,
    ) -> Result<reqwest::Request, LoginError> {
        self.sign_before(request, Some(deadline)).await
    }

    /// Obtains a fresh service ticket as an `Authorization` header value
    pub async fn authorization(&self) -> Result<HeaderValue, LoginError> {
        self.authorization_before(self.deadline()).await
    }

    async fn sign_before(
        &self,
        mut request: reqwest::Request,
        deadline: Option<Instant>,
    ) -> Result<reqwest::Request, LoginError> {
        let value = self.authorization_before(deadline).await?;
        request.headers_mut().insert(header::AUTHORIZATION, value);
        Ok(request)
    }

    async fn authorization_before(
        &self,
        deadline: Option<Instant>,
    ) -> Result<HeaderValue, LoginError> {
        let service_ticket = self.service_ticket_before(deadline).await?;

        let mut value = HeaderValue::try_from(format!("CAS {}", service_ticket.as_str()))
            .map_err(|_| ServiceTicketError::InvalidHeaderValue)?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn service_ticket_before(
        &self,
        deadline: Option<Instant>,
    ) -> Result<ServiceTicket, LoginError> {
        let mut ticket = self.current_ticket(deadline).await?;
        let mut renewals = 0;

        loop {
            match self.cas.request_service_ticket(&ticket, deadline).await {
                Ok(service_ticket) => {
                    tracing::trace!(%service_ticket, "obtained service ticket");
                    return Ok(service_ticket);
                }
                Err(error) if renewals < MAX_TICKET_RENEWALS => {
                    tracing::debug!(
                        error = (&error as &dyn error::Error),
                        "ticket-granting ticket rejected, renewing"
                    );
                    renewals += 1;
                    ticket = self.renew_ticket(&ticket, deadline).await?;
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Reads the stored ticket, minting one if the store is empty
    async fn current_ticket(
        &self,
        deadline: Option<Instant>,
    ) -> Result<TicketGrantingTicket, LoginError> {
        let mut state = self.lock_state(deadline).await?;

        match state.store.get().await {
            Ok(Some(ticket)) => return Ok(ticket),
            Ok(None) => {
                tracing::debug!("no ticket-granting ticket stored, minting a new one");
            }
            Err(error @ GrantingTicketError::EmptyFile { .. }) => {
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    "stored ticket-granting ticket was unusable, minting a new one"
                );
            }
            Err(error) => return Err(error.into()),
        }

        self.mint_ticket(&mut state, deadline).await
    }

    /// Replaces `stale` with a new ticket
    ///
    /// If another caller has already replaced `stale` while this one waited
    /// for the lock, that ticket is used instead of minting another.
    async fn renew_ticket(
        &self,
        stale: &TicketGrantingTicket,
        deadline: Option<Instant>,
    ) -> Result<TicketGrantingTicket, LoginError> {
        let mut state = self.lock_state(deadline).await?;

        match state.store.get().await {
            Ok(Some(current)) if current != *stale => {
                tracing::debug!("ticket-granting ticket was already renewed");
                return Ok(current);
            }
            Ok(_) => {}
            Err(error @ GrantingTicketError::EmptyFile { .. }) => {
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    "stored ticket-granting ticket was unusable while renewing"
                );
            }
            Err(error) => return Err(error.into()),
        }

        state.store.clear().await?;
        self.mint_ticket(&mut state, deadline).await
    }

    async fn mint_ticket(
        &self,
        state: &mut TicketState,
        deadline: Option<Instant>,
    ) -> Result<TicketGrantingTicket, LoginError> {
        let credentials = state.credentials(self.cas.server()).await?;
        let ticket = self
            .cas
            .mint_ticket_granting_ticket(&credentials, deadline)
            .await?;
        state.store.set(&ticket).await?;
        Ok(ticket)
    }
}

#[async_trait]
impl<T: RequestType + 'static> RequestSigner for CasAuthenticator<T> {
    type Error = LoginError;

    async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request, Self::Error> {
        CasAuthenticator::sign(self, request).await
    }
}

impl<T> fmt::Debug for CasAuthenticator<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CasAuthenticator")
            .field("server", &self.cas.server().as_str())
            .field("service", &self.cas.service())
            .field("ticket_url", &self.cas.ticket_url())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
