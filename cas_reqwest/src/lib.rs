//! Middleware to automatically attach CAS service tickets to outgoing requests
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include the [`CasAuthMiddleware`] in the middleware stack to obtain a fresh
//! service ticket from a [`CasAuthenticator`] for each outbound request.
//!
//! If a request already has specified an `Authorization` header value by
//! the time that the middleware executes, the existing value will be left
//! in place, allowing overrides to be specified as required.
//!
//! ```
//! use std::sync::Arc;
//!
//! use cas_reqwest::CasAuthMiddleware;
//! use cas_tickets::{CasAuthenticator, CredentialSource};
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() {
//! let authenticator = CasAuthenticator::new(
//!     "https://cas.example.com/cas".parse().unwrap(),
//!     "https://api.example.com/",
//! )
//! .with_credentials(CredentialSource::default_netrc());
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(CasAuthMiddleware::new(Arc::new(authenticator)))
//!     .build();
//!
//! let req = client
//!     .get("https://api.example.com/items");
//! # async move { req
//!     .send()
//!     .await
//!     .unwrap();
//! # };
//! # }
//! ```
//!
//! Every request is signed by default. The middleware can also be configured
//! to add a service ticket only conditionally. This can be useful in the event
//! that you want to use a single common middleware stack with multiple
//! potential backends and want to ensure that service tickets are only sent to
//! the protected service.
//!
//! These predicates can be composed together to evaluate more complex
//! requirements prior to attaching a ticket to a request.
//!
//! ```
//! use std::sync::Arc;
//!
//! use cas_reqwest::{CasAuthMiddleware, ExactHostMatch, HttpsOnly};
//! use cas_tickets::CasAuthenticator;
//! use predicates::prelude::PredicateBooleanExt;
//!
//! # let authenticator = CasAuthenticator::new(
//! #     "https://cas.example.com/cas".parse().unwrap(),
//! #     "https://api.example.com/",
//! # );
//! let service_host = ExactHostMatch::for_service(authenticator.service()).unwrap();
//! CasAuthMiddleware::new(Arc::new(authenticator))
//!     .with_predicate(HttpsOnly.and(service_host));
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{fmt, sync::Arc};

use cas_tickets::{CasAuthenticator, RequestSigner, ServiceNameRef};
use predicates::{constant::BooleanPredicate, prelude::*, reflection};
use reqwest::{header, Request, Response, Url};
use reqwest_middleware::{Error, Middleware, Next, Result};

/// A middleware that signs outgoing requests with a CAS service ticket
#[derive(Debug)]
pub struct CasAuthMiddleware<P, S = CasAuthenticator> {
    signer: Arc<S>,
    predicate: P,
}

impl<P: Clone, S> Clone for CasAuthMiddleware<P, S> {
    fn clone(&self) -> Self {
        Self {
            signer: self.signer.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<S> CasAuthMiddleware<BooleanPredicate, S> {
    /// Construct a new middleware from a shared signer
    ///
    /// By default, this middleware signs every request, whatever its scheme
    /// or host. To restrict signing, for example with [`HttpsOnly`] or
    /// [`ExactHostMatch`], provide a custom predicate with
    /// [`with_predicate()`][Self::with_predicate()].
    pub fn new(signer: Arc<S>) -> Self {
        Self {
            signer,
            predicate: predicate::always(),
        }
    }

    /// Replaces the default predicate with a custom predicate
    pub fn with_predicate<P>(self, predicate: P) -> CasAuthMiddleware<P, S> {
        CasAuthMiddleware {
            signer: self.signer,
            predicate,
        }
    }
}

#[async_trait::async_trait]
impl<P, S> Middleware for CasAuthMiddleware<P, S>
where
    P: Predicate<Request> + Send + Sync + 'static,
    S: RequestSigner + 'static,
{
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let req = if self.predicate.eval(&req) && !req.headers().contains_key(header::AUTHORIZATION)
        {
            tracing::trace!(url = %req.url(), "signing request with service ticket");
            self.signer.sign(req).await.map_err(Error::middleware)?
        } else {
            req
        };

        next.run(req, extensions).await
    }
}

/// Only attach a service ticket if the request is being sent over HTTPS
#[derive(Clone, Copy, Debug)]
pub struct HttpsOnly;

impl Predicate<Request> for HttpsOnly {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        req.url().scheme() == "https"
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "scheme",
                    req.url().scheme().to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for HttpsOnly {}
impl fmt::Display for HttpsOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scheme is https")
    }
}

/// Only attach a service ticket if the request is being sent to the exact host specified
#[derive(Clone, Debug)]
pub struct ExactHostMatch {
    host: String,
}

impl ExactHostMatch {
    /// Construct a new predicate from a host string
    pub fn new<S>(host: S) -> Self
    where
        S: ToString,
    {
        Self {
            host: host.to_string(),
        }
    }

    /// Construct a predicate matching the host of a CAS service name
    ///
    /// CAS services are usually registered under the URL of the protected
    /// application. Returns `None` if `service` is not a URL with a host.
    pub fn for_service(service: &ServiceNameRef) -> Option<Self> {
        let url = Url::parse(service.as_str()).ok()?;
        url.host_str().map(Self::new)
    }
}

impl Predicate<Request> for ExactHostMatch {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        req.url().host_str() == Some(&self.host)
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "host",
                    req.url()
                        .host_str()
                        .unwrap_or("<value not valid utf-8>")
                        .to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for ExactHostMatch {}
impl fmt::Display for ExactHostMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("host == ")?;
        f.write_str(&self.host)
    }
}
