//! The CAS REST protocol: minting ticket-granting tickets and exchanging them
//! for service tickets

use std::{future::Future, marker::PhantomData};

use reqwest::{header, StatusCode};
use tokio::time::Instant;
use url::Url;

use crate::{
    error::{GrantingTicketError, ServiceTicketError},
    Credentials, ServiceName, ServiceTicket, TicketGrantingTicket,
};

pub(crate) mod dto;

/// The default path of the ticket-creation endpoint, relative to the server URL
pub const DEFAULT_TICKET_PATH: &str = "v1/tickets";

/// A client for the ticket endpoints of a CAS server
#[derive(Debug)]
pub struct CasClient<T = FormBody> {
    client: reqwest::Client,
    server: Url,
    ticket_path: String,
    service: ServiceName,
    content_type: PhantomData<fn() -> T>,
}

impl CasClient<FormBody> {
    /// Constructs a new CAS client
    ///
    /// Credentials and service names are sent to the server as form data,
    /// as the CAS REST protocol expects.
    pub fn new(client: reqwest::Client, server: Url, service: ServiceName) -> Self {
        Self {
            client,
            server,
            ticket_path: DEFAULT_TICKET_PATH.to_owned(),
            service,
            content_type: PhantomData,
        }
    }

    /// Configures the client to send payloads to the server as JSON
    pub fn using_json(self) -> CasClient<JsonBody> {
        CasClient {
            client: self.client,
            server: self.server,
            ticket_path: self.ticket_path,
            service: self.service,
            content_type: PhantomData,
        }
    }
}

impl<T> CasClient<T> {
    /// Sets the path of the ticket-creation endpoint from its segments
    pub fn with_ticket_path<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ticket_path = segments
            .into_iter()
            .map(|s| s.as_ref().trim_matches('/').to_owned())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        self
    }

    /// Replaces the underlying HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The CAS server URL
    pub fn server(&self) -> &Url {
        &self.server
    }

    /// The service name that service tickets are requested for
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// The URL of the ticket-creation endpoint
    pub fn ticket_url(&self) -> String {
        format!(
            "{}/{}",
            self.server.as_str().trim_end_matches('/'),
            self.ticket_path
        )
    }
}

impl<T: RequestType> CasClient<T> {
    /// Creates a new ticket-granting ticket by logging in with `credentials`
    ///
    /// CAS servers never renew a ticket in place, so each call produces a
    /// fresh ticket.
    #[tracing::instrument(
        err,
        skip(self, credentials, deadline),
        fields(
            ticket_url = %self.ticket_url(),
            credentials.username = %credentials.username,
        ),
    )]
    pub async fn mint_ticket_granting_ticket(
        &self,
        credentials: &Credentials,
        deadline: Option<Instant>,
    ) -> Result<TicketGrantingTicket, GrantingTicketError> {
        tracing::trace!("requesting ticket-granting ticket from CAS server");

        let payload = dto::TicketGrantingTicketRequest::from(credentials);
        let req = T::attach_payload(self.client.post(self.ticket_url()), &payload);
        let resp = within(deadline, req.send())
            .await
            .ok_or(GrantingTicketError::Timeout)?
            .map_err(GrantingTicketError::RequestSend)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            "received ticket-granting ticket response from CAS server"
        );

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GrantingTicketError::BadCredentials);
        } else if !status.is_success() {
            return Err(GrantingTicketError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let location = resp
            .headers()
            .get(header::LOCATION)
            .ok_or(GrantingTicketError::MissingLocation)?
            .to_str()
            .map_err(|_| GrantingTicketError::MalformedTicket {
                reason: "location header is not valid text".to_owned(),
            })?;

        let ticket = TicketGrantingTicket::parse(location)?;

        tracing::info!(%ticket, "received new ticket-granting ticket");

        Ok(ticket)
    }

    /// Exchanges a ticket-granting ticket for a single-use service ticket
    ///
    /// Any response other than a success indicates that the ticket-granting
    /// ticket is no longer accepted.
    #[tracing::instrument(
        err,
        skip(self, ticket, deadline),
        fields(
            ticket = %ticket,
            service = %self.service,
        ),
    )]
    pub async fn request_service_ticket(
        &self,
        ticket: &TicketGrantingTicket,
        deadline: Option<Instant>,
    ) -> Result<ServiceTicket, ServiceTicketError> {
        tracing::trace!("requesting service ticket from CAS server");

        let payload = dto::ServiceTicketRequest {
            service: &self.service,
        };
        let req = T::attach_payload(self.client.post(ticket.url().clone()), &payload);
        let resp = within(deadline, req.send())
            .await
            .ok_or(ServiceTicketError::Timeout)?
            .map_err(ServiceTicketError::RequestSend)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            "received service ticket response from CAS server"
        );

        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceTicketError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = within(deadline, resp.text())
            .await
            .ok_or(ServiceTicketError::Timeout)?
            .map_err(ServiceTicketError::BodyRead)?;

        let body = body.trim();
        if body.is_empty() {
            return Err(ServiceTicketError::EmptyTicket);
        }

        Ok(ServiceTicket::new(body.to_owned()))
    }
}

pub(crate) async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// A manner of attaching a serializable payload to a request
pub trait RequestType {
    /// Attaches the serializable payload to the request body
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder;
}

/// Attaches payloads to the request body as JSON
#[derive(Debug)]
pub struct JsonBody;

/// Attaches payloads to the request body as URL-encoded form data
#[derive(Debug)]
pub struct FormBody;

impl RequestType for JsonBody {
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.json(payload)
    }
}

impl RequestType for FormBody {
    fn attach_payload<S: serde::Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.form(payload)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::{
        matchers::{body_json, body_string, header as has_header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{Password, Username};

    fn credentials() -> Credentials {
        Credentials {
            username: Username::from_static("jdoe"),
            password: Password::from_static("s3cret"),
        }
    }

    fn client(server: &MockServer) -> CasClient {
        CasClient::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            ServiceName::from_static("my-service"),
        )
    }

    #[test]
    fn ticket_path_segments_are_joined() {
        let client = CasClient::new(
            reqwest::Client::new(),
            Url::parse("https://cas.example/cas/").unwrap(),
            ServiceName::from_static("svc"),
        )
        .with_ticket_path(["v1", "/tickets/"]);

        assert_eq!(client.ticket_url(), "https://cas.example/cas/v1/tickets");
    }

    #[test]
    fn default_ticket_path_is_the_rest_endpoint() {
        let client = CasClient::new(
            reqwest::Client::new(),
            Url::parse("https://cas.example").unwrap(),
            ServiceName::from_static("svc"),
        );

        assert_eq!(client.ticket_url(), "https://cas.example/v1/tickets");
    }

    mod minting_a_ticket_granting_ticket {
        use super::*;

        #[tokio::test]
        async fn returns_the_location_header() {
            let server = MockServer::start().await;
            let tgt_url = format!("{}/v1/tickets/TGT-1", server.uri());

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .and(has_header("content-type", "application/x-www-form-urlencoded"))
                .and(body_string("username=jdoe&password=s3cret"))
                .respond_with(ResponseTemplate::new(201).insert_header("Location", tgt_url.as_str()))
                .expect(1)
                .mount(&server)
                .await;

            let tgt = client(&server)
                .mint_ticket_granting_ticket(&credentials(), None)
                .await
                .unwrap();

            assert_eq!(tgt.as_str(), tgt_url);
        }

        #[tokio::test]
        async fn sends_json_when_configured() {
            let server = MockServer::start().await;
            let tgt_url = format!("{}/v1/tickets/TGT-1", server.uri());

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .and(body_json(serde_json::json!({
                    "username": "jdoe",
                    "password": "s3cret",
                })))
                .respond_with(ResponseTemplate::new(201).insert_header("Location", tgt_url.as_str()))
                .expect(1)
                .mount(&server)
                .await;

            let tgt = client(&server)
                .using_json()
                .mint_ticket_granting_ticket(&credentials(), None)
                .await
                .unwrap();

            assert_eq!(tgt.as_str(), tgt_url);
        }

        #[tokio::test]
        async fn unauthorized_means_bad_credentials() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;

            let err = client(&server)
                .mint_ticket_granting_ticket(&credentials(), None)
                .await
                .unwrap_err();

            assert!(matches!(err, GrantingTicketError::BadCredentials));
            assert_eq!(
                err.to_string(),
                "could not authenticate with provided credentials"
            );
        }

        #[tokio::test]
        async fn other_failures_carry_the_status_code() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let err = client(&server)
                .mint_ticket_granting_ticket(&credentials(), None)
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                GrantingTicketError::UnexpectedStatus { status: 503 }
            ));
            assert!(err.to_string().contains("503"));
        }

        #[tokio::test]
        async fn missing_location_is_fatal() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .respond_with(ResponseTemplate::new(201))
                .mount(&server)
                .await;

            let err = client(&server)
                .mint_ticket_granting_ticket(&credentials(), None)
                .await
                .unwrap_err();

            assert!(matches!(err, GrantingTicketError::MissingLocation));
        }

        #[tokio::test]
        async fn relative_location_is_fatal() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .respond_with(ResponseTemplate::new(201).insert_header("Location", "/v1/tickets/TGT-1"))
                .mount(&server)
                .await;

            let err = client(&server)
                .mint_ticket_granting_ticket(&credentials(), None)
                .await
                .unwrap_err();

            assert!(matches!(err, GrantingTicketError::MalformedTicket { .. }));
        }

        #[tokio::test]
        async fn slow_server_hits_the_deadline() {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/v1/tickets"))
                .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(5)))
                .mount(&server)
                .await;

            let deadline = Instant::now() + Duration::from_millis(100);
            let err = client(&server)
                .mint_ticket_granting_ticket(&credentials(), Some(deadline))
                .await
                .unwrap_err();

            assert!(matches!(err, GrantingTicketError::Timeout));
        }
    }

    mod requesting_a_service_ticket {
        use super::*;

        #[tokio::test]
        async fn returns_the_response_body() {
            let server = MockServer::start().await;
            let tgt =
                TicketGrantingTicket::parse(&format!("{}/v1/tickets/TGT-1", server.uri())).unwrap();

            Mock::given(method("POST"))
                .and(path("/v1/tickets/TGT-1"))
                .and(body_string("service=my-service"))
                .respond_with(ResponseTemplate::new(200).set_body_string("ST-42\n"))
                .expect(1)
                .mount(&server)
                .await;

            let st = client(&server)
                .request_service_ticket(&tgt, None)
                .await
                .unwrap();

            assert_eq!(st.as_str(), "ST-42");
        }

        #[tokio::test]
        async fn non_success_is_a_rejection() {
            let server = MockServer::start().await;
            let tgt =
                TicketGrantingTicket::parse(&format!("{}/v1/tickets/TGT-1", server.uri())).unwrap();

            Mock::given(method("POST"))
                .and(path("/v1/tickets/TGT-1"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let err = client(&server)
                .request_service_ticket(&tgt, None)
                .await
                .unwrap_err();

            assert!(matches!(err, ServiceTicketError::Rejected { status: 404 }));
        }

        #[tokio::test]
        async fn empty_body_is_an_error() {
            let server = MockServer::start().await;
            let tgt =
                TicketGrantingTicket::parse(&format!("{}/v1/tickets/TGT-1", server.uri())).unwrap();

            Mock::given(method("POST"))
                .and(path("/v1/tickets/TGT-1"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let err = client(&server)
                .request_service_ticket(&tgt, None)
                .await
                .unwrap_err();

            assert!(matches!(err, ServiceTicketError::EmptyTicket));
        }
    }
}
