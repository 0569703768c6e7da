//! Payloads posted to the CAS REST protocol endpoints

use serde::Serialize;

use crate::{Credentials, PasswordRef, ServiceNameRef, UsernameRef};

/// Request body for creating a ticket-granting ticket
#[derive(Debug, Serialize)]
pub(crate) struct TicketGrantingTicketRequest<'a> {
    pub username: &'a UsernameRef,
    pub password: &'a PasswordRef,
}

impl<'a> From<&'a Credentials> for TicketGrantingTicketRequest<'a> {
    fn from(credentials: &'a Credentials) -> Self {
        Self {
            username: &credentials.username,
            password: &credentials.password,
        }
    }
}

/// Request body for exchanging a ticket-granting ticket for a service ticket
#[derive(Debug, Serialize)]
pub(crate) struct ServiceTicketRequest<'a> {
    pub service: &'a ServiceNameRef,
}
