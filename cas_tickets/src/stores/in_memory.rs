//! An in-memory ticket store

use async_trait::async_trait;

use super::TicketStore;
use crate::{error::GrantingTicketError, TicketGrantingTicket};

/// A ticket store that keeps the ticket for the lifetime of the process
///
/// Nothing is shared between processes. To reuse a ticket across
/// authenticators, read it from one and hand it to the next with
/// [`with_ticket()`][Self::with_ticket()].
#[derive(Default, Debug)]
pub struct InMemoryTicketStore {
    ticket: Option<TicketGrantingTicket>,
}

impl InMemoryTicketStore {
    /// Constructs a new, empty in-memory ticket store
    pub const fn new() -> Self {
        Self { ticket: None }
    }

    /// Constructs a store that starts out with `ticket`
    pub fn with_ticket(ticket: TicketGrantingTicket) -> Self {
        Self {
            ticket: Some(ticket),
        }
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn get(&mut self) -> Result<Option<TicketGrantingTicket>, GrantingTicketError> {
        Ok(self.ticket.clone())
    }

    async fn set(&mut self, ticket: &TicketGrantingTicket) -> Result<(), GrantingTicketError> {
        self.ticket = Some(ticket.clone());
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), GrantingTicketError> {
        self.ticket = None;
        Ok(())
    }
}
