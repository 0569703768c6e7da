//! Storage for ticket-granting tickets

use async_trait::async_trait;

use crate::{error::GrantingTicketError, TicketGrantingTicket};

pub mod file;
pub mod in_memory;

pub use file::FileTicketStore;
pub use in_memory::InMemoryTicketStore;

/// A holder for the current ticket-granting ticket
///
/// Stores are not synchronized themselves. The authenticator owning a store
/// serializes all access to it.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Reads the current ticket, if one is held
    async fn get(&mut self) -> Result<Option<TicketGrantingTicket>, GrantingTicketError>;

    /// Replaces the current ticket
    async fn set(&mut self, ticket: &TicketGrantingTicket) -> Result<(), GrantingTicketError>;

    /// Forgets the current ticket
    ///
    /// Clearing a store that holds no ticket is not an error.
    async fn clear(&mut self) -> Result<(), GrantingTicketError>;
}
