//! A file-backed ticket store

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};

use super::TicketStore;
use crate::{error::GrantingTicketError, TicketGrantingTicket};

/// A ticket store that persists the ticket in a local file
///
/// The file holds exactly the ticket URL. Tickets persisted this way survive
/// restarts and can be shared by processes on the same filesystem.
#[derive(Debug)]
pub struct FileTicketStore {
    path: PathBuf,
}

impl FileTicketStore {
    /// Constructs a new file ticket store
    ///
    /// A leading `~` in `path` is expanded to the user's home directory.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: crate::credentials::expand_home(path),
        }
    }

    /// The location of the ticket file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> GrantingTicketError {
        GrantingTicketError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn ensure_parent_dir(&self) -> Result<(), GrantingTicketError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => return Ok(()),
        };

        if fs::metadata(parent).await.is_ok() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);

        #[cfg(unix)]
        builder.mode(0o700);

        builder.create(parent).await.map_err(|e| self.io_error(e))?;
        tracing::debug!(dir = %parent.display(), "created directory for ticket file");
        Ok(())
    }

    async fn read_ticket(&self) -> Result<Option<TicketGrantingTicket>, GrantingTicketError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no ticket file found");
                self.ensure_parent_dir().await?;
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let data = data.trim();
        if data.is_empty() {
            self.remove_file().await?;
            tracing::warn!(path = %self.path.display(), "removed empty ticket file");
            return Err(GrantingTicketError::EmptyFile {
                path: self.path.clone(),
            });
        }

        TicketGrantingTicket::parse(data).map(Some)
    }

    async fn write_ticket(&self, ticket: &TicketGrantingTicket) -> Result<(), GrantingTicketError> {
        use tokio::io::AsyncWriteExt;

        self.ensure_parent_dir().await?;
        self.remove_file().await?;

        let mut file_opts = OpenOptions::new();

        file_opts.create(true).truncate(true).write(true);

        #[cfg(unix)]
        file_opts.mode(0o600);

        let mut file = file_opts
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(ticket.as_str().as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        tracing::trace!(path = %self.path.display(), %ticket, "persisted ticket");
        Ok(())
    }

    async fn remove_file(&self) -> Result<(), GrantingTicketError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[async_trait]
impl TicketStore for FileTicketStore {
    async fn get(&mut self) -> Result<Option<TicketGrantingTicket>, GrantingTicketError> {
        self.read_ticket().await
    }

    async fn set(&mut self, ticket: &TicketGrantingTicket) -> Result<(), GrantingTicketError> {
        self.write_ticket(ticket).await
    }

    async fn clear(&mut self) -> Result<(), GrantingTicketError> {
        self.remove_file().await
    }
}
