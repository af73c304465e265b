//! Transport error taxonomy.

use thiserror::Error;

use crate::PageId;

/// Failures raised by the message transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The other end of the channel is gone.
    #[error("message channel closed")]
    ChannelClosed,
    /// A response was addressed to a page the hub no longer knows.
    #[error("no page registered for {page_id}")]
    UnknownPage {
        /// Target page identifier.
        page_id: PageId,
    },
}

/// Convenience alias for transport results.
pub type TransportResult<T> = Result<T, TransportError>;
