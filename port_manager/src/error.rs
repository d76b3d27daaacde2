//! Port manager error types

use core_types::PortId;
use hub::HubError;
use thiserror::Error;

/// Errors returned by the port manager's management API
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagerError {
    /// A port with this id is already attached; the first one is untouched
    #[error("Port already attached: {0}")]
    DuplicateRegistration(PortId),

    /// Hub failure
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),
}
