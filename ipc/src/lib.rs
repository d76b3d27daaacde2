//! # Inter-Port Communication (IPC)
//!
//! This crate defines the message-passing primitives shared by the hub, the
//! port manager and every port.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: Ports exchange values, never references
//!   into each other's state
//! - **Origins are stamped, not claimed**: The `source` of a message is set by
//!   the router that delivers it
//! - **Typed control plane**: Capability requests and responses are a closed set
//!   of variants, dispatched by name through an explicit table
//! - **Opaque payloads**: Application data is a structured `serde_json::Value`
//!   the core never interprets
//!
//! ## Architecture
//!
//! - [`Message`] / [`MessageBody`]: the unit the hub delivers
//! - [`ControlRequest`] / [`ControlResponse`]: the control-flow schema
//! - [`CapabilityHandle`]: a type-erased grant a module downcasts to the
//!   interface it asked for
//! - [`Emitter`] / [`EventEmitter`]: the listener registry every port and
//!   channel endpoint composes

pub mod capability;
pub mod channel;
pub mod emitter;
pub mod message;
pub mod typed;

pub use capability::{Capability, CapabilityHandle};
pub use channel::{ChannelIdentifier, ChannelSide};
pub use emitter::{Emitter, EventEmitter, ListenerId};
pub use message::{
    Diagnostic, LogLevel, Message, MessageBody, MessageId, SharedConfig, Source,
};
pub use typed::{
    CapabilityError, CapabilityRequest, ControlRequest, ControlResponse, SetupHandshake,
    CORE_CAPABILITY, CORE_PROVIDER_TYPE,
};
