//! Object-composition helpers for host ("model") objects.
//! Provides run-once initializer groups and extensions that graft
//! forwarding methods onto a host.

pub mod extension;
pub mod host;
pub mod init_group;
pub mod lifecycle;
pub mod logging;
pub mod naming;
pub mod options;

pub use extension::{
    dispatch, AttachedExtension, Extension, ExtensionError, Forwarder, HandledMethod,
    HandledMethodOptions, HandledMethods, InvokeError, LifecycleHooks, MethodError, MethodResult,
    MethodSpec, Receiver, ReceiverKind,
};
pub use host::{Host, HostId, MethodTable};
pub use init_group::{
    InitEntry, InitGroup, InitGroupError, InitReceiver, InitResult, Initializer, NeedOutcome,
};
pub use lifecycle::{Lifecycle, LifecycleError, LifecyclePhase};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use options::{Options, OptionsError};

/// Minimal health-check API for embedding smoke tests.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
