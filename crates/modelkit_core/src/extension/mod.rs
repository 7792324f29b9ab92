//! Extensions: auxiliary objects bound to a host.
//!
//! # Responsibility
//! - Define the contract concrete extensions implement ([`Extension`]).
//! - Attach extensions to a host and graft forwarding methods onto it.
//! - Expose the lifecycle hooks a host sweeps over (`pre_init`/`post_init`).
//!
//! # Invariants
//! - An extension is bound to exactly one host for its whole lifetime.
//! - `setup` runs once, during attachment, before any init group runs.
//! - A forwarding method never silently replaces an existing host method.

pub mod attached;
pub mod forward;
pub mod spec;

use crate::host::Host;
use crate::options::Options;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use attached::{AttachedExtension, ExtensionError, LifecycleHooks};
pub use forward::{dispatch, Forwarder, InvokeError, ReceiverKind};
pub use spec::{HandledMethodOptions, HandledMethods, MethodSpec};

/// Receiver a handled method sees when called through a forwarder.
pub enum Receiver<'a, H, E> {
    /// Default binding: the extension itself, with access to its host.
    Extension { extension: &'a E, parent: &'a H },
    /// Forwarder installed with `model_is_this`: the host only.
    Parent(&'a H),
}

impl<'a, H, E> Receiver<'a, H, E> {
    /// The host the call arrived on, whichever receiver kind was chosen.
    pub fn parent(&self) -> &'a H {
        match *self {
            Self::Extension { parent, .. } => parent,
            Self::Parent(parent) => parent,
        }
    }

    /// The extension, when it is the receiver.
    pub fn extension(&self) -> Option<&'a E> {
        match *self {
            Self::Extension { extension, .. } => Some(extension),
            Self::Parent(_) => None,
        }
    }
}

/// Result of one handled method call.
pub type MethodResult = Result<Value, MethodError>;

/// Method an extension exposes for forwarding.
pub type HandledMethod<H, E> = fn(Receiver<'_, H, E>, &[Value]) -> MethodResult;

/// Contract implemented by concrete extensions.
///
/// Only [`Extension::name`] and [`Extension::handled_method`] are required;
/// every hook defaults to a no-op.
pub trait Extension<H: Host>: Sized + 'static {
    /// Short name used in diagnostics.
    fn name(&self) -> &str;

    /// Host capabilities that must be present for attachment to succeed.
    fn required_capabilities(&self) -> &[&'static str] {
        &[]
    }

    /// Runs during attachment, before it returns.
    ///
    /// No init group has run at this point.
    fn setup(&mut self, _parent: &H) {}

    /// Runs after every extension is attached and before any init group.
    fn pre_init(&self, _parent: &H, _config: &Options) {}

    /// Runs after every init group completed.
    fn post_init(&self, _parent: &H, _config: &Options) {}

    /// Looks up a method this extension can forward, by name.
    fn handled_method(&self, name: &str) -> Option<HandledMethod<H, Self>>;

    /// Forwarding methods installed automatically on attachment.
    fn handled_methods(&self) -> HandledMethods {
        HandledMethods::default()
    }
}

/// Failure reported by a handled method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodError(String);

impl MethodError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl Display for MethodError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for MethodError {}
