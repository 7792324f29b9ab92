//! Forwarding records and the single dispatch path for them.

use crate::extension::MethodError;
use crate::host::{Host, HostId};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Which object a forwarded method sees as its receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverKind {
    /// The extension that provides the method.
    Extension,
    /// The host the method was installed on.
    Parent,
}

/// Type-erased extension side of a forwarder.
pub trait ForwardTarget<H> {
    fn extension_name(&self) -> &str;

    /// Identity of the host this extension was attached to.
    fn bound_host(&self) -> HostId;

    /// Calls the extension method `method` with the given receiver kind.
    fn call_method(
        &self,
        method: &str,
        receiver: ReceiverKind,
        host: &H,
        args: &[Value],
    ) -> Result<Value, InvokeError>;
}

/// One forwarding method installed on a host.
pub struct Forwarder<H> {
    target: Rc<dyn ForwardTarget<H>>,
    source_method: String,
    receiver: ReceiverKind,
}

impl<H> Forwarder<H> {
    pub(crate) fn new(
        target: Rc<dyn ForwardTarget<H>>,
        source_method: impl Into<String>,
        receiver: ReceiverKind,
    ) -> Self {
        Self {
            target,
            source_method: source_method.into(),
            receiver,
        }
    }

    /// Name of the extension method this forwarder calls.
    pub fn source_method(&self) -> &str {
        &self.source_method
    }

    pub fn receiver(&self) -> ReceiverKind {
        self.receiver
    }

    pub fn extension_name(&self) -> &str {
        self.target.extension_name()
    }

    pub fn bound_host(&self) -> HostId {
        self.target.bound_host()
    }
}

impl<H> Clone for Forwarder<H> {
    fn clone(&self) -> Self {
        Self {
            target: Rc::clone(&self.target),
            source_method: self.source_method.clone(),
            receiver: self.receiver,
        }
    }
}

impl<H> Debug for Forwarder<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("extension", &self.target.extension_name())
            .field("source_method", &self.source_method)
            .field("receiver", &self.receiver)
            .finish()
    }
}

/// Calls the forwarder installed on `host` as `name` with `args`.
///
/// # Errors
/// - [`InvokeError::UnknownMethod`] when nothing is installed as `name`.
/// - [`InvokeError::ForeignHost`] when the forwarder was installed by an
///   extension attached to a different host.
/// - Whatever the extension method itself reports.
pub fn dispatch<H: Host>(host: &H, name: &str, args: &[Value]) -> Result<Value, InvokeError> {
    // Cloned out so the table is not borrowed while the method runs.
    let Some(forwarder) = host.method_table().get(name) else {
        return Err(InvokeError::UnknownMethod(name.to_string()));
    };

    let expected = forwarder.bound_host();
    let actual = host.host_id();
    if expected != actual {
        return Err(InvokeError::ForeignHost {
            method: name.to_string(),
            expected,
            actual,
        });
    }

    forwarder
        .target
        .call_method(&forwarder.source_method, forwarder.receiver, host, args)
}

/// Errors raised while calling a forwarding method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    UnknownMethod(String),
    ForeignHost {
        method: String,
        expected: HostId,
        actual: HostId,
    },
    MissingSource {
        extension: String,
        method: String,
    },
    Method {
        method: String,
        source: MethodError,
    },
}

impl Display for InvokeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMethod(name) => write!(f, "no method installed as `{name}`"),
            Self::ForeignHost {
                method,
                expected,
                actual,
            } => write!(
                f,
                "method `{method}` is bound to host {expected}, invoked on host {actual}"
            ),
            Self::MissingSource { extension, method } => {
                write!(f, "extension `{extension}` no longer provides `{method}`")
            }
            Self::Method { method, source } => write!(f, "method `{method}` failed: {source}"),
        }
    }
}

impl Error for InvokeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Method { source, .. } => Some(source),
            _ => None,
        }
    }
}
