//! Host ("model") capability contract.
//!
//! # Responsibility
//! - Give every host a stable identity that extensions bind to.
//! - Own the table of forwarding methods extensions graft onto a host.
//!
//! # Invariants
//! - A nil [`HostId`] never identifies a constructed host.
//! - The method table borrow is released before any forwarded call runs.

use crate::extension::forward::{dispatch, Forwarder, InvokeError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::fmt::{Debug, Display, Formatter};
use uuid::Uuid;

/// Stable identity of one host instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(Uuid);

impl HostId {
    /// Generates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The identity of a host that was never constructed.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Wraps an identity issued elsewhere, such as a persisted one.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// True for the identity of a host that was never constructed.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for HostId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for HostId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Contract a host object satisfies so extensions can attach to it.
///
/// Hosts are shared as `Rc<H>`; extensions and init groups only keep weak
/// references back to them.
pub trait Host: Sized + 'static {
    /// Identity assigned by the host's own constructor.
    fn host_id(&self) -> HostId;

    /// Forwarding methods installed by extensions.
    fn method_table(&self) -> &MethodTable<Self>;

    /// Capability strings this host provides to extensions.
    fn capabilities(&self) -> &[&'static str] {
        &[]
    }

    /// Names of methods the host implements itself.
    ///
    /// Extensions may only shadow these when replacement is allowed.
    fn native_methods(&self) -> &[&'static str] {
        &[]
    }

    /// Returns whether `name` is already taken on this host.
    fn has_method(&self, name: &str) -> bool {
        self.method_table().contains(name)
            || self.native_methods().iter().any(|native| *native == name)
    }

    /// Calls the forwarding method installed as `name`.
    fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, InvokeError> {
        dispatch(self, name, args)
    }
}

/// Insertion-ordered table of forwarding methods on one host.
pub struct MethodTable<H> {
    forwarders: RefCell<IndexMap<String, Forwarder<H>>>,
}

impl<H> MethodTable<H> {
    pub fn new() -> Self {
        Self {
            forwarders: RefCell::new(IndexMap::new()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.forwarders.borrow().contains_key(name)
    }

    /// Returns a handle to the forwarder installed as `name`.
    pub fn get(&self, name: &str) -> Option<Forwarder<H>> {
        self.forwarders.borrow().get(name).cloned()
    }

    /// Installed method names in installation order.
    pub fn names(&self) -> Vec<String> {
        self.forwarders.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.forwarders.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.forwarders.borrow().is_empty()
    }

    /// Installs `forwarder` as `name`, returning the one it replaced.
    ///
    /// Collision policy is enforced by the caller.
    pub(crate) fn install(&self, name: &str, forwarder: Forwarder<H>) -> Option<Forwarder<H>> {
        self.forwarders
            .borrow_mut()
            .insert(name.to_string(), forwarder)
    }

    /// Removes the forwarder installed as `name`, keeping the order of the rest.
    pub(crate) fn remove(&self, name: &str) -> Option<Forwarder<H>> {
        self.forwarders.borrow_mut().shift_remove(name)
    }
}

impl<H> Default for MethodTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Debug for MethodTable<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("forwarders", &*self.forwarders.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Host, HostId, MethodTable};
    use crate::extension::forward::InvokeError;
    use serde_json::json;

    struct BareHost {
        id: HostId,
        methods: MethodTable<Self>,
    }

    impl Host for BareHost {
        fn host_id(&self) -> HostId {
            self.id
        }

        fn method_table(&self) -> &MethodTable<Self> {
            &self.methods
        }

        fn native_methods(&self) -> &[&'static str] {
            &["save"]
        }
    }

    #[test]
    fn generated_ids_are_unique_and_not_nil() {
        let first = HostId::new();
        let second = HostId::new();
        assert_ne!(first, second);
        assert!(!first.is_nil());
        assert!(HostId::nil().is_nil());
    }

    #[test]
    fn host_id_serializes_as_plain_uuid() {
        let id = HostId::new();
        let value = serde_json::to_value(id).expect("host id serialize");
        assert_eq!(value, json!(id.as_uuid().to_string()));
    }

    #[test]
    fn native_methods_count_as_taken() {
        let host = BareHost {
            id: HostId::new(),
            methods: MethodTable::new(),
        };
        assert!(host.has_method("save"));
        assert!(!host.has_method("load"));
        assert!(host.method_table().is_empty());
    }

    #[test]
    fn invoking_unknown_method_fails() {
        let host = BareHost {
            id: HostId::new(),
            methods: MethodTable::new(),
        };
        let err = host
            .invoke("load", &[])
            .expect_err("nothing is installed yet");
        assert_eq!(err, InvokeError::UnknownMethod("load".to_string()));
    }
}
