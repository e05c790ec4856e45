//! UPnP device-side interfaces
//!
//! The SOAP/XML transport and device description rendering live outside this
//! crate. These traits are the seam: a root device hosts services, asks them
//! to describe themselves, and sends GENA events when a service reports a
//! change.

pub mod description;

use std::sync::Weak;

pub use description::{
    Action, Argument, ArgumentDirection, PropertySet, ServiceDescription, StateVariable,
};

/// A service hosted by a [`RootDevice`]
pub trait Service: Send + Sync {
    /// Service type URN
    fn service_type(&self) -> &str;

    /// Describe actions and state variables
    fn write_service_description(&self, desc: &mut ServiceDescription);

    /// Current values of every evented state variable
    fn write_eventable_statevariables(&self, propset: &mut PropertySet);
}

/// The UPnP root device a service registers with
pub trait RootDevice: Send + Sync {
    /// Host `service` under `service_id`
    ///
    /// The device holds a weak reference; a service that has gone away is
    /// simply skipped.
    fn service_register(&self, service_id: &str, service: Weak<dyn Service>);

    /// Stop hosting the service registered under `service_id`
    fn service_unregister(&self, service_id: &str);

    /// Send a state-variable-changed event for `service_id`
    fn emit_event(&self, service_id: &str);
}
