//! Host-side bookkeeping for the objects that own keyed stores.
//!
//! - `registry`: named factories, looked up by string identifier.
//! - `slots`: an owned collection addressed by generational handles.

pub mod registry;
pub mod slots;

pub use registry::{Registry, RegistryError};
pub use slots::{Handle, Slots};
