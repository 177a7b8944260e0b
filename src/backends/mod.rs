//! Built-in backends and their registry entries.
//!
//! Registration is explicit: [`register_all`] is called by
//! [`Registry::with_builtins`](crate::registry::Registry::with_builtins)
//! during startup, never from load-time constructors. Priorities order the
//! builtins when a resource string matches more than one prefix at equal
//! length.

use crate::error::Result;
use crate::registry::Registry;

pub mod cpu_opt;
pub mod cpu_ref;
#[cfg(feature = "wgpu")]
pub mod wgpu_ref;

/// Registers every built-in backend into `registry`.
pub fn register_all(registry: &mut Registry) -> Result<()> {
    registry.register(cpu_ref::PREFIX, 50, cpu_ref::init)?;
    registry.register(cpu_opt::PREFIX, 45, cpu_opt::init)?;
    #[cfg(feature = "wgpu")]
    registry.register(wgpu_ref::PREFIX, 40, wgpu_ref::init)?;
    Ok(())
}
