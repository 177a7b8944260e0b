//! opforge: a backend-pluggable numerical-operator runtime.
//!
//! Callers describe the execution target with a resource string such as
//! `/cpu/self/ref` or `/gpu/wgpu/ref/1`, resolve it against a registry of
//! backends, and drive everything else through the resulting
//! [`Engine`] handle: vectors whose data migrates between host and device on
//! demand, pointwise kernels, element restrictions, and operators composed
//! from them.
//!
//! # Modules
//!
//! - [`registry`] — Resource-string resolution and backend registration.
//! - [`engine`] — The runtime handle and its error reporter.
//! - [`backend`] — The operation surface backends implement.
//! - [`vector`] — Host/device vectors with leased access.
//! - [`qfunction`], [`restriction`], [`basis`], [`operator`] — The
//!   front-end objects operators are assembled from.
//! - [`backends`] — Built-in CPU and wgpu backends.
//! - [`gpu`] (feature `wgpu`) — Runtime kernel compilation and launch.
//!
//! # Example
//!
//! ```rust
//! use opforge::engine::Engine;
//! use opforge::registry::Registry;
//!
//! let registry = Registry::with_builtins().unwrap();
//! let engine = Engine::init("/cpu/self/ref", &registry).unwrap();
//! let mut v = engine.vector_create(8).unwrap();
//! v.set_array(vec![1.0; 8]).unwrap();
//! ```

pub mod backend;
pub mod backends;
pub mod basis;
pub mod context;
pub mod engine;
pub mod error;
#[cfg(feature = "wgpu")]
pub mod gpu;
pub mod operator;
pub mod qfunction;
pub mod registry;
pub mod restriction;
pub mod vector;

/// Host scalar element type.
pub type Scalar = f64;

/// Device scalar element type; conversions happen at synchronization
/// boundaries.
pub type DeviceScalar = f32;

pub use backend::{Backend, MemType, Operation};
pub use engine::Engine;
pub use error::{Error, ErrorCode, ErrorMode, Result};
pub use registry::{Registry, Resource};
pub use vector::Vector;
