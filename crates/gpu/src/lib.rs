//! Shared GPU context.
//!
//! One context (and one canvas surface) exists per page; every composited
//! slice draws through it. The context is owned by the engine's root
//! lifecycle — components borrow it, never recreate it.

pub mod context;

pub use context::{GpuContext, GpuError};
