//! The dpylease prelude.
//!
//! The purpose of this module is to bring the crate's traits into scope in
//! one go.
//!
//! ```no_run
//! # #![allow(unused_imports)]
//! use dpylease::prelude::*;
//! ```

pub use crate::backend::{DisplayBackend, ToolkitBackend, UpstreamSurfaceHook};
pub use crate::lock::ToolkitLock;
