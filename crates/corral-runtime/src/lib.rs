//! Container runtime for the corral supervisor.
//!
//! A [`container::Container`] owns `<root>/<id>/`, launches one detached
//! monitor per start through a [`shim::ShimLauncher`], and tracks the
//! [`process::Process`] entities it started.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod container;
pub mod process;
pub mod shim;
pub mod spec;
pub mod state;

pub use container::{Container, State, load_all};
pub use process::{Process, Stdio, Stream};
pub use shim::{DetachedShim, ExecShimLauncher, ShimHandle, ShimLauncher, ShimRequest};
