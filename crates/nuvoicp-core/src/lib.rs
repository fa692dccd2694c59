//! nuvoicp-core - Core library for Nuvoton N76E003 ICP programming
//!
//! This crate provides the programming workflow for the N76E003 over its
//! In-Circuit Programming interface: session bootstrap with locked-chip
//! re-entry, device state inspection, flash layout planning and the
//! erase/write/verify/lock sequence. It is designed to be `no_std`
//! compatible (with `alloc`) so the same workflow can drive an embedded
//! programmer.
//!
//! # Features
//!
//! - `std` - Enable standard library support, error trait impls and
//!   TOML configuration files
//!
//! # Example
//!
//! ```ignore
//! use nuvoicp_core::device::DeviceLayout;
//! use nuvoicp_core::workflow::{self, NoProgress, Operation, Request};
//!
//! fn status<T: nuvoicp_core::icp::IcpTransport>(transport: &mut T) {
//!     let request = Request::new(Operation::DumpConfig);
//!     match workflow::run(transport, &DeviceLayout::N76E003, &request, &mut NoProgress) {
//!         Ok(outcome) => println!("{:?}", outcome),
//!         Err(e) => println!("Failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod device;
pub mod error;
pub mod icp;
pub mod workflow;

pub use error::{Error, Result};
