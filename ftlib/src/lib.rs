#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod client;
pub use client::*;

mod error;
pub use error::*;

pub mod protocol;

pub mod registers;
pub use registers::Register;

mod scan;
pub use scan::*;

mod servo;

pub mod sim;

mod transport;
pub use transport::*;
