//! OAuth identifiers and token models shared by every platform connection.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{secret::*, *};
