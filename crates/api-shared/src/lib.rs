//! # API Shared
//!
//! Wire types for the KYC runtime HTTP contract.
//!
//! Contains:
//! - Invocation request and response bodies, and extraction of what to screen from a payload
//! - `PingRes` and the `HealthService` behind `/ping`
//!
//! Used by `api-rest` (server side) and `kyc-cli` (client side).

#![warn(rust_2018_idioms)]

pub mod health;
pub mod invocation;

pub use health::{HealthService, PingRes};
pub use invocation::{
    InvocationInput, InvocationReq, InvocationRes, InvocationTarget, MISSING_INPUT_ERROR,
    SESSION_HEADER,
};
