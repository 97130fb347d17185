//! Use cases (interactors) for SaveSync
//!
//! Use cases are thin coordinators that delegate business rules to domain
//! methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`AuthenticateUseCase`] - Login, sign-up, logout and token refresh

pub mod authenticate;

pub use authenticate::AuthenticateUseCase;
