//! SaveSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileRecord`, `Manifest`, `SyncPlan`, `RemoteManifestRecord`, `BackupEntry`
//! - **Use cases** - `AuthenticateUseCase` (in-memory session with token refresh)
//! - **Port definitions** - Traits for adapters: `ISyncService`, `ITransferClient`,
//!   `IIdentityProvider`, `IManifestStore`, `ICapabilityIssuer`, `ICredentialValidator`
//! - **Error taxonomy** - [`error::SaveSyncError`] shared by client and server adapters
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure data types with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! Use cases orchestrate domain entities through port interfaces.

pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod usecases;
