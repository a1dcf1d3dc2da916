//! Storage abstractions for patient-details services.
//!
//! Provides unified interfaces for:
//! - Object storage (S3-compatible, or in-memory) for staged snapshots
//! - The relational store holding the canonical `patient_details` table

pub mod object_store;
pub mod repository;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig};
pub use repository::{PatientRepository, ReplaceSummary};
