//! Domain types and collaborator ports for the pdfpress compression worker.
//!
//! Everything here is storage- and transport-agnostic: the job record shape,
//! its status machine, the compression presets, and the async traits the
//! pipeline drives (artifact storage, job records, the compression tool).

pub mod error;
pub mod job;
pub mod naming;
pub mod ports;
