// src/core/mod.rs

/// Result records, score levels and the network-facing record types.
pub mod models;

/// Category keys, titles and the per-report weight tables.
pub mod catalog;

pub mod scoring;

/// The `Network` seam and its live implementation (DNS, TCP, HTTP, TLS, SMTP).
pub mod network;

/// Leaf probes, category runners and the three report entry points.
pub mod scanner;

/// Validation of domains and client addresses coming from the outside.
pub mod target;
