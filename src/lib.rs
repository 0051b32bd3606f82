//! # Tender Watch
//!
//! A monitoring and AI-assisted analysis engine for government procurement
//! tenders.
//!
//! Tender Watch keeps a SQLite catalogue of tenders fetched from a remote
//! procurement registry, generates five-part text analyses through a
//! configurable text-completion gateway, derives a 0–100 risk score and
//! typed anomaly findings from the generated text and raw tender data, and
//! runs a background scheduler that refreshes, cleans, sweeps, and
//! deadline-checks the catalogue on fixed cadences.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │  Registry  │──▶│  Scheduler │──▶│  SQLite  │
//! │  (scrape)  │   │  4 jobs    │   │  tenders │
//! └────────────┘   └─────┬──────┘   └────┬─────┘
//!                        │               │
//!                        ▼               ▼
//!                  ┌───────────┐   ┌───────────┐
//!                  │ Analyzer  │──▶│ analyses  │
//!                  │ LLM+rules │   │ anomalies │
//!                  └───────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tw init                        # create database
//! tw sync 0173200001425000123    # fetch one tender from the registry
//! tw analyze 0173200001425000123 # run the five-part analysis
//! tw watch                       # start the background scheduler
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`source`] | Remote registry adapter |
//! | [`completion`] | Text-completion provider abstraction |
//! | [`analyzer`] | Five-part analysis, risk score, anomaly rules |
//! | [`execution`] | Contract execution-progress analysis |
//! | [`redact`] | PII redaction for confidential mode |
//! | [`scheduler`] | Background monitoring jobs |
//! | [`store`] | Tender record queries |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analyzer;
pub mod completion;
pub mod config;
pub mod db;
pub mod execution;
pub mod migrate;
pub mod models;
pub mod redact;
pub mod scheduler;
pub mod source;
pub mod store;
