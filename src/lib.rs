//! # DPR Analyzer
//!
//! Document ingestion and multi-stage AI analysis for Detailed Project
//! Reports.
//!
//! An uploaded PDF, DOCX or XLSX file is reduced to one bounded text
//! payload (falling back to OCR for scanned PDFs), analyzed concurrently by
//! several independent inference tasks, and merged into a single report
//! record. Assembly is all-or-nothing: a report exists only if every
//! requested analysis succeeded.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │  format  │──▶│  extract  │──▶│ normalize │──▶│ orchestrator │──▶│ assemble │
//! │ classify │   │ PDF/OCR/  │   │ char cap  │   │ summarize    │   │ all-or-  │
//! └──────────┘   │ DOCX/XLSX │   └───────────┘   │ risk         │   │ nothing  │
//!                └───────────┘                   │ compliance   │   └────┬─────┘
//!                                                │ inconsistency│        ▼
//!                                                └──────────────┘   ┌──────────┐
//!                                                                   │  store   │
//!                                                                   │ (SQLite) │
//!                                                                   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dpra init
//! dpra extract ./reports/ring-road.pdf
//! dpra analyze ./reports/ring-road.pdf --project ring-road
//! dpra list --project ring-road
//! dpra chat <report-id> "What is the total project cost?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`format`] | Media type classification |
//! | [`extract`] | Per-format text extraction with OCR fallback |
//! | [`ocr`] | OCR engine abstraction |
//! | [`normalize`] | Bounded payload construction |
//! | [`prompts`] | Task instruction templates |
//! | [`inference`] | Chat-completions client |
//! | [`sanitize`] | Fence stripping and typed result parsing |
//! | [`orchestrator`] | Concurrent task dispatch with a deadline |
//! | [`assemble`] | Report assembly |
//! | [`pipeline`] | End-to-end invocation |
//! | [`chat`] | Questions about a stored report |
//! | [`store`] | Report persistence |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod assemble;
pub mod chat;
pub mod config;
pub mod db;
pub mod extract;
pub mod format;
pub mod inference;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod sanitize;
pub mod store;
