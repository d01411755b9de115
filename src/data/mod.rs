//! Data layer: spectrum model, loading, and metadata selection.
//!
//! Architecture:
//! ```text
//!  .parquet / .json / .csv
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file + units → SpectralDataset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌────────────────┐
//!   │ SpectralDataset │  Vec<Spectrum>, column names
//!   └────────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  metadata constraints → indices to measure
//!   └──────────┘
//! ```

pub mod filter;
pub mod loader;
pub mod model;
