//! # gamesales
//!
//! Daily digest of video-game sales for a single year.
//!
//! ## Usage
//!
//! ```bash
//! gamesales run [--source path-or-url] [--year 2006] [--format text|json]
//! gamesales schedule
//! ```
//!
//! ## Modules
//!
//! - `config` - Job configuration and target year derivation
//! - `dataset` - Fetching the sales table and filtering it to one year
//! - `rules` - The five aggregate statistics
//! - `report` - Rendering rule results with per-line failure isolation
//! - `pipeline` - Task graph and the runner that executes it
//! - `retry` - Retry policies for runs and the fetch step
//! - `schedule` - Daily trigger computation
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod rules;
pub mod schedule;
