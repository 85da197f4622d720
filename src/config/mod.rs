//! Configuration management.
//!
//! TOML-based configuration with:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `TAREXPORT_<SECTION>_<KEY>` environment overrides
//! - Defaults for every setting
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tar_exporter::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("tar-exporter.toml")?;
//! println!("Connect timeout: {:?}", config.delivery.connect_timeout());
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [delivery]
//! connect_timeout_secs = 5
//! progress_label = "sending archive"
//!
//! [logging]
//! local_enabled = true
//! local_path = "/var/log/tar-exporter"
//! local_rotation = "daily"
//!
//! [options]
//! "source-date-epoch" = "${SOURCE_DATE_EPOCH}"
//! "attestation-prefix" = "attestation-"
//! ```

pub mod loader;
pub mod schema;

pub use loader::load_config;
pub use schema::{ApplicationConfig, DeliveryConfig, ExporterConfig, LoggingConfig};
