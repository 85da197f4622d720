//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the exporter configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: Option<&str>) -> anyhow::Result<i32> {
        let Some(config_path) = config_path else {
            println!("❌ No configuration file given (use --config or TAREXPORT_CONFIG)");
            return Ok(2);
        };
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2); // Configuration error exit code
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!(
            "  Connect Timeout: {}s",
            config.delivery.connect_timeout_secs
        );
        println!("  Progress Label: {}", config.delivery.progress_label);
        if config.logging.local_enabled {
            println!(
                "  File Logging: {} ({})",
                config.logging.local_path, config.logging.local_rotation
            );
        } else {
            println!("  File Logging: disabled");
        }
        if config.options.is_empty() {
            println!("  Exporter Options: none");
        } else {
            println!("  Exporter Options:");
            for (key, value) in &config.options {
                println!("    {key} = {value}");
            }
        }
        println!();
        Ok(0)
    }
}
