// src/cli.rs
use clap::Parser;

/// ct-inventory: Certificate Transparency asset discovery
///
/// Looks up each domain in the configured CT search source and reconciles
/// the certificates found into the asset inventory.
#[derive(Parser, Debug, Clone)]
#[command(name = "ct-inventory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Domains to scan
    #[arg(required = true, num_args = 1..)]
    pub domains: Vec<String>,

    // ===== Input & Configuration =====
    /// Path to TOML config file
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config: String,

    /// Run even when the inventory already holds data for a domain
    #[arg(long = "force-run")]
    pub force_run: bool,

    // ===== Output Format =====
    /// Output run reports in JSONL format
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Output created and updated entries in CSV format
    #[arg(long = "csv")]
    pub csv: bool,

    // ===== Output Destination =====
    /// Write output to file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Log notifications instead of delivering them
    #[arg(long = "no-notify")]
    pub no_notify: bool,

    // ===== Logging =====
    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.json && self.csv {
            anyhow::bail!("Cannot specify multiple output formats. Choose one of: --json or --csv");
        }

        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        if let Some(blank) = self.domains.iter().find(|d| d.trim().is_empty()) {
            anyhow::bail!("Invalid domain argument: {:?}", blank);
        }

        Ok(())
    }

    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Human
        }
    }

    /// Log level forced by flags, if any
    pub fn log_level(&self) -> Option<&str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("warn")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored text output (default)
    Human,
    /// JSON Lines format (one report per line)
    Json,
    Csv,
}
