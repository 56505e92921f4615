use crate::app::render::OutputFormat;
use crate::config::toml_config::DefaultsConfig;
use crate::core::orchestrator::DemoRequest;
use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, Validate};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "rfa-demo")]
#[command(about = "Repeated fair allocation of indivisible items: two agents, EF1 per round")]
pub struct CliConfig {
    /// Utilities as JSON or a dict literal, e.g. '{"0": {"0": 11}, "1": {"0": 22}}'
    #[arg(long, conflicts_with_all = ["utilities_file", "form", "batch"])]
    pub utilities: Option<String>,

    /// Read the utilities payload from a file
    #[arg(long, conflicts_with_all = ["form", "batch"])]
    pub utilities_file: Option<PathBuf>,

    /// A URL-encoded form submission (utilities=...&k=...&algo=...)
    #[arg(long, conflicts_with = "batch")]
    pub form: Option<String>,

    /// Number of rounds
    #[arg(short, long, allow_negative_numbers = true)]
    pub k: Option<i64>,

    /// "1" = Algorithm 1 (k = 2, EF1), anything else = Algorithm 2 (even k, weak EF1)
    #[arg(long)]
    pub algo: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TOML file with [[requests]] to run concurrently
    #[arg(long)]
    pub batch: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl CliConfig {
    /// Builds the request: form body (or config defaults) first, then
    /// explicit flags on top.
    pub fn request(&self, defaults: &DefaultsConfig) -> Result<DemoRequest> {
        let mut request = match &self.form {
            Some(body) => DemoRequest::from_form_body(body)?,
            None => DemoRequest::new(defaults.utilities.clone(), defaults.k, defaults.algo.clone()),
        };

        if let Some(utilities) = &self.utilities {
            request.utilities = utilities.clone();
        }
        if let Some(path) = &self.utilities_file {
            request.utilities = std::fs::read_to_string(path)?;
        }
        if let Some(k) = self.k {
            request.k = k;
        }
        if let Some(algo) = &self.algo {
            request.algo = algo.clone();
        }
        Ok(request)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(utilities) = &self.utilities {
            validate_non_empty_string("--utilities", utilities)?;
        }
        if let Some(algo) = &self.algo {
            validate_non_empty_string("--algo", algo)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = CliConfig::parse_from(["rfa-demo", "--utilities", "{}", "-k", "4", "--algo", "2"]);
        let request = cli.request(&DefaultsConfig::default()).unwrap();
        assert_eq!(request, DemoRequest::new("{}", 4, "2"));
    }

    #[test]
    fn test_form_then_flags() {
        let cli = CliConfig::parse_from(["rfa-demo", "--form", "utilities=%7B%7D&k=6&algo=2", "-k", "8"]);
        let request = cli.request(&DefaultsConfig::default()).unwrap();
        assert_eq!(request, DemoRequest::new("{}", 8, "2"));
    }

    #[test]
    fn test_defaults_when_nothing_given() {
        let cli = CliConfig::parse_from(["rfa-demo"]);
        let request = cli.request(&DefaultsConfig::default()).unwrap();
        assert_eq!(request, DemoRequest::default());
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_conflicting_sources() {
        assert!(CliConfig::try_parse_from(["rfa-demo", "--utilities", "{}", "--form", "k=2"]).is_err());
    }

    #[test]
    fn test_negative_k_is_accepted_by_parser() {
        let cli = CliConfig::parse_from(["rfa-demo", "-k", "-2"]);
        assert_eq!(cli.k, Some(-2));
    }
}
