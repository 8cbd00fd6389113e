//! Command-line interface definitions for the archiving name resolver.

use std::path::PathBuf;

use clap::Parser;
use time::OffsetDateTime;

use archiving_uri::cache::ViewPolicy;
use archiving_uri::names::Scheme;

/// Command-line arguments for the archiving name resolver.
///
/// Flags override the values read from `--config`.
#[derive(Debug, Parser)]
#[command(name = "archiving-resolver")]
#[command(
    author,
    version,
    about = "Resolve archived attribute names and serve their cached series"
)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:19100")]
    pub listen: String,

    /// Path to YAML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to YAML fixtures file served as the archiving backend
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Authority used when a name has none (host:port)
    #[arg(long, env = "TANGO_HOST")]
    pub default_authority: Option<String>,

    /// Scheme flavor to serve (archiving or tgarch)
    #[arg(long, value_parser = parse_scheme)]
    pub scheme: Option<Scheme>,

    /// Cache policy for value and timestamp views (shared or independent)
    #[arg(long, value_parser = parse_view_policy)]
    pub view_policy: Option<ViewPolicy>,

    /// UTC offset for local date-times (e.g. +01:00); defaults to the host offset
    #[arg(long)]
    pub utc_offset: Option<String>,

    /// Fixed "now" time (ISO-8601, e.g. 2025-08-03T00:00:00Z)
    #[arg(long, value_parser = parse_time)]
    pub fixed_now: Option<OffsetDateTime>,
}

/// Parse time string into `OffsetDateTime`.
///
/// # Errors
///
/// Returns error if the input string is not a valid RFC3339 timestamp.
fn parse_time(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
        .map_err(|e| format!("invalid datetime: {e}"))
}

fn parse_scheme(s: &str) -> Result<Scheme, String> {
    s.parse()
}

fn parse_view_policy(s: &str) -> Result<ViewPolicy, String> {
    match s.to_ascii_lowercase().as_str() {
        "shared" => Ok(ViewPolicy::Shared),
        "independent" => Ok(ViewPolicy::Independent),
        other => Err(format!("unknown view policy '{other}'")),
    }
}
