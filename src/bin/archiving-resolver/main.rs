//! # Archiving Resolver CLI
//!
//! Serves archived attribute name resolution and cached series over HTTP,
//! backed by a YAML fixture reader.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use time::UtcOffset;
use tracing_subscriber::{fmt, EnvFilter};

use archiving_uri::http::{build_router, AppState};
use archiving_uri::reader::FixtureReader;
use archiving_uri::settings::ArchivingSettings;

mod cli;

use cli::Cli;

fn main() -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // The host offset can only be read reliably while single-threaded.
    let host_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let mut settings = match &cli.config {
        Some(path) => ArchivingSettings::load_from_path(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
        None => ArchivingSettings::default(),
    };
    if let Some(authority) = cli.default_authority.clone() {
        settings.default_authority = Some(authority);
    }
    if let Some(scheme) = cli.scheme {
        settings.scheme = scheme;
    }
    if let Some(policy) = cli.view_policy {
        settings.view_policy = policy;
    }
    match cli.utc_offset.clone() {
        Some(offset) => settings.utc_offset = offset,
        None if cli.config.is_none() => settings.utc_offset = format_offset(host_offset),
        None => {}
    }

    let reader = match &cli.fixtures {
        Some(path) => FixtureReader::load_from_path(path)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
        None => FixtureReader::new(),
    };

    let mut builder = AppState::builder().with_reader(Arc::new(reader)).with_settings(settings);
    if let Some(fixed_time) = cli.fixed_now {
        builder = builder.with_fixed_now(fixed_time);
    }
    let state = builder.build()?;

    let app = build_router(state);
    let addr: SocketAddr = cli.listen.parse().map_err(io::Error::other)?;

    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(async move {
        tracing::info!("starting archiving-resolver on http://{addr}");
        axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await
    })
}

/// Render an offset as `±HH:MM`.
fn format_offset(offset: UtcOffset) -> String {
    let (hours, minutes, _) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };
    format!("{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
}
