//! CLI bootstrap - the composition root.
//!
//! The only place where infrastructure is wired together: settings from the
//! environment, the SQLite stores, the yt-dlp adapter and the engine facade.
//! Command handlers receive the composed context and delegate to the
//! service.

use std::sync::Arc;

use anyhow::{Context, Result};

use vidhoard_core::{ContentSourcePort, Settings, validate_settings};
use vidhoard_db::{build_stores, setup_database};
use vidhoard_engine::{ArchiveService, YtDlpSource};

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// The engine facade.
    pub service: Arc<ArchiveService>,
    /// The validated settings the service was built from.
    pub settings: Settings,
}

/// Bootstrap the CLI application: load and validate settings, open the
/// database, locate yt-dlp and wire the engine.
pub async fn bootstrap() -> Result<CliContext> {
    let settings = Settings::from_env();
    validate_settings(&settings).context("invalid settings")?;

    let pool = setup_database(&settings.database_path)
        .await
        .with_context(|| format!("opening {}", settings.database_path.display()))?;
    let stores = build_stores(&pool);

    let source: Arc<dyn ContentSourcePort> = Arc::new(
        YtDlpSource::new(settings.ytdlp_path.clone()).context("locating yt-dlp")?,
    );
    let service = ArchiveService::new(stores, source, settings.clone());

    Ok(CliContext { service, settings })
}
