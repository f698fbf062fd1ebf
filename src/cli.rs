//! Command-line interface and the run entrypoint shared with tests.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use crate::contract::DeviceClient;
use crate::device::UsbWebClient;
use crate::error::ExportError;
use crate::export::{self, ExportConfig, ExportReport, InterruptFlag, UtcOffset};
use crate::filter::FilterCriteria;

/// Export every document from a connected reMarkable tablet as PDF and
/// rmdoc files, mirroring the folder structure on the device.
///
/// Documents already present in the target folder are skipped, so an
/// interrupted export can simply be started again. With --update, exports
/// that are older than the copy on the device are replaced.
#[derive(Debug, Parser)]
#[clap(name = "rmexport", version)]
pub struct Cli {
    /// Base folder to put the exported files in
    pub target_folder: PathBuf,

    /// Skips all files except notebooks
    #[clap(short = 'n', long)]
    pub only_notebooks: bool,

    /// Skips all files except bookmarked ones
    #[clap(short = 'b', long)]
    pub only_bookmarked: bool,

    /// Skips all files whose device path does not start with the given
    /// prefix (case-insensitive)
    #[clap(short = 'f', long, value_name = "PATH")]
    pub only_path_prefix: Option<String>,

    /// Replaces exports the device has newer copies of (never deletes
    /// local files)
    #[clap(short = 'u', long)]
    pub update: bool,

    /// Reports failures with the full error chain instead of the short
    /// connectivity hint
    #[clap(long)]
    pub debug: bool,
}

/// Fetches the file structure from the device and exports everything that
/// matches the invocation's filters.
pub async fn run(cli: Cli) -> Result<ExportReport, ExportError> {
    if cli.update {
        info!("Updating files that changed on the device, other exports are left alone");
    }
    if cli.only_notebooks {
        info!("Exporting notebooks only");
    }
    if cli.only_bookmarked {
        info!("Exporting bookmarked files only");
    }
    if let Some(prefix) = cli.only_path_prefix.as_deref().filter(|p| !p.is_empty()) {
        info!(
            prefix,
            "Exporting only files under the given path prefix (case-insensitive)"
        );
    }

    let criteria = FilterCriteria::new(
        cli.only_notebooks,
        cli.only_bookmarked,
        cli.only_path_prefix.as_deref(),
    );
    let config = ExportConfig {
        target_dir: cli.target_folder,
        criteria,
        update_existing: cli.update,
    };

    let interrupt = InterruptFlag::new();
    let watcher = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current document");
            watcher.trigger();
        }
    });

    let client = UsbWebClient::from_env();
    info!(device = client.base_url(), "Fetching file structure");
    let tree = client.fetch_file_structure().await?;

    let offset = UtcOffset::sample_local();
    export::export_all(&client, &tree, &config, offset, &interrupt).await
}
