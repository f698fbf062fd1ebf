use clap::Parser;

use rmexport::cli::{self, Cli};
use rmexport::error::ExportError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    // The tablet renders every exported PDF itself, so a large export puts
    // real work on the device.
    eprintln!(
        "NOTE: exporting asks the tablet to render each PDF; many or large documents can strain the device."
    );

    let cli = Cli::parse();
    let debug = cli.debug;

    match cli::run(cli).await {
        Ok(report) => {
            println!(
                "Done! {} exported, {} updated, {} skipped.",
                report.exported(),
                report.updated(),
                report.skipped()
            );
            Ok(())
        }
        Err(ExportError::Interrupted) => {
            println!("Cancelled.");
            Ok(())
        }
        Err(err) if debug => Err(err.into()),
        Err(err) => {
            eprintln!("ERROR: {err}");
            eprintln!();
            eprintln!(
                "Please make sure the reMarkable is connected to this PC and the USB web interface is enabled in \"Settings -> Storage\"."
            );
            std::process::exit(1);
        }
    }
}
