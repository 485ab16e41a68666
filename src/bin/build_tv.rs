//! Build the static `/tv/` kiosk bundle from a built frontend directory.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use signdeck::bundle;

#[derive(Parser, Debug)]
#[command(name = "build-tv", about = "Rebase a built frontend onto a sub-path for kiosk hosting")]
struct Cli {
    /// Built frontend directory (must contain index.html).
    #[arg(long, env = "TV_SOURCE_DIR", default_value = "dist")]
    src: PathBuf,

    /// Output directory; created if missing.
    #[arg(long, env = "TV_OUT_DIR", default_value = "dist-tv")]
    out: PathBuf,

    /// URL path the bundle is served from.
    #[arg(long, env = "TV_BASE_PATH", default_value = bundle::DEFAULT_BASE)]
    base: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match bundle::build(&cli.src, &cli.out, &cli.base) {
        Ok(report) => {
            println!(
                "wrote {} ({} files, {} rewritten)",
                cli.out.display(),
                report.files_copied,
                report.files_rewritten
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "build-tv failed");
            ExitCode::FAILURE
        }
    }
}
