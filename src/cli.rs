//! Command Line Interface (CLI) arguments.

use clap::Parser;
use std::path::PathBuf;

/// Aquaview command line interface
#[derive(Clone, Debug, Parser)]
pub struct CommandLineArgs {
    /// The IP address on which the server should listen
    #[arg(long, default_value = "0.0.0.0", env = "AQUAVIEW_HOST")]
    pub host: String,
    /// The port to which the server should bind
    #[arg(long, default_value_t = 8080, env = "AQUAVIEW_PORT")]
    pub port: u16,
    /// Flag indicating whether HTTPS should be used
    #[arg(long, default_value_t = false, env = "AQUAVIEW_HTTPS")]
    pub https: bool,
    /// Path to the certificate file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/aquaview/certs/cert.pem",
        env = "AQUAVIEW_CERT_FILE"
    )]
    pub cert_file: String,
    /// Path to the key file to be used for HTTPS encryption
    #[arg(
        long,
        default_value = "~/.config/aquaview/certs/key.pem",
        env = "AQUAVIEW_KEY_FILE"
    )]
    pub key_file: String,
    /// Maximum time in seconds to wait for operations to complete upon receiving `ctrl+c` signal.
    #[arg(long, default_value_t = 60, env = "AQUAVIEW_SHUTDOWN_TIMEOUT")]
    pub graceful_shutdown_timeout: u64,
    /// Path to the MessagePack dataset file holding the imagery table
    #[arg(long, env = "AQUAVIEW_DATASET_PATH")]
    pub dataset_path: PathBuf,
    /// Name of the schema column holding the embedded images
    #[arg(long, default_value = "image", env = "AQUAVIEW_IMAGE_COLUMN")]
    pub image_column: String,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
