//! CLI argument definitions for `trustload`.
//!
//! Kept apart from the entrypoint so tests can parse arguments without
//! running anything.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Load, sign, and manage trust-gated code containers.
#[derive(Parser, Debug)]
#[command(name = "trustload")]
#[command(version, about)]
#[command(long_about = concat!(
    "Load, sign, and manage trust-gated code containers.\n\n",
    "A container is only used when every signed entry it holds was signed by ",
    "the certificate trusted for the requested class's package. Remote ",
    "locations are always fetched over https.\n\n",
    "Every failure to load a class is reported the same way, whether the ",
    "class is missing, its package is untrusted, or verification failed. ",
    "Raise the verbosity with -v to see why.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Create a signing identity and export its certificate:\n",
    "    $ trustload keygen --subject org.example.app --out app.key --cert-out app.pem\n\n",
    "  Package and sign a directory of classes:\n",
    "    $ trustload sign --identity app.key --out app.jar build/classes\n\n",
    "  Load a class with an explicit certificate:\n",
    "    $ trustload load --locations app.jar --trust org.example.app=app.pem org.example.app.Main\n\n",
    "  Load using a settings file:\n",
    "    $ trustload load --config trustload.toml org.example.app.Main\n\n",
    "  Drop cached containers only:\n",
    "    $ trustload wipe --containers\n\n",
    "Set TRUSTLOAD_CACHE_DIR to move the cache away from the platform default.",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Increase log output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Suppress all log output.
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load a class and print where it came from.
    Load(LoadArgs),

    /// Remove cached containers and certificates.
    Wipe(WipeArgs),

    /// Generate a signing identity.
    Keygen(KeygenArgs),

    /// Package and sign a directory as a container.
    Sign(SignArgs),
}

/// Arguments for the load command.
#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// Settings file naming locations, trust, and cache behaviour.
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["locations", "trust", "derive"])]
    pub config: Option<Utf8PathBuf>,

    /// Container locations separated by ':'.
    #[arg(short, long, value_name = "LIST")]
    pub locations: Option<String>,

    /// Trust the certificate at LOC for package PKG (repeatable).
    #[arg(short, long, value_name = "PKG=LOC")]
    pub trust: Vec<String>,

    /// Derive the certificate location for PKG from its name (repeatable).
    #[arg(short, long, value_name = "PKG")]
    pub derive: Vec<String>,

    /// Cache directory [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Fully qualified class name to load.
    #[arg(value_name = "CLASS")]
    pub class: String,
}

/// Arguments for the wipe command.
///
/// With neither flag set, both caches are wiped.
#[derive(Args, Debug, Clone, Default)]
pub struct WipeArgs {
    /// Wipe the container cache.
    #[arg(long)]
    pub containers: bool,

    /// Wipe the certificate cache.
    #[arg(long)]
    pub certificates: bool,

    /// Cache directory [default: platform-specific].
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,
}

impl WipeArgs {
    /// Return which caches to wipe as `(containers, certificates)`.
    #[must_use]
    pub fn targets(&self) -> (bool, bool) {
        if self.containers || self.certificates {
            (self.containers, self.certificates)
        } else {
            (true, true)
        }
    }
}

/// Arguments for the keygen command.
#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Subject recorded in the certificate.
    #[arg(short, long)]
    pub subject: String,

    /// Where to write the identity file.
    #[arg(short, long, value_name = "FILE")]
    pub out: Utf8PathBuf,

    /// Identity that issues the new certificate [default: self-signed root].
    #[arg(short, long, value_name = "FILE")]
    pub issuer: Option<Utf8PathBuf>,

    /// Also write the certificate as PEM.
    #[arg(long, value_name = "FILE")]
    pub cert_out: Option<Utf8PathBuf>,
}

/// Arguments for the sign command.
#[derive(Args, Debug, Clone)]
pub struct SignArgs {
    /// Identity file used to sign every entry.
    #[arg(short, long, value_name = "FILE")]
    pub identity: Utf8PathBuf,

    /// Where to write the container.
    #[arg(short, long, value_name = "FILE")]
    pub out: Utf8PathBuf,

    /// Directory whose files become container entries.
    #[arg(value_name = "INPUT_DIR")]
    pub input: Utf8PathBuf,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
