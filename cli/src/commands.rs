//! Command implementations behind the `trustload` subcommands.
//!
//! Each command writes its user-facing result to the supplied `stdout` and
//! leaves diagnostics to the `log` facade.

use std::io::Write;
use std::sync::Arc;

use camino::Utf8Path;
use trustload::LoaderSettings;
use trustload::delegate::NoDelegate;
use trustload::dirs::BaseDirs;
use trustload::location::split_location_list;
use trustload::signing::{ContainerBuilder, SigningIdentity};

use crate::cli::{Cli, Command, KeygenArgs, LoadArgs, SignArgs, WipeArgs};
use crate::error::{CliError, Result};
use crate::output::{certificate_summary, load_summary, wipe_summary, write_line};

/// Run the parsed command.
///
/// # Errors
///
/// Returns [`CliError`] when the command fails; see
/// [`CliError::exit_code`] for the matching process exit code.
pub fn run(cli: &Cli, dirs: &dyn BaseDirs, stdout: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Load(args) => run_load(args, dirs, stdout),
        Command::Wipe(args) => run_wipe(args, dirs, stdout),
        Command::Keygen(args) => run_keygen(args, stdout),
        Command::Sign(args) => run_sign(args, stdout),
    }
}

/// Build loader settings from `load` arguments.
///
/// A `--config` file supplies everything; otherwise locations and trust
/// come from the flags. `--cache-dir` overrides either source.
///
/// # Errors
///
/// Returns [`CliError::Settings`] if the settings file cannot be loaded, or
/// [`CliError::InvalidTrustEntry`] for a malformed `--trust` flag.
pub fn settings_for_load(args: &LoadArgs) -> Result<LoaderSettings> {
    let mut settings = match &args.config {
        Some(path) => LoaderSettings::load(path)?,
        None => {
            let mut settings = LoaderSettings {
                locations: args
                    .locations
                    .as_deref()
                    .map(split_location_list)
                    .unwrap_or_default(),
                derive_trust: args.derive.clone(),
                ..LoaderSettings::default()
            };
            for raw in &args.trust {
                let (package, location) = parse_trust_argument(raw)?;
                settings.trust.insert(package.to_owned(), location.to_owned());
            }
            settings
        }
    };
    if let Some(directory) = &args.cache_dir {
        settings.cache.directory = Some(directory.clone());
    }
    Ok(settings)
}

/// Split a `PKG=LOC` trust flag.
///
/// # Errors
///
/// Returns [`CliError::InvalidTrustEntry`] if either side is empty or the
/// separator is missing.
///
/// # Examples
///
/// ```
/// use trustload_cli::commands::parse_trust_argument;
///
/// let (package, location) =
///     parse_trust_argument("org.example.app=https://certs.example.org/app.pem").unwrap();
/// assert_eq!(package, "org.example.app");
/// assert_eq!(location, "https://certs.example.org/app.pem");
/// ```
pub fn parse_trust_argument(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((package, location)) if !package.is_empty() && !location.is_empty() => {
            Ok((package, location))
        }
        _ => Err(CliError::InvalidTrustEntry {
            raw: raw.to_owned(),
        }),
    }
}

fn run_load(args: &LoadArgs, dirs: &dyn BaseDirs, stdout: &mut dyn Write) -> Result<()> {
    let settings = settings_for_load(args)?;
    let factory = settings.build_factory(dirs)?;
    let trust_entries = settings.trust_entries();
    let (loader, report) = factory.create_loader_with_report(
        &settings.location_list(),
        Some(&trust_entries[..]),
        Arc::new(NoDelegate),
    );
    if !report.is_clean() {
        log::info!(
            "rejected {} container location(s) and {} trust entry(s)",
            report.rejected_locations.len(),
            report.rejected_trust_entries.len()
        );
    }
    let handle = loader.load_class(&args.class)?;
    write_line(stdout, load_summary(&handle));
    Ok(())
}

fn run_wipe(args: &WipeArgs, dirs: &dyn BaseDirs, stdout: &mut dyn Write) -> Result<()> {
    let mut settings = LoaderSettings::default();
    settings.cache.directory.clone_from(&args.cache_dir);
    let caches = settings.open_caches(dirs)?;
    let (containers, certificates) = args.targets();
    caches.wipe(containers, certificates)?;
    write_line(stdout, wipe_summary(containers, certificates));
    Ok(())
}

fn run_keygen(args: &KeygenArgs, stdout: &mut dyn Write) -> Result<()> {
    let identity = match &args.issuer {
        Some(issuer) => SigningIdentity::load(issuer)?.issue(&args.subject),
        None => SigningIdentity::generate_root(&args.subject),
    };
    identity.save(&args.out)?;
    if let Some(cert_out) = &args.cert_out {
        write_file(cert_out, identity.certificate().to_pem().as_bytes())?;
    }
    write_line(stdout, certificate_summary(identity.certificate()));
    Ok(())
}

fn run_sign(args: &SignArgs, stdout: &mut dyn Write) -> Result<()> {
    let identity = SigningIdentity::load(&args.identity)?;
    let archive = ContainerBuilder::new()
        .add_directory(&args.input)?
        .sign_all_with(&identity)
        .build()?;
    write_file(&args.out, &archive)?;
    write_line(
        stdout,
        format!(
            "Signed {} as {} into {}",
            args.input,
            identity.certificate().subject(),
            args.out
        ),
    );
    Ok(())
}

fn write_file(path: &Utf8Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}
