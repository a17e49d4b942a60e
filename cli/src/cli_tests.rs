//! Tests for CLI parsing and flag defaults.

use super::*;
use rstest::rstest;

#[test]
fn cli_parses_load_with_locations_and_trust() {
    let cli = Cli::parse_from([
        "trustload",
        "load",
        "--locations",
        "/srv/app.jar:https://repo.example.org/lib.jar",
        "--trust",
        "org.example.app=/etc/app.pem",
        "--trust",
        "org.example.lib=https://certs.example.org/lib.pem",
        "--derive",
        "org.example.util",
        "org.example.app.Main",
    ]);

    let Command::Load(args) = cli.command else {
        panic!("expected Load command");
    };
    assert_eq!(
        args.locations.as_deref(),
        Some("/srv/app.jar:https://repo.example.org/lib.jar")
    );
    assert_eq!(args.trust.len(), 2);
    assert_eq!(args.derive, ["org.example.util"]);
    assert_eq!(args.class, "org.example.app.Main");
    assert!(args.config.is_none());
}

#[test]
fn cli_rejects_config_alongside_locations() {
    let result = Cli::try_parse_from([
        "trustload",
        "load",
        "--config",
        "trustload.toml",
        "--locations",
        "/srv/app.jar",
        "org.example.app.Main",
    ]);
    assert!(result.is_err());
}

#[test]
fn cli_requires_a_class_for_load() {
    assert!(Cli::try_parse_from(["trustload", "load", "--locations", "/srv/app.jar"]).is_err());
}

#[rstest]
#[case::no_flags(&[], (true, true))]
#[case::containers_only(&["--containers"], (true, false))]
#[case::certificates_only(&["--certificates"], (false, true))]
#[case::both(&["--containers", "--certificates"], (true, true))]
fn wipe_targets_default_to_both(#[case] flags: &[&str], #[case] expected: (bool, bool)) {
    let mut argv = vec!["trustload", "wipe"];
    argv.extend_from_slice(flags);
    let cli = Cli::parse_from(argv);

    let Command::Wipe(args) = cli.command else {
        panic!("expected Wipe command");
    };
    assert_eq!(args.targets(), expected);
}

#[test]
fn cli_parses_keygen_with_issuer() {
    let cli = Cli::parse_from([
        "trustload",
        "keygen",
        "--subject",
        "org.example.app",
        "--out",
        "app.key",
        "--issuer",
        "root.key",
        "--cert-out",
        "app.pem",
    ]);

    let Command::Keygen(args) = cli.command else {
        panic!("expected Keygen command");
    };
    assert_eq!(args.subject, "org.example.app");
    assert_eq!(args.out, Utf8PathBuf::from("app.key"));
    assert_eq!(args.issuer, Some(Utf8PathBuf::from("root.key")));
    assert_eq!(args.cert_out, Some(Utf8PathBuf::from("app.pem")));
}

#[test]
fn cli_parses_sign() {
    let cli = Cli::parse_from([
        "trustload",
        "sign",
        "-i",
        "app.key",
        "-o",
        "app.jar",
        "build/classes",
    ]);

    let Command::Sign(args) = cli.command else {
        panic!("expected Sign command");
    };
    assert_eq!(args.identity, Utf8PathBuf::from("app.key"));
    assert_eq!(args.out, Utf8PathBuf::from("app.jar"));
    assert_eq!(args.input, Utf8PathBuf::from("build/classes"));
}

#[rstest]
#[case::default(&["trustload", "wipe"], 0, false)]
#[case::verbose_after_subcommand(&["trustload", "wipe", "-vv"], 2, false)]
#[case::verbose_before_subcommand(&["trustload", "-v", "wipe"], 1, false)]
#[case::quiet(&["trustload", "-q", "wipe"], 0, true)]
fn global_logging_flags(#[case] argv: &[&str], #[case] verbosity: u8, #[case] quiet: bool) {
    let cli = Cli::parse_from(argv);
    assert_eq!(cli.verbosity, verbosity);
    assert_eq!(cli.quiet, quiet);
}

#[test]
fn quiet_conflicts_with_verbose() {
    assert!(Cli::try_parse_from(["trustload", "-q", "-v", "wipe"]).is_err());
}
