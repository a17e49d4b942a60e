//! Location resolution for containers and certificates.
//!
//! Raw strings supplied by callers are resolved into a [`Location`] before
//! anything is fetched. Resolution enforces secure transport: `http` URLs
//! are upgraded to `https` without contacting the server, and any other
//! scheme (including near-miss typos such as `htt`) is rejected as
//! malformed rather than repaired.

use crate::filesystem::FileSystem;
use crate::names::PackageName;
use crate::transport::SECURE_SCHEME;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Separator between entries of a location list.
pub const LOCATION_LIST_SEPARATOR: char = ':';

/// Well-known path under which a derived certificate location is served.
pub const WELL_KNOWN_CERTIFICATE_PATH: &str = "/certificate.pem";

/// The plaintext scheme that is silently upgraded.
const PLAINTEXT_SCHEME: &str = "http";

/// Default port of the plaintext scheme, dropped during the upgrade.
const PLAINTEXT_PORT: u16 = 80;

/// A resolved reference to a container or certificate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// An existing file on the local filesystem.
    Local(Utf8PathBuf),
    /// An `https` URL.
    Remote(Url),
}

/// Location of a code container.
pub type ContainerLocation = Location;

/// Location of a trust certificate.
pub type CertificateLocation = Location;

impl Location {
    /// Return whether the location is fetched over the network.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Return the string used to key cached payloads for this location.
    #[must_use]
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{path}"),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// Errors arising from resolving a raw location string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The input is neither an existing absolute path nor a usable URL.
    #[error("malformed location \"{raw}\": {reason}")]
    Malformed {
        /// The rejected input.
        raw: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// The input is an absolute path but no file exists there.
    #[error("no file exists at {path}")]
    MissingFile {
        /// The missing path.
        path: Utf8PathBuf,
    },
}

/// Resolve a raw path or URL into a [`Location`].
///
/// # Errors
///
/// Returns [`LocationError::MissingFile`] for absolute paths that do not
/// exist and [`LocationError::Malformed`] for anything that is not an
/// `http`/`https` URL with a host.
///
/// # Examples
///
/// ```
/// use trustload::filesystem::LocalFileSystem;
/// use trustload::location::{Location, resolve};
///
/// let location = resolve("http://example.org/app.jar", &LocalFileSystem).unwrap();
/// assert_eq!(location.to_string(), "https://example.org/app.jar");
/// assert!(resolve("htt://example.org/app.jar", &LocalFileSystem).is_err());
/// ```
pub fn resolve(raw: &str, fs: &dyn FileSystem) -> Result<Location, LocationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(malformed(raw, "location is empty"));
    }

    let path = Utf8Path::new(trimmed);
    if path.is_absolute() {
        if fs.is_file(path) {
            return Ok(Location::Local(path.to_path_buf()));
        }
        return Err(LocationError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let mut url = Url::parse(trimmed).map_err(|e| malformed(raw, &e.to_string()))?;
    if !has_explicit_authority(trimmed, url.scheme()) {
        return Err(malformed(raw, "expected scheme://host"));
    }
    match url.scheme() {
        SECURE_SCHEME => {}
        PLAINTEXT_SCHEME => upgrade_to_secure(&mut url, raw)?,
        other => {
            return Err(malformed(
                raw,
                &format!("unsupported scheme \"{other}\"; expected http or https"),
            ));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(malformed(raw, "URL has no host"));
    }
    Ok(Location::Remote(url))
}

/// The URL parser repairs `https:host`, `https:/host`, and backslash
/// separators; only the literal `scheme://` form is accepted.
fn has_explicit_authority(trimmed: &str, scheme: &str) -> bool {
    let prefix_len = scheme.len() + "://".len();
    let prefix_matches = trimmed.get(..prefix_len).is_some_and(|prefix| {
        prefix.eq_ignore_ascii_case(&format!("{scheme}://"))
    });
    prefix_matches && !trimmed.contains('\\')
}

/// Derive the default certificate location for `package`.
///
/// The dotted segments are reversed into a hostname and the well-known
/// certificate path is appended under `https`, so `org.example.app` maps
/// to `https://app.example.org/certificate.pem`.
///
/// # Errors
///
/// Returns [`LocationError::Malformed`] if the reversed name is not a
/// valid hostname.
pub fn derive_default_certificate_location(
    package: &PackageName,
) -> Result<CertificateLocation, LocationError> {
    let host = package.segments().rev().collect::<Vec<_>>().join(".");
    let raw = format!("{SECURE_SCHEME}://{host}{WELL_KNOWN_CERTIFICATE_PATH}");
    Url::parse(&raw)
        .map(Location::Remote)
        .map_err(|e| malformed(&raw, &e.to_string()))
}

/// Split a `:`-separated location list into raw entries.
///
/// URL scheme separators (`https://`) and port numbers (`host:8443`) are
/// re-joined so that remote entries survive the split. Blank entries are
/// dropped.
///
/// # Examples
///
/// ```
/// use trustload::location::split_location_list;
///
/// let parts = split_location_list("/data/a.jar:https://example.org:8443/b.jar");
/// assert_eq!(parts, ["/data/a.jar", "https://example.org:8443/b.jar"]);
/// ```
#[must_use]
pub fn split_location_list(raw: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for token in raw.split(LOCATION_LIST_SEPARATOR) {
        match parts.last_mut() {
            Some(previous) if continues_previous(previous, token) => {
                previous.push(LOCATION_LIST_SEPARATOR);
                previous.push_str(token);
            }
            _ => parts.push(token.to_owned()),
        }
    }
    parts
        .into_iter()
        .map(|part| part.trim().to_owned())
        .filter(|part| !part.is_empty())
        .collect()
}

fn continues_previous(previous: &str, token: &str) -> bool {
    let previous = previous.trim();
    let is_scheme = !previous.is_empty() && previous.chars().all(|c| c.is_ascii_alphabetic());
    if is_scheme && token.starts_with("//") {
        return true;
    }
    let authority_is_open = previous
        .split_once("://")
        .is_some_and(|(_, rest)| !rest.contains('/'));
    authority_is_open && token.starts_with(|c: char| c.is_ascii_digit())
}

fn upgrade_to_secure(url: &mut Url, raw: &str) -> Result<(), LocationError> {
    if url.port() == Some(PLAINTEXT_PORT) {
        url.set_port(None)
            .map_err(|()| malformed(raw, "cannot drop plaintext port"))?;
    }
    url.set_scheme(SECURE_SCHEME)
        .map_err(|()| malformed(raw, "cannot upgrade to https"))?;
    log::debug!("upgraded {raw} to {url}");
    Ok(())
}

fn malformed(raw: &str, reason: &str) -> LocationError {
    LocationError::Malformed {
        raw: raw.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::LocalFileSystem;
    use rstest::rstest;

    fn remote(raw: &str) -> Location {
        Location::Remote(Url::parse(raw).expect("valid URL"))
    }

    #[test]
    fn existing_absolute_path_is_local() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("app.jar")).expect("UTF-8 path");
        std::fs::write(&path, b"zip").expect("write container");

        let location = resolve(path.as_str(), &LocalFileSystem).expect("resolve local");
        assert_eq!(location, Location::Local(path));
        assert!(!location.is_remote());
    }

    #[test]
    fn missing_absolute_path_is_reported() {
        let result = resolve("/no/such/dir/app.jar", &LocalFileSystem);
        assert!(matches!(result, Err(LocationError::MissingFile { .. })));
    }

    #[rstest]
    #[case::plain("http://google.com/test_cert.pem", "https://google.com/test_cert.pem")]
    #[case::default_port("http://example.org:80/a.jar", "https://example.org/a.jar")]
    #[case::secure("https://example.org/a.jar", "https://example.org/a.jar")]
    #[case::custom_port("https://example.org:8443/a.jar", "https://example.org:8443/a.jar")]
    fn urls_resolve_to_https(#[case] raw: &str, #[case] expected: &str) {
        let location = resolve(raw, &LocalFileSystem).expect("resolve URL");
        assert_eq!(location, remote(expected));
    }

    #[rstest]
    #[case::truncated_scheme("htt://google.com/test_cert2.pem")]
    #[case::ftp("ftp://example.org/a.jar")]
    #[case::relative("Download/testApp.apk")]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::no_host("https://")]
    #[case::missing_slashes("https:host.example/cert.pem")]
    #[case::single_slash("https:/host.example/cert.pem")]
    #[case::plaintext_missing_slashes("http:host.example/cert.pem")]
    #[case::backslashes("https:\\\\host.example\\cert.pem")]
    #[case::backslash_in_path("https://host.example\\cert.pem")]
    fn malformed_inputs_are_rejected(#[case] raw: &str) {
        let result = resolve(raw, &LocalFileSystem);
        assert!(
            matches!(result, Err(LocationError::Malformed { .. })),
            "expected Malformed for {raw:?}, got {result:?}"
        );
    }

    #[rstest]
    #[case::three_segments("org.example.app", "https://app.example.org/certificate.pem")]
    #[case::demo("it.polimi.example3", "https://example3.polimi.it/certificate.pem")]
    #[case::single("localhost", "https://localhost/certificate.pem")]
    fn derives_reversed_host(#[case] package: &str, #[case] expected: &str) {
        let package = PackageName::try_from(package).expect("valid package");
        let derived = derive_default_certificate_location(&package).expect("derive");
        assert_eq!(derived, remote(expected));
    }

    #[test]
    fn derivation_is_deterministic() {
        let package = PackageName::try_from("org.example.app").expect("valid package");
        let first = derive_default_certificate_location(&package).expect("derive");
        let second = derive_default_certificate_location(&package).expect("derive");
        assert_eq!(first, second);
    }

    #[rstest]
    #[case::locals("/a.jar:/b.jar", &["/a.jar", "/b.jar"])]
    #[case::mixed(
        "/sdcard/testApp.apk:/sdcard/app.apk:http://jdbc.postgresql.org/pg.jar",
        &["/sdcard/testApp.apk", "/sdcard/app.apk", "http://jdbc.postgresql.org/pg.jar"]
    )]
    #[case::remote_first("http://google.com/testApp2.apk:/sdcard/signed.apk", &["http://google.com/testApp2.apk", "/sdcard/signed.apk"])]
    #[case::port("https://host:8443/a.jar:/b.jar", &["https://host:8443/a.jar", "/b.jar"])]
    #[case::blanks("::/a.jar: :", &["/a.jar"])]
    #[case::typo_scheme("htt://bad/x.pem", &["htt://bad/x.pem"])]
    fn splits_location_lists(#[case] raw: &str, #[case] expected: &[&str]) {
        assert_eq!(split_location_list(raw), expected);
    }
}
