//! Output formatting for the `trustload` CLI.

use std::io::Write;

use trustload::ClassHandle;
use trustload::certificate::Certificate;

/// Format the summary printed after a successful load.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use trustload::ClassHandle;
/// use trustload::location::Location;
/// use trustload::names::ClassName;
/// use trustload_cli::output::load_summary;
///
/// let name = ClassName::try_from("org.example.app.Main").unwrap();
/// let origin = Location::Local(Utf8PathBuf::from("/srv/app.jar"));
/// let handle = ClassHandle::new(name, b"class".to_vec(), origin);
///
/// let summary = load_summary(&handle);
/// assert!(summary.starts_with("class:  org.example.app.Main\n"));
/// assert!(summary.contains("size:   5 bytes"));
/// ```
#[must_use]
pub fn load_summary(handle: &ClassHandle) -> String {
    format!(
        concat!(
            "class:  {}\n",
            "origin: {}\n",
            "size:   {} bytes\n",
            "sha256: {}",
        ),
        handle.name(),
        handle.origin(),
        handle.len(),
        handle.digest()
    )
}

/// Format the confirmation printed after a wipe.
#[must_use]
pub fn wipe_summary(containers: bool, certificates: bool) -> String {
    match (containers, certificates) {
        (true, true) => String::from("Wiped container and certificate caches"),
        (true, false) => String::from("Wiped container cache"),
        (false, true) => String::from("Wiped certificate cache"),
        (false, false) => String::from("Nothing to wipe"),
    }
}

/// Format the line describing a freshly generated certificate.
#[must_use]
pub fn certificate_summary(certificate: &Certificate) -> String {
    format!(
        "Generated identity for {} (fingerprint {})",
        certificate.subject(),
        certificate.fingerprint()
    )
}

/// Write a line to `stream`, ignoring write failures.
pub fn write_line(stream: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stream, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}
