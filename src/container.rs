//! Code containers and their signature data.
//!
//! A container is a zip archive. Code entries live at paths derived from
//! class names (`org/example/Main.class`); signature data lives in a JSON
//! signature block at [`SIGNATURE_BLOCK_PATH`]. Parsing attaches every
//! recorded signer to its entry but checks nothing: trust decisions belong
//! to [`crate::verifier`].

use crate::certificate::{Certificate, decode_signature};
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Component, Path};
use thiserror::Error;

/// Archive path of the signature block.
pub const SIGNATURE_BLOCK_PATH: &str = "META-INF/TRUSTLOAD.SIG";

/// Entries under this prefix are metadata, never code.
pub const METADATA_PREFIX: &str = "META-INF/";

/// Current signature block version.
pub(crate) const SIGNATURE_BLOCK_VERSION: u32 = 1;

/// Errors arising from parsing a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// The bytes are not a readable zip archive.
    #[error("unreadable container archive: {reason}")]
    Archive {
        /// Description of the archive failure.
        reason: String,
    },

    /// An entry name escapes the archive root.
    #[error("unsafe entry name: {name}")]
    UnsafeEntryName {
        /// The offending entry name.
        name: String,
    },

    /// The signature block is present but malformed.
    #[error("malformed signature block: {reason}")]
    SignatureBlock {
        /// Description of the failure.
        reason: String,
    },
}

impl From<zip::result::ZipError> for ContainerError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Archive {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ContainerError {
    fn from(err: std::io::Error) -> Self {
        Self::Archive {
            reason: err.to_string(),
        }
    }
}

/// On-disk layout of the signature block.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SignatureBlock {
    pub(crate) version: u32,
    pub(crate) chains: Vec<Vec<String>>,
    pub(crate) entries: Vec<EntryRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntryRecord {
    pub(crate) name: String,
    pub(crate) sha256: String,
    pub(crate) signatures: Vec<SignatureRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SignatureRecord {
    pub(crate) chain: usize,
    pub(crate) signature: String,
}

/// Certificates presented by a signer, leaf first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerChain(Vec<Certificate>);

impl SignerChain {
    /// Wrap an ordered list of certificates, leaf first.
    #[must_use]
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self(certificates)
    }

    /// Return the signing certificate.
    #[must_use]
    pub fn leaf(&self) -> Option<&Certificate> {
        self.0.first()
    }

    /// Return the certificates in chain order.
    #[must_use]
    pub fn certificates(&self) -> &[Certificate] {
        &self.0
    }
}

/// One signer attached to an entry.
#[derive(Debug, Clone)]
pub struct EntrySigner {
    chain: SignerChain,
    recorded_digest: Vec<u8>,
    signature: Signature,
}

impl EntrySigner {
    /// Return the signer's certificate chain.
    #[must_use]
    pub fn chain(&self) -> &SignerChain {
        &self.chain
    }

    /// Return the entry digest the signer claims to have signed.
    #[must_use]
    pub fn recorded_digest(&self) -> &[u8] {
        &self.recorded_digest
    }

    /// Return the detached signature.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// A code entry and the signers attached to it.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    name: String,
    data: Vec<u8>,
    signers: Vec<EntrySigner>,
}

impl ContainerEntry {
    /// Return the archive path of the entry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the entry bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Return the attached signers.
    #[must_use]
    pub fn signers(&self) -> &[EntrySigner] {
        &self.signers
    }

    /// Return whether any signer information is attached.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        !self.signers.is_empty()
    }

    /// Compute the SHA-256 digest of the entry bytes.
    #[must_use]
    pub fn digest(&self) -> Vec<u8> {
        Sha256::digest(&self.data).to_vec()
    }
}

/// An ordered collection of code entries parsed from an archive.
#[derive(Debug, Clone, Default)]
pub struct Container {
    entries: Vec<ContainerEntry>,
}

impl Container {
    /// Parse a zip archive and attach the recorded signers to its entries.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError`] if the archive cannot be read, an entry
    /// name escapes the archive root, or the signature block is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContainerError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut raw_entries = Vec::new();
        let mut block_bytes = None;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_owned();
            validate_entry_name(&name)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;

            if name == SIGNATURE_BLOCK_PATH {
                block_bytes = Some(data);
            } else if !name.starts_with(METADATA_PREFIX) {
                raw_entries.push((name, data));
            }
        }

        let mut signers_by_entry = match block_bytes {
            Some(bytes) => parse_signature_block(&bytes)?,
            None => HashMap::new(),
        };
        let entries = raw_entries
            .into_iter()
            .map(|(name, data)| ContainerEntry {
                signers: signers_by_entry.remove(&name).unwrap_or_default(),
                name,
                data,
            })
            .collect();
        for orphan in signers_by_entry.keys() {
            log::debug!("signature block names missing entry {orphan}");
        }
        Ok(Self { entries })
    }

    /// Return the entries in archive order.
    #[must_use]
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    /// Look up an entry by archive path.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&ContainerEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Return whether the container holds no code entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the message an entry signature covers.
pub(crate) fn signed_message(name: &str, digest: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(name.len() + 1 + digest.len());
    message.extend_from_slice(name.as_bytes());
    message.push(0);
    message.extend_from_slice(digest);
    message
}

fn parse_signature_block(
    bytes: &[u8],
) -> Result<HashMap<String, Vec<EntrySigner>>, ContainerError> {
    let block: SignatureBlock =
        serde_json::from_slice(bytes).map_err(|e| ContainerError::SignatureBlock {
            reason: e.to_string(),
        })?;
    if block.version != SIGNATURE_BLOCK_VERSION {
        return Err(ContainerError::SignatureBlock {
            reason: format!("unsupported version {}", block.version),
        });
    }

    let chains = block
        .chains
        .iter()
        .map(|pems| parse_chain(pems))
        .collect::<Result<Vec<_>, _>>()?;

    let mut signers_by_entry = HashMap::new();
    for record in block.entries {
        let recorded_digest =
            hex::decode(&record.sha256).map_err(|e| ContainerError::SignatureBlock {
                reason: format!("invalid digest for {}: {e}", record.name),
            })?;
        let mut signers = Vec::with_capacity(record.signatures.len());
        for signature_record in &record.signatures {
            let chain = chains.get(signature_record.chain).ok_or_else(|| {
                ContainerError::SignatureBlock {
                    reason: format!(
                        "entry {} references unknown chain {}",
                        record.name, signature_record.chain
                    ),
                }
            })?;
            let signature = decode_signature(&signature_record.signature).map_err(|e| {
                ContainerError::SignatureBlock {
                    reason: format!("entry {}: {e}", record.name),
                }
            })?;
            signers.push(EntrySigner {
                chain: chain.clone(),
                recorded_digest: recorded_digest.clone(),
                signature,
            });
        }
        signers_by_entry.insert(record.name, signers);
    }
    Ok(signers_by_entry)
}

fn parse_chain(pems: &[String]) -> Result<SignerChain, ContainerError> {
    if pems.is_empty() {
        return Err(ContainerError::SignatureBlock {
            reason: "empty certificate chain".to_owned(),
        });
    }
    pems.iter()
        .map(|pem| Certificate::from_pem(pem.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .map(SignerChain)
        .map_err(|e| ContainerError::SignatureBlock {
            reason: e.to_string(),
        })
}

/// Reject entry names that are absolute or climb out via `..`.
fn validate_entry_name(name: &str) -> Result<(), ContainerError> {
    let path = Path::new(name);
    let escapes = name.starts_with('/')
        || name.contains('\\')
        || path
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ContainerError::UnsafeEntryName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{ContainerBuilder, SigningIdentity};
    use rstest::rstest;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer
                .start_file(*name, zip::write::SimpleFileOptions::default())
                .expect("start file");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }

    #[test]
    fn unsigned_archive_has_entries_without_signers() {
        let bytes = zip_with(&[("org/example/Main.class", b"code")]);
        let container = Container::from_bytes(&bytes).expect("parse container");

        let entry = container
            .entry("org/example/Main.class")
            .expect("entry present");
        assert!(!entry.is_signed());
        assert_eq!(entry.data(), b"code");
    }

    #[test]
    fn metadata_entries_are_not_code() {
        let bytes = zip_with(&[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
            ("org/example/Main.class", b"code"),
        ]);
        let container = Container::from_bytes(&bytes).expect("parse container");
        assert_eq!(container.entries().len(), 1);
    }

    #[test]
    fn signed_archive_attaches_signers() {
        let identity = SigningIdentity::generate_root("CN=Dev");
        let bytes = ContainerBuilder::new()
            .add_entry("org/example/Main.class", b"code".to_vec())
            .sign_all_with(&identity)
            .build()
            .expect("build container");

        let container = Container::from_bytes(&bytes).expect("parse container");
        let entry = container
            .entry("org/example/Main.class")
            .expect("entry present");
        assert_eq!(entry.signers().len(), 1);
        assert_eq!(entry.signers()[0].recorded_digest(), entry.digest());
    }

    #[test]
    fn garbage_is_not_an_archive() {
        let result = Container::from_bytes(b"<html>not found</html>");
        assert!(matches!(result, Err(ContainerError::Archive { .. })));
    }

    #[test]
    fn malformed_signature_block_is_rejected() {
        let bytes = zip_with(&[
            (SIGNATURE_BLOCK_PATH, b"{not json"),
            ("org/example/Main.class", b"code"),
        ]);
        let result = Container::from_bytes(&bytes);
        assert!(matches!(result, Err(ContainerError::SignatureBlock { .. })));
    }

    #[rstest]
    #[case::parent("../escape.class")]
    #[case::nested_parent("org/../../escape.class")]
    #[case::absolute("/etc/passwd")]
    #[case::backslash("org\\..\\escape.class")]
    fn rejects_unsafe_entry_names(#[case] name: &str) {
        assert!(matches!(
            validate_entry_name(name),
            Err(ContainerError::UnsafeEntryName { .. })
        ));
    }

    #[test]
    fn accepts_nested_entry_names() {
        assert!(validate_entry_name("org/example/Outer$Inner.class").is_ok());
    }
}
