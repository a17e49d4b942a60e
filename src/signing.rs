//! Signing identities and container packaging.
//!
//! Produces containers in the layout [`crate::container::Container`]
//! parses: code entries plus a signature block recording, per entry, its
//! SHA-256 digest and one detached signature per signer. Identities can be
//! generated as roots, can issue subordinate identities, and can be saved
//! to disk as JSON.

use crate::certificate::Certificate;
use crate::container::{
    ContainerError, EntryRecord, SIGNATURE_BLOCK_PATH, SIGNATURE_BLOCK_VERSION, SignatureBlock,
    SignatureRecord, SignerChain, signed_message,
};
use crate::names::ClassName;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use ed25519_dalek::{Signature, Signer as _, SigningKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use thiserror::Error;

/// Errors arising from loading or saving a signing identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Reading or writing the identity file failed.
    #[error("identity file {path}: {source}")]
    Io {
        /// The identity file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The identity document is malformed.
    #[error("invalid identity: {reason}")]
    Invalid {
        /// Description of the failure.
        reason: String,
    },
}

/// An Ed25519 signing key together with its certificate chain.
#[derive(Clone)]
pub struct SigningIdentity {
    signing_key: SigningKey,
    certificate: Certificate,
    issuers: Vec<Certificate>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IdentityDocument {
    secret_key: String,
    chain: Vec<String>,
}

impl SigningIdentity {
    /// Generate a fresh root identity whose certificate has no issuer.
    #[must_use]
    pub fn generate_root(subject: &str) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let certificate = Certificate::root(subject, signing_key.verifying_key());
        Self {
            signing_key,
            certificate,
            issuers: Vec::new(),
        }
    }

    /// Generate a subordinate identity whose certificate this identity signs.
    #[must_use]
    pub fn issue(&self, subject: &str) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let certificate =
            Certificate::issued(subject, signing_key.verifying_key(), &self.signing_key);
        let mut issuers = Vec::with_capacity(self.issuers.len() + 1);
        issuers.push(self.certificate.clone());
        issuers.extend(self.issuers.iter().cloned());
        Self {
            signing_key,
            certificate,
            issuers,
        }
    }

    /// Return the identity's own certificate.
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Return the chain presented when signing, leaf first.
    #[must_use]
    pub fn chain(&self) -> SignerChain {
        let mut certificates = Vec::with_capacity(self.issuers.len() + 1);
        certificates.push(self.certificate.clone());
        certificates.extend(self.issuers.iter().cloned());
        SignerChain::new(certificates)
    }

    /// Sign `message` with the identity key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// Serialise the identity, including its secret key, as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        let document = IdentityDocument {
            secret_key: STANDARD.encode(self.signing_key.to_bytes()),
            chain: self
                .chain()
                .certificates()
                .iter()
                .map(Certificate::to_pem)
                .collect(),
        };
        serde_json::to_string_pretty(&document).unwrap_or_default()
    }

    /// Parse an identity produced by [`Self::to_json`].
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Invalid`] if the document is malformed or
    /// the leaf certificate does not match the secret key.
    pub fn from_json(json: &str) -> Result<Self, IdentityError> {
        let document: IdentityDocument = serde_json::from_str(json).map_err(invalid)?;
        let secret = STANDARD.decode(&document.secret_key).map_err(invalid)?;
        let secret: [u8; 32] = secret.as_slice().try_into().map_err(|_| {
            invalid(format!("expected 32 secret key bytes, got {}", secret.len()))
        })?;
        let signing_key = SigningKey::from_bytes(&secret);

        let mut chain = document
            .chain
            .iter()
            .map(|pem| Certificate::from_pem(pem.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?
            .into_iter();
        let certificate = chain
            .next()
            .ok_or_else(|| invalid("identity chain is empty"))?;
        if certificate.public_key_bytes() != signing_key.verifying_key().as_bytes() {
            return Err(invalid("leaf certificate does not match the secret key"));
        }
        Ok(Self {
            signing_key,
            certificate,
            issuers: chain.collect(),
        })
    }

    /// Write the identity to `path`.
    ///
    /// The file is created owner-only (`0600` on Unix) beside `path` and
    /// renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Io`] when the file cannot be written.
    pub fn save(&self, path: &Utf8Path) -> Result<(), IdentityError> {
        let io_error = |source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_error)?;
        tmp.write_all(self.to_json().as_bytes()).map_err(io_error)?;
        tmp.persist(path).map_err(|err| io_error(err.error))?;
        Ok(())
    }

    /// Read an identity from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, IdentityError> {
        let json = std::fs::read_to_string(path).map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("certificate", &self.certificate)
            .field("issuers", &self.issuers.len())
            .finish_non_exhaustive()
    }
}

fn invalid(reason: impl ToString) -> IdentityError {
    IdentityError::Invalid {
        reason: reason.to_string(),
    }
}

/// Which entries a pending signer covers.
#[derive(Debug, Clone)]
enum SignerScope {
    All,
    Only(Vec<String>),
}

impl SignerScope {
    fn covers(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|candidate| candidate == name),
        }
    }
}

/// Builder for signed container archives.
///
/// # Examples
///
/// ```
/// use trustload::container::Container;
/// use trustload::signing::{ContainerBuilder, SigningIdentity};
///
/// let identity = SigningIdentity::generate_root("CN=Example");
/// let bytes = ContainerBuilder::new()
///     .add_entry("org/example/Main.class", b"code".to_vec())
///     .sign_all_with(&identity)
///     .build()
///     .unwrap();
/// let container = Container::from_bytes(&bytes).unwrap();
/// assert!(container.entry("org/example/Main.class").unwrap().is_signed());
/// ```
#[derive(Debug, Default, Clone)]
pub struct ContainerBuilder {
    entries: Vec<(String, Vec<u8>)>,
    signers: Vec<(SigningIdentity, SignerScope)>,
}

impl ContainerBuilder {
    /// Start an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry at `name`.
    #[must_use]
    pub fn add_entry(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.entries.push((name.into(), data));
        self
    }

    /// Append the entry holding `class`.
    #[must_use]
    pub fn add_class(self, class: &ClassName, data: Vec<u8>) -> Self {
        self.add_entry(class.entry_path(), data)
    }

    /// Append every file below `dir`, named by its path relative to `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Archive`] if the directory cannot be read
    /// or contains non-UTF-8 names.
    pub fn add_directory(mut self, dir: &Utf8Path) -> Result<Self, ContainerError> {
        let mut pending = vec![dir.to_path_buf()];
        let mut files = Vec::new();
        while let Some(current) = pending.pop() {
            for entry in current.read_dir_utf8()? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    pending.push(entry.into_path());
                } else {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        for path in files {
            let name = path
                .strip_prefix(dir)
                .map_err(|e| ContainerError::Archive {
                    reason: e.to_string(),
                })?
                .as_str()
                .replace('\\', "/");
            let data = std::fs::read(&path)?;
            self.entries.push((name, data));
        }
        Ok(self)
    }

    /// Sign every entry with `identity`.
    #[must_use]
    pub fn sign_all_with(mut self, identity: &SigningIdentity) -> Self {
        self.signers.push((identity.clone(), SignerScope::All));
        self
    }

    /// Sign only the named entries with `identity`.
    #[must_use]
    pub fn sign_entries_with(mut self, identity: &SigningIdentity, names: &[&str]) -> Self {
        let names = names.iter().map(|name| (*name).to_owned()).collect();
        self.signers
            .push((identity.clone(), SignerScope::Only(names)));
        self
    }

    /// Write the archive and its signature block.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Archive`] if the archive cannot be written.
    pub fn build(self) -> Result<Vec<u8>, ContainerError> {
        let block = self.signature_block();
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();

        for (name, data) in &self.entries {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        if !block.entries.is_empty() {
            let json =
                serde_json::to_vec_pretty(&block).map_err(|e| ContainerError::SignatureBlock {
                    reason: e.to_string(),
                })?;
            writer.start_file(SIGNATURE_BLOCK_PATH, options)?;
            writer.write_all(&json)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    fn signature_block(&self) -> SignatureBlock {
        let chains = self
            .signers
            .iter()
            .map(|(identity, _)| {
                identity
                    .chain()
                    .certificates()
                    .iter()
                    .map(Certificate::to_pem)
                    .collect()
            })
            .collect();

        let entries = self
            .entries
            .iter()
            .filter_map(|(name, data)| {
                let digest = Sha256::digest(data);
                let message = signed_message(name, &digest);
                let signatures: Vec<SignatureRecord> = self
                    .signers
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, scope))| scope.covers(name))
                    .map(|(chain, (identity, _))| SignatureRecord {
                        chain,
                        signature: STANDARD.encode(identity.sign(&message).to_bytes()),
                    })
                    .collect();
                (!signatures.is_empty()).then(|| EntryRecord {
                    name: name.clone(),
                    sha256: hex::encode(digest),
                    signatures,
                })
            })
            .collect();

        SignatureBlock {
            version: SIGNATURE_BLOCK_VERSION,
            chains,
            entries,
        }
    }
}
