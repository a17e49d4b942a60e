//! Signature verification of parsed containers.
//!
//! Verification is pure: it inspects an already-parsed [`Container`]
//! against one trusted [`Certificate`] and performs no I/O. A container
//! passes only when every signer attached to every signed entry checks out
//! and at least one entry was checked. A single failing signer fails the
//! whole container.

use crate::certificate::Certificate;
use crate::container::{Container, ContainerEntry, EntrySigner, signed_message};
use thiserror::Error;

/// The reason a container failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    /// The container holds no signed entries.
    #[error("container has no signed entries")]
    NoSignedEntries,

    /// An entry's bytes do not match the digest its signer recorded.
    #[error("digest mismatch for entry {entry}")]
    DigestMismatch {
        /// The tampered entry.
        entry: String,
    },

    /// A signature does not verify under the signer's leaf certificate.
    #[error("invalid signature on entry {entry}")]
    BadSignature {
        /// The entry carrying the bad signature.
        entry: String,
    },

    /// A certificate in the signer's chain is not issued by its successor.
    #[error("broken certificate chain on entry {entry}")]
    BrokenChain {
        /// The entry whose signer presented the broken chain.
        entry: String,
    },

    /// The signer's chain never reaches the trusted certificate.
    #[error("entry {entry} is signed by an untrusted certificate")]
    UntrustedSigner {
        /// The entry signed by an untrusted signer.
        entry: String,
    },
}

/// The result of checking a container against a trusted certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Every signer checked out.
    Passed {
        /// Number of signed entries that were checked.
        checked_entries: usize,
    },
    /// At least one check failed.
    Failed(VerificationFailure),
}

impl VerificationOutcome {
    /// Return whether verification passed.
    #[must_use]
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// A container that passed verification.
///
/// Only [`verify_container`] constructs this type, and it exposes signed
/// entries only.
#[derive(Debug, Clone)]
pub struct VerifiedContainer {
    container: Container,
    trusted: Certificate,
}

impl VerifiedContainer {
    /// Look up a signed entry by archive path.
    ///
    /// Entries without signer information are never returned.
    #[must_use]
    pub fn signed_entry(&self, name: &str) -> Option<&ContainerEntry> {
        self.container
            .entry(name)
            .filter(|entry| entry.is_signed())
    }

    /// Iterate over the signed entries.
    pub fn signed_entries(&self) -> impl Iterator<Item = &ContainerEntry> {
        self.container
            .entries()
            .iter()
            .filter(|entry| entry.is_signed())
    }

    /// Return the certificate the container was verified against.
    #[must_use]
    pub fn trusted_certificate(&self) -> &Certificate {
        &self.trusted
    }
}

/// Check `container` against the `trusted` certificate.
#[must_use]
pub fn verify(container: &Container, trusted: &Certificate) -> VerificationOutcome {
    match check(container, trusted) {
        Ok(checked_entries) => VerificationOutcome::Passed { checked_entries },
        Err(failure) => VerificationOutcome::Failed(failure),
    }
}

/// Check `container` and wrap it as a [`VerifiedContainer`] if it passes.
///
/// # Errors
///
/// Returns the first [`VerificationFailure`] encountered.
pub fn verify_container(
    container: Container,
    trusted: &Certificate,
) -> Result<VerifiedContainer, VerificationFailure> {
    check(&container, trusted)?;
    Ok(VerifiedContainer {
        container,
        trusted: trusted.clone(),
    })
}

fn check(container: &Container, trusted: &Certificate) -> Result<usize, VerificationFailure> {
    let mut checked_entries = 0;
    for entry in container.entries().iter().filter(|entry| entry.is_signed()) {
        let digest = entry.digest();
        let message = signed_message(entry.name(), &digest);
        for signer in entry.signers() {
            check_signer(entry.name(), &digest, &message, signer, trusted)?;
        }
        checked_entries += 1;
    }
    if checked_entries == 0 {
        return Err(VerificationFailure::NoSignedEntries);
    }
    Ok(checked_entries)
}

fn check_signer(
    name: &str,
    digest: &[u8],
    message: &[u8],
    signer: &EntrySigner,
    trusted: &Certificate,
) -> Result<(), VerificationFailure> {
    if signer.recorded_digest() != digest {
        return Err(VerificationFailure::DigestMismatch {
            entry: name.to_owned(),
        });
    }

    let certificates = signer.chain().certificates();
    let leaf = certificates
        .first()
        .ok_or_else(|| VerificationFailure::BrokenChain {
            entry: name.to_owned(),
        })?;
    if !leaf.verifies(message, signer.signature()) {
        return Err(VerificationFailure::BadSignature {
            entry: name.to_owned(),
        });
    }

    // Walk towards the root until the trusted identity appears; every link
    // below it must be issued by its successor.
    for (index, certificate) in certificates.iter().enumerate() {
        if certificate.same_identity(trusted) {
            return Ok(());
        }
        match certificates.get(index + 1) {
            Some(issuer) if certificate.is_issued_by(issuer) => {}
            Some(_) => {
                return Err(VerificationFailure::BrokenChain {
                    entry: name.to_owned(),
                });
            }
            None if certificate.is_issued_by(trusted) => return Ok(()),
            None => break,
        }
    }
    Err(VerificationFailure::UntrustedSigner {
        entry: name.to_owned(),
    })
}
