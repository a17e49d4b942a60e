//! Trust certificates.
//!
//! A certificate binds a subject to an Ed25519 public key. Its identity is
//! the public key alone: two certificates with the same key are the same
//! trust anchor regardless of subject. A certificate may carry an issuer
//! link (the issuer's public key and its signature over this certificate),
//! which is checked when the certificate is parsed.
//!
//! Certificates travel as PEM-armoured, base64-encoded JSON documents.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Opening line of the certificate armour.
pub const PEM_BEGIN: &str = "-----BEGIN TRUSTLOAD CERTIFICATE-----";

/// Closing line of the certificate armour.
pub const PEM_END: &str = "-----END TRUSTLOAD CERTIFICATE-----";

/// Current certificate document version.
const DOCUMENT_VERSION: u32 = 1;

/// Domain separator for issuer signatures.
const TBS_CONTEXT: &[u8] = b"trustload-cert-v1";

/// Column width of the armoured base64 body.
const PEM_LINE_WIDTH: usize = 64;

/// Errors arising from parsing a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    /// No bytes were supplied.
    #[error("certificate is empty")]
    Empty,

    /// The armour lines are missing or out of order.
    #[error("certificate armour not found")]
    MissingArmour,

    /// The document could not be decoded.
    #[error("invalid certificate encoding: {reason}")]
    Encoding {
        /// Description of the decoding failure.
        reason: String,
    },

    /// The document declares a version this build does not understand.
    #[error("unsupported certificate version {version}")]
    UnsupportedVersion {
        /// The rejected version.
        version: u32,
    },

    /// A public key or signature has the wrong shape.
    #[error("invalid key material: {reason}")]
    InvalidKey {
        /// Description of the failure.
        reason: String,
    },

    /// The issuer signature does not cover this certificate.
    #[error("issuer signature does not verify for subject \"{subject}\"")]
    InvalidIssuerSignature {
        /// Subject of the rejected certificate.
        subject: String,
    },
}

/// An immutable trust anchor.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    subject: String,
    public_key: VerifyingKey,
    issuer: Option<IssuerLink>,
}

/// Link from a certificate to the key that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IssuerLink {
    public_key: VerifyingKey,
    signature: Signature,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct CertificateDocument {
    version: u32,
    subject: String,
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<IssuerDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct IssuerDocument {
    public_key: String,
    signature: String,
}

impl Certificate {
    /// Create a root certificate with no issuer link.
    pub(crate) fn root(subject: &str, public_key: VerifyingKey) -> Self {
        Self {
            subject: subject.to_owned(),
            public_key,
            issuer: None,
        }
    }

    /// Create a certificate for `public_key` signed by `issuer`.
    pub(crate) fn issued(subject: &str, public_key: VerifyingKey, issuer: &SigningKey) -> Self {
        let signature = issuer.sign(&tbs_bytes(subject, &public_key));
        Self {
            subject: subject.to_owned(),
            public_key,
            issuer: Some(IssuerLink {
                public_key: issuer.verifying_key(),
                signature,
            }),
        }
    }

    /// Parse a PEM-armoured certificate.
    ///
    /// # Errors
    ///
    /// Returns [`CertificateError`] when the bytes are empty, the armour or
    /// encoding is broken, the key material is invalid, or the issuer
    /// signature does not verify.
    pub fn from_pem(bytes: &[u8]) -> Result<Self, CertificateError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CertificateError::Empty);
        }
        let text = std::str::from_utf8(bytes).map_err(|e| CertificateError::Encoding {
            reason: e.to_string(),
        })?;
        let body = armoured_body(text)?;
        let json = STANDARD
            .decode(body)
            .map_err(|e| CertificateError::Encoding {
                reason: e.to_string(),
            })?;
        let document: CertificateDocument =
            serde_json::from_slice(&json).map_err(|e| CertificateError::Encoding {
                reason: e.to_string(),
            })?;
        Self::from_document(document)
    }

    /// Encode the certificate as PEM text.
    #[must_use]
    pub fn to_pem(&self) -> String {
        let document = CertificateDocument {
            version: DOCUMENT_VERSION,
            subject: self.subject.clone(),
            public_key: STANDARD.encode(self.public_key.as_bytes()),
            issuer: self.issuer.as_ref().map(|link| IssuerDocument {
                public_key: STANDARD.encode(link.public_key.as_bytes()),
                signature: STANDARD.encode(link.signature.to_bytes()),
            }),
        };
        // Serialising plain strings into JSON cannot fail.
        let json = serde_json::to_vec(&document).unwrap_or_default();
        let encoded = STANDARD.encode(json);

        let mut pem = String::with_capacity(encoded.len() + PEM_BEGIN.len() * 3);
        pem.push_str(PEM_BEGIN);
        pem.push('\n');
        for chunk in encoded.as_bytes().chunks(PEM_LINE_WIDTH) {
            pem.push_str(&String::from_utf8_lossy(chunk));
            pem.push('\n');
        }
        pem.push_str(PEM_END);
        pem.push('\n');
        pem
    }

    /// Return the certificate subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Return the raw public key bytes that identify this certificate.
    #[must_use]
    pub fn public_key_bytes(&self) -> &[u8; 32] {
        self.public_key.as_bytes()
    }

    /// Return the lowercase hex SHA-256 digest of the public key.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.public_key.as_bytes()))
    }

    /// Return whether `other` is the same trust anchor.
    #[must_use]
    pub fn same_identity(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }

    /// Return whether this certificate was issued by `issuer`.
    ///
    /// The issuer signature was checked at parse time, so this only has to
    /// match the issuer's identity.
    #[must_use]
    pub fn is_issued_by(&self, issuer: &Self) -> bool {
        self.issuer
            .as_ref()
            .is_some_and(|link| link.public_key == issuer.public_key)
    }

    /// Verify a detached signature by this certificate's key.
    #[must_use]
    pub fn verifies(&self, message: &[u8], signature: &Signature) -> bool {
        self.public_key.verify_strict(message, signature).is_ok()
    }

    fn from_document(document: CertificateDocument) -> Result<Self, CertificateError> {
        if document.version != DOCUMENT_VERSION {
            return Err(CertificateError::UnsupportedVersion {
                version: document.version,
            });
        }
        let public_key = decode_verifying_key(&document.public_key)?;
        let issuer = match document.issuer {
            Some(link) => {
                let issuer_key = decode_verifying_key(&link.public_key)?;
                let signature = decode_signature(&link.signature)?;
                let tbs = tbs_bytes(&document.subject, &public_key);
                if issuer_key.verify_strict(&tbs, &signature).is_err() {
                    return Err(CertificateError::InvalidIssuerSignature {
                        subject: document.subject,
                    });
                }
                Some(IssuerLink {
                    public_key: issuer_key,
                    signature,
                })
            }
            None => None,
        };
        Ok(Self {
            subject: document.subject,
            public_key,
            issuer,
        })
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("fingerprint", &self.fingerprint())
            .field("issued", &self.issuer.is_some())
            .finish()
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.subject, self.fingerprint())
    }
}

/// Decode a base64 Ed25519 signature.
pub(crate) fn decode_signature(encoded: &str) -> Result<Signature, CertificateError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CertificateError::InvalidKey {
            reason: format!("invalid signature base64: {e}"),
        })?;
    Signature::from_slice(&bytes).map_err(|e| CertificateError::InvalidKey {
        reason: format!("invalid signature: {e}"),
    })
}

fn decode_verifying_key(encoded: &str) -> Result<VerifyingKey, CertificateError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| CertificateError::InvalidKey {
            reason: format!("invalid public key base64: {e}"),
        })?;
    let key_bytes: [u8; 32] =
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| CertificateError::InvalidKey {
                reason: format!("expected 32 bytes, got {}", bytes.len()),
            })?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|e| CertificateError::InvalidKey {
        reason: e.to_string(),
    })
}

fn armoured_body(text: &str) -> Result<String, CertificateError> {
    let (_, after_begin) = text
        .split_once(PEM_BEGIN)
        .ok_or(CertificateError::MissingArmour)?;
    let (body, _) = after_begin
        .split_once(PEM_END)
        .ok_or(CertificateError::MissingArmour)?;
    Ok(body.chars().filter(|c| !c.is_ascii_whitespace()).collect())
}

fn tbs_bytes(subject: &str, public_key: &VerifyingKey) -> Vec<u8> {
    let mut tbs = Vec::with_capacity(TBS_CONTEXT.len() + subject.len() + 34);
    tbs.extend_from_slice(TBS_CONTEXT);
    tbs.push(0);
    tbs.extend_from_slice(subject.as_bytes());
    tbs.push(0);
    tbs.extend_from_slice(public_key.as_bytes());
    tbs
}
