//! Validated package and class names.
//!
//! Both types wrap dotted identifiers such as `org.example.app` and
//! `org.example.app.Main`. Each dot-separated segment must be a valid
//! identifier token: it starts with an ASCII letter, `_`, or `$`, and
//! continues with ASCII alphanumerics, `_`, or `$`.

use std::fmt;
use thiserror::Error;

/// Suffix appended to a class path to locate its entry inside a container.
pub const CLASS_ENTRY_SUFFIX: &str = ".class";

/// Errors arising from invalid package or class names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// The name was empty or whitespace only.
    #[error("name must not be empty")]
    Empty,

    /// A segment between dots was empty (for example `org..app`).
    #[error("name \"{value}\" contains an empty segment")]
    EmptySegment {
        /// The rejected name.
        value: String,
    },

    /// A segment contained a character outside the identifier alphabet.
    #[error("segment \"{segment}\" of \"{value}\" is not a valid identifier")]
    InvalidSegment {
        /// The rejected name.
        value: String,
        /// The offending segment.
        segment: String,
    },
}

/// A dotted package namespace, for example `org.example.app`.
///
/// # Examples
///
/// ```
/// use trustload::names::PackageName;
///
/// let pkg = PackageName::try_from("org.example.app").unwrap();
/// assert_eq!(pkg.segments().collect::<Vec<_>>(), ["org", "example", "app"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageName(String);

impl PackageName {
    /// Return the package name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dot-separated segments in declaration order.
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.split('.')
    }

    /// Consume the wrapper and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<&str> for PackageName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_dotted(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for PackageName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_dotted(&value)?;
        Ok(Self(value))
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully qualified class name, for example `org.example.app.Main`.
///
/// The owning package is every segment except the last. A class declared
/// without a package has no owner and therefore can never be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassName(String);

impl ClassName {
    /// Return the class name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the package that declares this class, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use trustload::names::ClassName;
    ///
    /// let class = ClassName::try_from("org.example.app.Main").unwrap();
    /// assert_eq!(class.package().unwrap().as_str(), "org.example.app");
    /// assert!(ClassName::try_from("Main").unwrap().package().is_none());
    /// ```
    #[must_use]
    pub fn package(&self) -> Option<PackageName> {
        self.0
            .rsplit_once('.')
            .map(|(package, _)| PackageName(package.to_owned()))
    }

    /// Return the unqualified class name.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Return the container entry path holding this class.
    ///
    /// `org.example.app.Main` maps to `org/example/app/Main.class`.
    #[must_use]
    pub fn entry_path(&self) -> String {
        format!("{}{CLASS_ENTRY_SUFFIX}", self.0.replace('.', "/"))
    }
}

impl TryFrom<&str> for ClassName {
    type Error = NameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        validate_dotted(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl AsRef<str> for ClassName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_dotted(value: &str) -> Result<(), NameError> {
    if value.trim().is_empty() {
        return Err(NameError::Empty);
    }
    for segment in value.split('.') {
        if segment.is_empty() {
            return Err(NameError::EmptySegment {
                value: value.to_owned(),
            });
        }
        if !is_identifier(segment) {
            return Err(NameError::InvalidSegment {
                value: value.to_owned(),
                segment: segment.to_owned(),
            });
        }
    }
    Ok(())
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
