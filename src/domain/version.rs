use crate::error::{ReleaseError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

const GRAMMAR: &str = "expected MAJOR.MINOR.PATCH[bBETA][-dev]";

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:b(\d+))?(-dev)?$").expect("version grammar compiles")
    })
}

/// Release version (`2024.6.0`, `2024.6.0b2`, `2024.7.0-dev`)
///
/// A version is either a full release, a beta (`beta > 0`) or a dev build (`dev == true`),
/// never both a beta and a dev build. Values are only built through [`Version::parse`],
/// the constructors below or [`Version::replace`], all of which keep that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    beta: u32,
    dev: bool,
}

/// Field overrides for [`Version::replace`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionFields {
    pub major: Option<u32>,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    pub beta: Option<u32>,
    pub dev: Option<bool>,
}

impl Version {
    /// Create a full release version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
            beta: 0,
            dev: false,
        }
    }

    /// Create a beta version; `beta` must be at least 1
    pub fn new_beta(major: u32, minor: u32, patch: u32, beta: u32) -> Result<Self> {
        if beta == 0 {
            return Err(ReleaseError::invalid_version(
                format!("{}.{}.{}b0", major, minor, patch),
                "beta number must be at least 1",
            ));
        }
        Self::checked(major, minor, patch, beta, false)
    }

    /// Create a dev version
    pub fn new_dev(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
            beta: 0,
            dev: true,
        }
    }

    fn checked(major: u32, minor: u32, patch: u32, beta: u32, dev: bool) -> Result<Self> {
        let candidate = Version {
            major,
            minor,
            patch,
            beta,
            dev,
        };
        if beta > 0 && dev {
            return Err(ReleaseError::invalid_version(
                format!("{}.{}.{}b{}-dev", major, minor, patch, beta),
                "beta and dev suffixes are mutually exclusive",
            ));
        }
        Ok(candidate)
    }

    /// Parse a version string like `1.2.3`, `1.2.3b4` or `1.2.3-dev`
    pub fn parse(text: &str) -> Result<Self> {
        let captures = version_regex()
            .captures(text)
            .ok_or_else(|| ReleaseError::invalid_version(text, GRAMMAR))?;

        let number = |index: usize, name: &str| -> Result<u32> {
            let raw = captures.get(index).map(|m| m.as_str()).unwrap_or("0");
            raw.parse::<u32>().map_err(|_| {
                ReleaseError::invalid_version(text, format!("{} component '{}' is out of range", name, raw))
            })
        };

        let major = number(1, "major")?;
        let minor = number(2, "minor")?;
        let patch = number(3, "patch")?;
        let has_beta = captures.get(4).is_some();
        let beta = number(4, "beta")?;
        let dev = captures.get(5).is_some();

        if has_beta && beta == 0 {
            return Err(ReleaseError::invalid_version(
                text,
                "beta number must be at least 1",
            ));
        }
        if has_beta && dev {
            return Err(ReleaseError::invalid_version(
                text,
                "beta and dev suffixes are mutually exclusive",
            ));
        }

        Ok(Version {
            major,
            minor,
            patch,
            beta,
            dev,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Beta number, 0 when this is not a beta
    pub fn beta(&self) -> u32 {
        self.beta
    }

    pub fn dev(&self) -> bool {
        self.dev
    }

    /// A beta build
    pub fn is_prerelease(&self) -> bool {
        self.beta > 0
    }

    /// A non-beta, non-dev release with a non-zero patch number
    pub fn is_patch_release(&self) -> bool {
        self.patch != 0 && self.beta == 0 && !self.dev
    }

    pub fn is_first_beta(&self) -> bool {
        self.beta == 1
    }

    /// `X.Y.0`, the first full release of a release line
    pub fn is_first_release(&self) -> bool {
        self.patch == 0 && self.beta == 0 && !self.dev
    }

    /// Next development version: minor bumped, patch/beta reset, dev set
    pub fn next_dev(&self) -> Result<Version> {
        let minor = self.bumped(self.minor, "minor")?;
        Ok(Version::new_dev(self.major, minor, 0))
    }

    /// Next beta of the same release; only defined for betas
    pub fn next_beta(&self) -> Result<Version> {
        if self.beta == 0 {
            return Err(ReleaseError::invalid_transition(
                self,
                "next beta requires a beta version",
            ));
        }
        Ok(Version {
            beta: self.bumped(self.beta, "beta")?,
            ..*self
        })
    }

    /// Previous beta; `b1` steps back to the plain release number
    pub fn previous_beta(&self) -> Result<Version> {
        if self.beta == 0 {
            return Err(ReleaseError::invalid_transition(
                self,
                "beta is already 0",
            ));
        }
        Ok(Version {
            beta: self.beta - 1,
            ..*self
        })
    }

    pub fn next_patch(&self) -> Result<Version> {
        let patch = self.bumped(self.patch, "patch")?;
        Ok(Version::new(self.major, self.minor, patch))
    }

    fn bumped(&self, value: u32, name: &str) -> Result<u32> {
        value.checked_add(1).ok_or_else(|| {
            ReleaseError::invalid_transition(self, format!("{} would overflow", name))
        })
    }

    pub fn previous_patch(&self) -> Result<Version> {
        if self.patch == 0 {
            return Err(ReleaseError::invalid_transition(
                self,
                "patch is already 0",
            ));
        }
        Ok(Version::new(self.major, self.minor, self.patch - 1))
    }

    /// Structural copy with the given fields overridden
    pub fn replace(&self, fields: VersionFields) -> Result<Version> {
        Self::checked(
            fields.major.unwrap_or(self.major),
            fields.minor.unwrap_or(self.minor),
            fields.patch.unwrap_or(self.patch),
            fields.beta.unwrap_or(self.beta),
            fields.dev.unwrap_or(self.dev),
        )
    }

    /// Release-line identity: patch, beta and dev cleared
    pub fn release_line(&self) -> Version {
        Version::new(self.major, self.minor, 0)
    }

    /// Git tag name for this version
    pub fn tag(&self) -> String {
        format!("v{}", self)
    }

    // dev < beta < final for the same major.minor.patch
    fn stage(&self) -> u8 {
        if self.dev {
            0
        } else if self.beta > 0 {
            1
        } else {
            2
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.stage(), self.beta).cmp(&(
            other.major,
            other.minor,
            other.patch,
            other.stage(),
            other.beta,
        ))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.beta > 0 {
            write!(f, "b{}", self.beta)?;
        }
        if self.dev {
            write!(f, "-dev")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}
