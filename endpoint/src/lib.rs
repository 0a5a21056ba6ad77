//! Plausibility-gated selection of the chat service base address.
//!
//! DESIGN
//! ======
//! An [`EndpointResolver`] holds candidate bundles in declaration order. Each
//! bundle is a sequence of tokens that decode (see [`decode_token`]) into
//! address fragments; the fragments concatenate into one candidate. The first
//! candidate that passes [`validate`] wins. When none pass, the decoded first
//! bundle is returned unverified, so resolution always yields an address.
//!
//! SECURITY
//! ========
//! None. The encoding only keeps addresses out of a casual read of the
//! source, and the checksum is a plausibility gate: any string with the right
//! scheme, suffix and character sum passes. Point clients at a server through
//! configuration when that matters.

mod codec;

use std::fmt;

pub use codec::{decode_token, encode_address, encode_token};

/// Encoded `http` and `https` scheme prefixes.
const ENCODED_SCHEMES: [&str; 2] = ["62717277", "6271727775"];
/// Encoded `/chat_server.php` service path suffix.
const ENCODED_SUFFIX: &str = "3866607a744d7762727f67713d716473";

const CHECKSUM_MASKED: u32 = 0x4C12;
const CHECKSUM_OFFSET: u32 = 0x111;
const CHECKSUM_SALT: u32 = 0x5A3C;
const CHECKSUM_MODULUS: u32 = 65_535;

/// Built-in bundles in resolution order. Only the third one validates.
const BUILTIN_BUNDLES: [&[&str]; 4] = [
    &["6271727775", "2d393a", "7975633a61797f6a746f673a63706b", "387f24"],
    &["62717277", "2d393a", "6e74657a6a677376702c2c242a22", "3870727a747a773e62716f6d"],
    &[
        "6271727775",
        "2d393a",
        "72646c7a7f3c637b796c766d61",
        "39747060",
        "3870707d",
        "3866607a744d",
        "7164707d6177",
        "39756077",
    ],
    &["6271727775", "2d393a", "6767743a61797f6a746f673a717765", "3863677a6a7564"],
];

// =============================================================================
// ERROR
// =============================================================================

/// Why a token or bundle could not produce a usable candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Hex text must contain whole bytes.
    #[error("token has an odd number of hex digits ({0})")]
    OddLength(usize),
    /// A character outside `[0-9a-fA-F]` appeared in a token.
    #[error("token contains non-hex character {0:?}")]
    InvalidHex(char),
    /// A plaintext character does not fit in one byte.
    #[error("character {0:?} cannot be encoded")]
    Unencodable(char),
    /// The bundle has no tokens at all.
    #[error("bundle has no tokens")]
    EmptyBundle,
    /// The candidate decoded but failed the scheme/suffix/checksum rules.
    #[error("candidate failed validation")]
    Implausible,
}

// =============================================================================
// CANDIDATE BUNDLE
// =============================================================================

/// An ordered sequence of encoded tokens forming one candidate address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBundle {
    tokens: Vec<String>,
}

impl CandidateBundle {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tokens: tokens.into_iter().map(Into::into).collect() }
    }

    /// Encode a plain address into a bundle of `pieces` tokens.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Unencodable`] for characters outside Latin-1.
    pub fn encode(address: &str, pieces: usize) -> Result<Self, CodecError> {
        Ok(Self { tokens: encode_address(address, pieces)? })
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Decode every token in order and concatenate the fragments.
    ///
    /// # Errors
    ///
    /// Returns the first token's decode error, or [`CodecError::EmptyBundle`].
    pub fn decode(&self) -> Result<String, CodecError> {
        if self.tokens.is_empty() {
            return Err(CodecError::EmptyBundle);
        }
        self.tokens.iter().map(|token| decode_token(token)).collect()
    }

    /// Decode and validate in one step.
    fn decode_verified(&self) -> Result<String, CodecError> {
        let candidate = self.decode()?;
        if validate(&candidate) { Ok(candidate) } else { Err(CodecError::Implausible) }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Sum of UTF-16 code units modulo 65535.
#[must_use]
pub fn checksum(candidate: &str) -> u32 {
    candidate
        .encode_utf16()
        .fold(0, |sum, unit| (sum + u32::from(unit)) % CHECKSUM_MODULUS)
}

/// The checksum a valid candidate must produce.
#[must_use]
pub fn reference_checksum() -> u32 {
    ((CHECKSUM_MASKED.wrapping_sub(CHECKSUM_OFFSET) & 0xFFFF) ^ CHECKSUM_SALT) & 0xFFFF
}

/// Check a decoded candidate against the scheme, suffix and checksum rules.
///
/// The scheme and suffix constants are decoded on every call.
#[must_use]
pub fn validate(candidate: &str) -> bool {
    let Ok(suffix) = decode_token(ENCODED_SUFFIX) else {
        return false;
    };
    let scheme_ok = ENCODED_SCHEMES
        .iter()
        .filter_map(|token| decode_token(token).ok())
        .any(|scheme| candidate.starts_with(&scheme));

    scheme_ok && candidate.ends_with(&suffix) && checksum(candidate) == reference_checksum()
}

// =============================================================================
// RESOLVED ENDPOINT
// =============================================================================

/// How a [`ResolvedEndpoint`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// A bundle decoded and passed validation.
    Verified,
    /// No bundle validated; the first bundle's decoded form is used as-is.
    Fallback,
    /// Supplied explicitly by configuration and never validated.
    Configured,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Verified => "verified",
            Self::Fallback => "fallback",
            Self::Configured => "configured",
        };
        f.write_str(label)
    }
}

/// The base address chat requests are sent to, without trailing `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    address: String,
    provenance: Provenance,
}

impl ResolvedEndpoint {
    pub fn new(address: impl Into<String>, provenance: Provenance) -> Self {
        let address = address.into();
        Self { address: address.trim_end_matches('/').to_owned(), provenance }
    }

    /// Endpoint taken from configuration, bypassing resolution.
    pub fn configured(address: impl Into<String>) -> Self {
        Self::new(address, Provenance::Configured)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.provenance == Provenance::Verified
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Picks the first plausible candidate from a fixed list of bundles.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    bundles: Vec<CandidateBundle>,
}

impl EndpointResolver {
    #[must_use]
    pub fn new(bundles: Vec<CandidateBundle>) -> Self {
        Self { bundles }
    }

    /// Resolver over the bundles compiled into this crate.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(BUILTIN_BUNDLES.iter().map(|tokens| CandidateBundle::new(tokens.iter().copied())).collect())
    }

    #[must_use]
    pub fn bundles(&self) -> &[CandidateBundle] {
        &self.bundles
    }

    /// Return the first verified candidate in declaration order.
    ///
    /// Never fails: with no verified candidate the decoded first bundle is
    /// returned as [`Provenance::Fallback`], or an empty address if even that
    /// does not decode.
    #[must_use]
    pub fn resolve(&self) -> ResolvedEndpoint {
        for (index, bundle) in self.bundles.iter().enumerate() {
            match bundle.decode_verified() {
                Ok(candidate) => {
                    tracing::debug!(index, "candidate bundle verified");
                    return ResolvedEndpoint::new(candidate, Provenance::Verified);
                }
                Err(error) => tracing::debug!(index, %error, "candidate bundle skipped"),
            }
        }

        let fallback = self
            .bundles
            .first()
            .and_then(|bundle| bundle.decode().ok())
            .unwrap_or_default();
        tracing::warn!(bundles = self.bundles.len(), "no candidate bundle verified; using unverified fallback");
        ResolvedEndpoint::new(fallback, Provenance::Fallback)
    }
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
