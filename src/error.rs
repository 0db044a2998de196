//! # Error Taxonomy
//!
//! Every failure a caller can observe is one of the variants below. The
//! variants carry stable machine-readable codes (for the `error_code` field
//! of the error envelope) and a fixed HTTP status mapping, so the transport
//! layer never invents its own classification.
//!
//! Two groups:
//!
//! - **Request-shaped** failures: bad input, missing or invalid credentials,
//!   wrong role, unknown resource, rate limiting.
//! - **State-machine rejections**: a structurally valid request the voting
//!   rules refuse (double vote, closed poll, ineligible voter, ...). These
//!   surface with HTTP 400 but keep their specific code so clients can
//!   branch without parsing message text.
//!
//! Persistence failures never appear here. The reconciler logs and retries
//! them; they are invisible to callers by design.

use thiserror::Error;

/// The complete set of caller-observable failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VotingError {
    /// Malformed body or a failed field validation. Carries the
    /// human-readable reason from the validator.
    #[error("{0}")]
    BadRequest(String),

    /// Missing, expired, or invalid token, or invalid login credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role does not permit the operation or the
    /// caller is not the subject voter.
    #[error("{0}")]
    Forbidden(String),

    /// Unknown poll, voter, or route.
    #[error("{0}")]
    NotFound(String),

    /// Known route, wrong verb.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Voter id already present in the registry.
    #[error("voter already registered")]
    AlreadyRegistered,

    /// The referenced poll does not exist.
    #[error("poll does not exist")]
    PollNotFound,

    /// The poll exists but `now` is outside its `[start, end)` window.
    #[error("poll is not active")]
    PollInactive,

    /// The voter id is not in the voter registry.
    #[error("voter not registered")]
    VoterNotRegistered,

    /// The voter is registered but not in the poll's eligible set.
    #[error("voter not eligible for this poll")]
    VoterNotEligible,

    /// The voter already appears in the poll's participation set and the
    /// poll does not allow multiple votes.
    #[error("voter has already voted in this poll")]
    DoubleVote,

    /// The chosen option is not in the poll's option list.
    #[error("invalid voting choice")]
    InvalidChoice,

    /// The ballot signature is missing or does not verify under the
    /// voter's registered public key.
    #[error("invalid ballot signature")]
    InvalidSignature,

    /// The sliding-window rate limit for this client is exhausted.
    #[error("rate limit exceeded, try again later")]
    TooManyRequests,

    /// Unexpected failure. Logged with detail, surfaced generically.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VotingError {
    /// Stable machine-readable identifier for the error envelope.
    ///
    /// These strings are part of the external contract. Never rename one.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::AlreadyRegistered => "ALREADY_REGISTERED",
            Self::PollNotFound => "POLL_NOT_FOUND",
            Self::PollInactive => "POLL_INACTIVE",
            Self::VoterNotRegistered => "VOTER_NOT_REGISTERED",
            Self::VoterNotEligible => "VOTER_NOT_ELIGIBLE",
            Self::DoubleVote => "DOUBLE_VOTE",
            Self::InvalidChoice => "INVALID_CHOICE",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the transport layer maps this error to.
    ///
    /// State-machine rejections are all 400: the request was well-formed,
    /// the voting rules refused it.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_)
            | Self::AlreadyRegistered
            | Self::PollNotFound
            | Self::PollInactive
            | Self::VoterNotRegistered
            | Self::VoterNotEligible
            | Self::DoubleVote
            | Self::InvalidChoice
            | Self::InvalidSignature => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed => 405,
            Self::TooManyRequests => 429,
            Self::Internal(_) => 500,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = VotingError> = std::result::Result<T, E>;
