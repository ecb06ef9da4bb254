// src/errors.rs
use thiserror::Error;

/// Codec error codes, mirrored from the underlying raster library. The
/// dispatch engine surfaces these negated; positive engine returns are
/// attempt counts.
pub mod codes {
    pub const NONE: i32 = 0;
    pub const APP_DEFINED: i32 = 1;
    pub const OUT_OF_MEMORY: i32 = 2;
    pub const FILE_IO: i32 = 3;
    pub const OPEN_FAILED: i32 = 4;
    pub const ILLEGAL_ARG: i32 = 5;
    pub const NOT_SUPPORTED: i32 = 6;
    pub const ASSERTION_FAILED: i32 = 7;
    pub const NO_WRITE_ACCESS: i32 = 8;
    pub const USER_INTERRUPT: i32 = 9;
    pub const OBJECT_NULL: i32 = 10;
    pub const HTTP_RESPONSE: i32 = 11;
    pub const AWS_BUCKET_NOT_FOUND: i32 = 12;
    pub const AWS_OBJECT_NOT_FOUND: i32 = 13;
    pub const AWS_ACCESS_DENIED: i32 = 14;
    pub const AWS_INVALID_CREDENTIALS: i32 = 15;
    pub const AWS_SIGNATURE_DOES_NOT_MATCH: i32 = 16;
}

/// Reserved for budget-exhaustion reporting upstream; deliberately outside
/// the codec code space.
pub const ATTEMPTS_EXCEEDED: i32 = 100;

pub fn error_string(code: i32) -> &'static str {
    match code {
        codes::NONE => "None(0) \"No error.\"",
        codes::APP_DEFINED => "AppDefined(1) \"Application defined error.\"",
        codes::OUT_OF_MEMORY => "OutOfMemory(2) \"Out of memory error.\"",
        codes::FILE_IO => "FileIO(3) \"File I/O error.\"",
        codes::OPEN_FAILED => "OpenFailed(4) \"Open failed.\"",
        codes::ILLEGAL_ARG => "IllegalArg(5) \"Illegal argument.\"",
        codes::NOT_SUPPORTED => "NotSupported(6) \"Not supported.\"",
        codes::ASSERTION_FAILED => "AssertionFailed(7) \"Assertion failed.\"",
        codes::NO_WRITE_ACCESS => "NoWriteAccess(8) \"No write access.\"",
        codes::USER_INTERRUPT => "UserInterrupt(9) \"User interrupted.\"",
        codes::OBJECT_NULL => "ObjectNull(10) \"NULL object.\"",
        codes::HTTP_RESPONSE => "HttpResponse(11) \"HTTP response.\"",
        codes::AWS_BUCKET_NOT_FOUND => "AWSBucketNotFound(12) \"AWS bucket not found.\"",
        codes::AWS_OBJECT_NOT_FOUND => "AWSObjectNotFound(13) \"AWS object not found.\"",
        codes::AWS_ACCESS_DENIED => "AWSAccessDenied(14) \"AWS access denied.\"",
        codes::AWS_INVALID_CREDENTIALS => "AWSInvalidCredentials(15) \"AWS invalid credentials.\"",
        codes::AWS_SIGNATURE_DOES_NOT_MATCH => {
            "AWSSignatureDoesNotMatch(16) \"AWS signature does not match.\""
        }
        _ => "Unknown error...",
    }
}

/// Severity classes reported through the error callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum Severity {
    None = 0,
    Debug = 1,
    Warning = 2,
    Failure = 3,
    Fatal = 4,
}

// Reference: https://en.wikipedia.org/wiki/ANSI_escape_code#Colors
const ANSI_GREEN: &str = "\x1b[32;1m";
const ANSI_CYAN: &str = "\x1b[36;1m";
const ANSI_YELLOW: &str = "\x1b[33;1m";
const ANSI_RED: &str = "\x1b[31;1m";
const ANSI_BGYELLOW: &str = "\x1b[103;1m";

impl Severity {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Severity::None,
            1 => Severity::Debug,
            2 => Severity::Warning,
            3 => Severity::Failure,
            4 => Severity::Fatal,
            _ => Severity::Failure,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::None => "NON-ERROR(0)",
            Severity::Debug => "DEBUG(1)",
            Severity::Warning => "WARNING(2)",
            Severity::Failure => "FAILURE(3)",
            Severity::Fatal => "UNRECOVERABLE(4)",
        }
    }

    pub fn label_ansi(self) -> String {
        let color = match self {
            Severity::None => ANSI_GREEN,
            Severity::Debug => ANSI_CYAN,
            Severity::Warning => ANSI_YELLOW,
            Severity::Failure => ANSI_RED,
            Severity::Fatal => return format!("{}{}{}", ANSI_RED, ANSI_BGYELLOW, self.label()),
        };
        format!("{}{}", color, self.label())
    }
}

/// Errors raised while constructing or configuring the pool itself, as
/// opposed to codec errors flowing through the per-thread channel.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("dataset pool capacity must be nonzero")]
    InvalidPoolCapacity,
    #[error("token registry capacity must be nonzero")]
    InvalidTokenCapacity,
    #[error("codec error {code} ({}): {message}", error_string(*code))]
    Codec { code: i32, message: String },
}
