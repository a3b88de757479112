//! Classification of call results into diagnostics.
//!
//! A finished call is described by a [`GrpcStatus`]. [`classify`] maps it to
//! the boolean outcome the caller sees and, for failures, to the level and
//! text of the single log record the exporter emits.

use std::fmt;

use tonic::Code;

use crate::result::FailureReason;

/// The status a unary call finished with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrpcStatus {
    code: Code,
    message: Option<String>,
}

impl GrpcStatus {
    /// An empty message is treated as no message.
    pub fn new(code: Code, message: Option<String>) -> Self {
        GrpcStatus {
            code,
            message: message.filter(|m| !m.is_empty()),
        }
    }

    /// Build a status from its wire value. Unknown values map to `UNKNOWN`.
    pub fn from_code(code: i32, message: Option<String>) -> Self {
        GrpcStatus::new(Code::from_i32(code), message)
    }

    /// The status code.
    pub fn code(&self) -> Code {
        self.code
    }

    /// The numeric value of the status code.
    pub fn code_value(&self) -> i32 {
        self.code as i32
    }

    /// The message the status carried, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<&tonic::Status> for GrpcStatus {
    fn from(status: &tonic::Status) -> Self {
        GrpcStatus::new(status.code(), Some(status.message().to_owned()))
    }
}

impl fmt::Display for GrpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gRPC status code {}", self.code_value())?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Severity of a failure diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// The collector answered but refused the data.
    Warn,
    /// The collector is unreachable or misconfigured.
    Error,
}

/// Result of [`classify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// The call succeeded. Nothing is logged.
    Success,
    /// The call failed and must be reported once at `level`.
    Failure {
        /// The reason surfaced on the outcome.
        reason: FailureReason,
        /// Level of the log record.
        level: DiagnosticLevel,
        /// Text of the log record.
        message: String,
    },
}

impl Classification {
    /// Whether the classified call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }
}

/// Map the status of a finished call to an outcome and a diagnostic.
///
/// `type_name` is the signal's diagnostic noun (`"trace"`, `"metric"`, `"log"`).
/// Messages are copied verbatim, whatever their encoding.
pub fn classify(type_name: &str, status: &GrpcStatus) -> Classification {
    match status.code() {
        Code::Ok => Classification::Success,
        Code::Unavailable => Classification::Failure {
            reason: FailureReason::Unavailable,
            level: DiagnosticLevel::Error,
            message: format!(
                "Failed to export {type_name}s. Server is UNAVAILABLE. \
                 Make sure your collector is running and reachable from this network."
            ),
        },
        Code::Unimplemented => Classification::Failure {
            reason: FailureReason::Unimplemented,
            level: DiagnosticLevel::Error,
            message: with_detail(
                format!(
                    "Failed to export {type_name}s. Server responded with UNIMPLEMENTED. \
                     This usually means that your collector is not configured with an otlp \
                     receiver in the \"pipelines\" section of the configuration. \
                     Full error message:"
                ),
                status.message(),
            ),
        },
        code => Classification::Failure {
            reason: if code == Code::DeadlineExceeded {
                FailureReason::DeadlineExceeded
            } else {
                FailureReason::Status(status.code_value())
            },
            level: DiagnosticLevel::Warn,
            message: with_detail(
                format!(
                    "Failed to export {type_name}s. Server responded with gRPC status code {}. \
                     Error message:",
                    status.code_value()
                ),
                status.message(),
            ),
        },
    }
}

// Appends ` {detail}` when there is one; the label is left bare otherwise.
fn with_detail(mut label: String, detail: Option<&str>) -> String {
    if let Some(detail) = detail {
        label.push(' ');
        label.push_str(detail);
    }
    label
}
