//! Bus message schemas for the compile stage.
//!
//! Inbound `CompileRequest`s arrive on the `submission_requests` queue and
//! outbound `CompileResult`s leave on `processed_submission`. Both travel as
//! named-field documents (JSON by default, see [`crate::codec`]).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::submission::Submission;

/// Request types that belong to the graded family.
pub const GRADED_REQUEST_TYPES: [&str; 2] = ["problem_submission", "contest_submission"];

/// Spellings recognized as genuine practice (playground) requests.
pub const PRACTICE_REQUEST_TYPES: [&str; 3] = ["practice", "playground", "playground_submission"];

// ---------------------------------------------------------------------------
// CompileRequest
// ---------------------------------------------------------------------------

/// Ask the compile stage to process a stored submission.
///
/// `request_type` is kept as the raw wire string: it is echoed verbatim on
/// the result, and values outside the known families are still routable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub submission_id: String,
    #[serde(rename = "type")]
    pub request_type: String,
}

impl CompileRequest {
    #[must_use]
    pub fn new(submission_id: impl Into<String>, request_type: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            request_type: request_type.into(),
        }
    }

    /// Parsed view of `request_type`.
    #[must_use]
    pub fn kind(&self) -> RequestKind {
        RequestKind::parse(&self.request_type)
    }
}

// ---------------------------------------------------------------------------
// RequestKind / Route
// ---------------------------------------------------------------------------

/// Parsed request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// `problem_submission`
    Problem,
    /// `contest_submission`
    Contest,
    /// One of [`PRACTICE_REQUEST_TYPES`].
    Practice,
    /// Anything else. Routed like practice unless strict checking is on.
    Unrecognized,
}

impl RequestKind {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "problem_submission" => Self::Problem,
            "contest_submission" => Self::Contest,
            v if PRACTICE_REQUEST_TYPES.contains(&v) => Self::Practice,
            _ => Self::Unrecognized,
        }
    }

    #[must_use]
    pub fn is_graded(self) -> bool {
        matches!(self, Self::Problem | Self::Contest)
    }

    /// Routing token for this kind. Unrecognized types fall through to
    /// [`Route::Practice`].
    #[must_use]
    pub fn route(self) -> Route {
        if self.is_graded() {
            Route::Graded
        } else {
            Route::Practice
        }
    }
}

/// Routing token selecting the processing path and backing collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Problem and contest submissions.
    Graded,
    /// Playground submissions.
    Practice,
}

impl Route {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graded => "graded",
            Self::Practice => "practice",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CompileResult
// ---------------------------------------------------------------------------

/// The (possibly enriched) submission forwarded to the execution stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileResult {
    pub submission: Submission,
    #[serde(rename = "type")]
    pub request_type: String,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn request_parses_wire_shape() {
        let req: CompileRequest = serde_json::from_value(json!({
            "submission_id": "A",
            "type": "problem_submission"
        }))
        .unwrap();
        assert_eq!(req, CompileRequest::new("A", "problem_submission"));
        assert_eq!(req.kind(), RequestKind::Problem);
    }

    #[test]
    fn graded_family_routes_to_graded() {
        assert_eq!(RequestKind::parse("problem_submission").route(), Route::Graded);
        assert_eq!(RequestKind::parse("contest_submission").route(), Route::Graded);
    }

    #[test]
    fn practice_spellings_are_recognized() {
        for t in PRACTICE_REQUEST_TYPES {
            assert_eq!(RequestKind::parse(t), RequestKind::Practice);
            assert_eq!(RequestKind::parse(t).route(), Route::Practice);
        }
    }

    #[test]
    fn unknown_type_falls_through_to_practice() {
        let kind = RequestKind::parse("Problem_Submission");
        assert_eq!(kind, RequestKind::Unrecognized);
        assert_eq!(kind.route(), Route::Practice);
        assert_eq!(RequestKind::parse("").route(), Route::Practice);
    }

    #[test]
    fn result_echoes_type_under_wire_name() {
        let result = CompileResult {
            submission: crate::Submission::new("A", "python", "print(1)"),
            request_type: "contest_submission".to_string(),
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "contest_submission");
        assert_eq!(value["submission"]["_id"], "A");
    }

    proptest! {
        #[test]
        fn only_graded_types_route_graded(t in "\\PC{0,24}") {
            let graded = GRADED_REQUEST_TYPES.contains(&t.as_str());
            prop_assert_eq!(RequestKind::parse(&t).route() == Route::Graded, graded);
        }
    }
}
