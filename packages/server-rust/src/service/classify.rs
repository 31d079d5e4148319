//! Request classification: converts a `CompileRequest` into a routed request.

use judge_dispatch_core::{CompileRequest, RequestKind, Route};

/// A compile request with its routing decision attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRequest {
    pub submission_id: String,
    /// Raw request type, echoed on the result.
    pub request_type: String,
    pub kind: RequestKind,
    pub route: Route,
}

/// Classifies compile requests into graded or practice routes.
///
/// Classification never fails. Types outside both known families take the
/// practice route; the orchestrator decides whether that is acceptable.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestClassifier;

impl RequestClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn classify(&self, request: CompileRequest) -> ClassifiedRequest {
        let kind = request.kind();
        if kind == RequestKind::Unrecognized {
            tracing::warn!(
                request_type = %request.request_type,
                submission_id = %request.submission_id,
                "unrecognized request type, routing as practice"
            );
        }
        ClassifiedRequest {
            submission_id: request.submission_id,
            request_type: request.request_type,
            kind,
            route: kind.route(),
        }
    }
}

#[cfg(test)]
mod tests {
    use judge_dispatch_core::messages::GRADED_REQUEST_TYPES;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn problem_and_contest_are_graded() {
        let classifier = RequestClassifier::new();
        for t in ["problem_submission", "contest_submission"] {
            let c = classifier.classify(CompileRequest::new("A", t));
            assert_eq!(c.route, Route::Graded);
            assert!(c.kind.is_graded());
            assert_eq!(c.request_type, t);
        }
    }

    #[test]
    fn practice_is_practice() {
        let c = RequestClassifier::new().classify(CompileRequest::new("B", "practice"));
        assert_eq!(c.kind, RequestKind::Practice);
        assert_eq!(c.route, Route::Practice);
        assert_eq!(c.submission_id, "B");
    }

    #[test]
    fn unknown_type_is_flagged_but_routed_as_practice() {
        let c = RequestClassifier::new().classify(CompileRequest::new("D", "homework"));
        assert_eq!(c.kind, RequestKind::Unrecognized);
        assert_eq!(c.route, Route::Practice);
        assert_eq!(c.request_type, "homework");
    }

    proptest! {
        #[test]
        fn route_is_graded_exactly_for_graded_types(
            id in "[a-f0-9]{1,24}",
            request_type in prop_oneof![
                Just("problem_submission".to_string()),
                Just("contest_submission".to_string()),
                Just("practice".to_string()),
                ".{0,24}",
            ],
        ) {
            let c = RequestClassifier::new().classify(CompileRequest::new(id.clone(), request_type.clone()));
            prop_assert_eq!(c.route == Route::Graded, GRADED_REQUEST_TYPES.contains(&request_type.as_str()));
            prop_assert_eq!(c.submission_id, id);
            prop_assert_eq!(c.request_type, request_type);
        }
    }
}
