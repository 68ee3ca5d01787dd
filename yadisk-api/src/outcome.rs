use reqwest::StatusCode;
use serde::Serialize;

/// Category of a single API call, derived from nothing but its HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Success,
    Forbidden,
    NotFound,
    Conflict,
    PayloadTooLarge,
    RateLimited,
    ServerError,
    Unknown,
}

/// What a scenario does after a call with the given outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NextAction {
    Proceed,
    /// The token lacks scope for this call; stop without failing.
    SkipScenario,
    AbortDependents,
    /// Only the current step is dropped; independent steps still run.
    AbortStep,
    AbortScenario,
    ContinueCautiously,
}

impl Outcome {
    pub fn from_status(status: StatusCode) -> Self {
        classify_status(status.as_u16())
    }

    pub fn action(self) -> NextAction {
        match self {
            Outcome::Success | Outcome::Conflict => NextAction::Proceed,
            Outcome::Forbidden => NextAction::SkipScenario,
            Outcome::NotFound => NextAction::AbortDependents,
            Outcome::PayloadTooLarge => NextAction::AbortStep,
            Outcome::RateLimited | Outcome::ServerError => NextAction::AbortScenario,
            Outcome::Unknown => NextAction::ContinueCautiously,
        }
    }

    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }

    /// Success, or a conflict meaning the resource is already in place.
    pub fn is_satisfied(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Conflict)
    }
}

pub fn classify_status(status: u16) -> Outcome {
    match status {
        200 | 201 | 202 | 204 => Outcome::Success,
        401 | 403 => Outcome::Forbidden,
        404 => Outcome::NotFound,
        409 => Outcome::Conflict,
        413 => Outcome::PayloadTooLarge,
        429 => Outcome::RateLimited,
        500..=599 => Outcome::ServerError,
        _ => Outcome::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_codes_proceed() {
        for status in [200, 201, 202, 204] {
            assert_eq!(classify_status(status), Outcome::Success, "{status}");
            assert_eq!(classify_status(status).action(), NextAction::Proceed);
        }
    }

    #[test]
    fn auth_codes_skip_without_failing() {
        for status in [401, 403] {
            assert_eq!(classify_status(status), Outcome::Forbidden, "{status}");
        }
        assert_eq!(Outcome::Forbidden.action(), NextAction::SkipScenario);
    }

    #[test]
    fn conflict_counts_as_satisfied() {
        let outcome = classify_status(409);
        assert_eq!(outcome, Outcome::Conflict);
        assert_eq!(outcome.action(), NextAction::Proceed);
        assert!(outcome.is_satisfied());
        assert!(!outcome.is_success());
    }

    #[test]
    fn not_found_and_payload_too_large() {
        assert_eq!(classify_status(404).action(), NextAction::AbortDependents);
        assert_eq!(classify_status(413), Outcome::PayloadTooLarge);
        assert_eq!(classify_status(413).action(), NextAction::AbortStep);
    }

    #[test]
    fn rate_limit_and_server_errors_abort() {
        assert_eq!(classify_status(429), Outcome::RateLimited);
        for status in [500, 502, 503, 504, 599] {
            assert_eq!(classify_status(status), Outcome::ServerError, "{status}");
            assert_eq!(classify_status(status).action(), NextAction::AbortScenario);
        }
    }

    #[test]
    fn everything_else_is_unknown() {
        for status in [100, 203, 206, 301, 400, 408, 423, 600] {
            assert_eq!(classify_status(status), Outcome::Unknown, "{status}");
        }
        assert_eq!(Outcome::Unknown.action(), NextAction::ContinueCautiously);
    }

    #[test]
    fn from_status_matches_numeric_mapping() {
        assert_eq!(
            Outcome::from_status(StatusCode::TOO_MANY_REQUESTS),
            Outcome::RateLimited
        );
        assert_eq!(Outcome::from_status(StatusCode::NO_CONTENT), Outcome::Success);
    }
}
