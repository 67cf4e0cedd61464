//! Reads the human-readable status messages that stored routines return and
//! turns them into outcomes. Routines report through wording alone, so these
//! patterns are a contract with the database: rewording a message on that
//! side silently changes the classification here.

/// What a routine's status message says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    NotFound,
    Conflict,
    Failed,
    Succeeded,
    Unclassified,
}

const NOT_FOUND: &[&str] = &["does not exist", "not found"];
const CONFLICT: &[&str] = &["already exists", "already assigned", "duplicate"];
const FAILED: &[&str] = &["error", "invalid", "not valid"];
const SUCCEEDED: &[&str] = &["successfully", "valid"];

const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";
const SQLSTATE_NO_DATA_FOUND: &str = "P0002";

/// First matching group wins, in declaration order. Failure patterns are
/// tested before success ones because "invalid" contains "valid".
pub(crate) fn classify(message: &str) -> Outcome {
    let message = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|pattern| message.contains(pattern));

    if matches(NOT_FOUND) {
        Outcome::NotFound
    } else if matches(CONFLICT) {
        Outcome::Conflict
    } else if matches(FAILED) {
        Outcome::Failed
    } else if matches(SUCCEEDED) {
        Outcome::Succeeded
    } else {
        Outcome::Unclassified
    }
}

/// Classifies an error raised by a routine, letting a SQLSTATE override the
/// wording when it is unambiguous.
pub(crate) fn classify_raised(message: &str, code: Option<&str>) -> Outcome {
    match code {
        Some(SQLSTATE_UNIQUE_VIOLATION) => Outcome::Conflict,
        Some(SQLSTATE_NO_DATA_FOUND) => Outcome::NotFound,
        _ => classify(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entities_are_not_found() {
        assert_eq!(classify("Branch ID does not exist"), Outcome::NotFound);
        assert_eq!(classify("Course not found"), Outcome::NotFound);
        assert_eq!(classify("TRACK DOES NOT EXIST"), Outcome::NotFound);
    }

    #[test]
    fn duplicates_are_conflicts() {
        assert_eq!(classify("Branch name already exists"), Outcome::Conflict);
        assert_eq!(classify("Instructor already assigned to this course"), Outcome::Conflict);
        assert_eq!(classify("Duplicate course code"), Outcome::Conflict);
    }

    #[test]
    fn error_wording_is_failure() {
        assert_eq!(classify("Error: question type mismatch"), Outcome::Failed);
        assert_eq!(classify("Exam grade is not valid"), Outcome::Failed);
        assert_eq!(classify("Invalid exam id"), Outcome::Failed);
    }

    #[test]
    fn invalid_is_never_read_as_valid() {
        assert_eq!(classify("Exam grade invalid"), Outcome::Failed);
        assert_eq!(classify("Exam grade is valid"), Outcome::Succeeded);
    }

    #[test]
    fn success_wording_is_success() {
        assert_eq!(classify("Branch added successfully"), Outcome::Succeeded);
        assert_eq!(classify("Grades are VALID"), Outcome::Succeeded);
    }

    #[test]
    fn unknown_wording_is_unclassified() {
        assert_eq!(classify("Done"), Outcome::Unclassified);
        assert_eq!(classify(""), Outcome::Unclassified);
    }

    #[test]
    fn not_found_outranks_other_groups() {
        assert_eq!(classify("Error: course does not exist"), Outcome::NotFound);
        assert_eq!(classify("Track not found, duplicate request"), Outcome::NotFound);
    }

    #[test]
    fn sqlstate_refines_raised_errors() {
        assert_eq!(
            classify_raised("duplicate key value violates unique constraint", Some("23505")),
            Outcome::Conflict
        );
        assert_eq!(classify_raised("query returned no rows", Some("P0002")), Outcome::NotFound);
        assert_eq!(classify_raised("Exam does not exist", Some("P0001")), Outcome::NotFound);
        assert_eq!(classify_raised("boom", None), Outcome::Unclassified);
    }
}
