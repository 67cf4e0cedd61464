use time::Date;
use validator::ValidateEmail;

use crate::api::errors::ApiError;
use crate::core::time::parse_date;

pub(crate) const MIN_PASSWORD_LEN: usize = 6;

/// `local@domain.tld`; single-label domains are refused.
pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    let dotted_domain = email
        .rsplit_once('@')
        .is_some_and(|(_, domain)| domain.split('.').filter(|part| !part.is_empty()).count() >= 2);

    if email.validate_email() && dotted_domain {
        Ok(())
    } else {
        Err(ApiError::bad_request("Please provide a valid email address"))
    }
}

pub(crate) fn validate_password_len(password: &str, message: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::bad_request(message))
    }
}

pub(crate) fn date_of_birth(raw: &str) -> Result<Date, ApiError> {
    parse_date(raw).ok_or_else(|| ApiError::bad_request("Please provide a valid date of birth"))
}
