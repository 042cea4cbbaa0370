use thiserror::Error;

const MAX_EMAIL_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmailError {
    #[error("email must not be empty")]
    Empty,
    #[error("email must be at most {MAX_EMAIL_LEN} bytes")]
    TooLong,
    #[error("email must look like local@domain.tld")]
    Malformed,
}

/// Trim and sanity-check an email address. Case is kept as given.
///
/// Not an RFC 5322 parser. It only rejects values that cannot be a
/// deliverable address.
pub fn normalize_email(raw: &str) -> Result<String, EmailError> {
    let email = raw.trim().to_owned();
    if email.is_empty() {
        return Err(EmailError::Empty);
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(EmailError::TooLong);
    }

    let (local, domain) = email.split_once('@').ok_or(EmailError::Malformed)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
        || email.chars().any(char::is_whitespace)
    {
        return Err(EmailError::Malformed);
    }

    Ok(email)
}
