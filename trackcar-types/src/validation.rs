//! Credential checks applied before calling the auth provider.

/// Minimum password length accepted by the auth provider.
pub const MIN_PASSWORD_LEN: usize = 6;

/// `local@domain.tld` with no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Password policy: at least six characters, one lowercase letter, one digit.
pub fn check_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("password must have at least 6 characters");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("password must contain a digit");
    }
    Ok(())
}

/// Checks a password change form: new password present, long enough, and
/// confirmed.
pub fn check_password_change(new_password: &str, confirmation: &str) -> Result<(), &'static str> {
    if new_password.is_empty() {
        return Err("new password is required");
    }
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err("new password must have at least 6 characters");
    }
    if new_password != confirmation {
        return Err("passwords do not match");
    }
    Ok(())
}
