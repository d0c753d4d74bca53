use std::collections::BTreeMap;

/// Field name to message, returned to the client as a 400 body.
pub type FieldErrors = BTreeMap<String, String>;

const MUST_NOT_BE_EMPTY: &str = "Must not be empty";

pub fn validate_signup(
    email: &str,
    password: &str,
    confirm_password: &str,
    user_name: &str,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if email.trim().is_empty() {
        errors.insert("email".into(), MUST_NOT_BE_EMPTY.into());
    } else if !is_email(email) {
        errors.insert("email".into(), "Must be a valid email address".into());
    }
    if password.is_empty() {
        errors.insert("password".into(), MUST_NOT_BE_EMPTY.into());
    }
    if confirm_password != password {
        errors.insert("confirmPassword".into(), "Passwords must match".into());
    }
    if user_name.trim().is_empty() {
        errors.insert("userName".into(), MUST_NOT_BE_EMPTY.into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_login(email: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if email.trim().is_empty() {
        errors.insert("email".into(), MUST_NOT_BE_EMPTY.into());
    }
    if password.is_empty() {
        errors.insert("password".into(), MUST_NOT_BE_EMPTY.into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Trim profile details, drop empty fields, and prefix bare website
/// addresses with a scheme.
pub fn reduce_user_details(
    bio: Option<&str>,
    website: Option<&str>,
    location: Option<&str>,
) -> (Option<String>, Option<String>, Option<String>) {
    let clean = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let website = clean(website).map(|site| {
        if site.starts_with("http") {
            site
        } else {
            format!("http://{site}")
        }
    });

    (clean(bio), website, clean(location))
}

fn is_email(value: &str) -> bool {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
        && !domain.contains('@')
}
