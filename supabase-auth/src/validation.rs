//! Client-side checks run before credentials are sent

/// Loose `something@something.tld` check
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain
                    .rsplit_once('.')
                    .map(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    .unwrap_or(false)
        }
        None => false,
    }
}

/// Requirements a sign-up password misses, empty when it is acceptable
pub fn missing_password_requirements(password: &str) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if password.chars().count() < 8 {
        missing.push("at least 8 characters");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        missing.push("an uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        missing.push("a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a number");
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        missing.push("a special character");
    }
    missing
}

/// Strength score from 0 to 5, one point per satisfied requirement
pub fn password_strength(password: &str) -> u8 {
    5 - missing_password_requirements(password).len() as u8
}

/// Display names need at least two characters
pub fn is_valid_name(name: &str) -> bool {
    name.trim().chars().count() >= 2
}
