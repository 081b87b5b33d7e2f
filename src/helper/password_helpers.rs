use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const MIN_PASSWORD_LENGTH: usize = 8;
const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

#[derive(Debug, Clone, Serialize)]
pub struct PasswordRequirement {
    pub id: &'static str,
    pub label: &'static str,
    pub met: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordCheck {
    pub is_valid: bool,
    pub score: u8,
    pub strength: &'static str,
    pub requirements: Vec<PasswordRequirement>,
}

pub fn check_password(password: &str) -> PasswordCheck {
    let requirements = vec![
        PasswordRequirement {
            id: "length",
            label: "At least 8 characters",
            met: password.chars().count() >= MIN_PASSWORD_LENGTH,
        },
        PasswordRequirement {
            id: "uppercase",
            label: "One uppercase letter",
            met: password.chars().any(|c| c.is_ascii_uppercase()),
        },
        PasswordRequirement {
            id: "lowercase",
            label: "One lowercase letter",
            met: password.chars().any(|c| c.is_ascii_lowercase()),
        },
        PasswordRequirement {
            id: "number",
            label: "One number",
            met: password.chars().any(|c| c.is_ascii_digit()),
        },
        PasswordRequirement {
            id: "special",
            label: "One special character",
            met: password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
        },
    ];

    // The length rule gates the score; each other rule adds 25.
    let met_count = requirements.iter().filter(|r| r.met).count();
    let score = if requirements[0].met { ((met_count - 1) * 25) as u8 } else { 0 };
    let strength = match score {
        0 => "Very Weak",
        25 => "Weak",
        50 => "Fair",
        75 => "Good",
        _ => "Strong",
    };

    PasswordCheck {
        is_valid: met_count == requirements.len(),
        score,
        strength,
        requirements,
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

/// Signup validation. Returns the first failure as a user-facing message.
pub fn validate_signup(email: &str, password: &str, confirmation: &str, display_name: &str) -> Result<(), String> {
    if !is_valid_email(email) {
        return Err("Please enter a valid email address.".to_string());
    }
    if display_name.trim().is_empty() {
        return Err("Display name is required.".to_string());
    }
    validate_new_password(password, confirmation)
}

/// Policy and confirmation check shared by signup and password changes.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), String> {
    let check = check_password(password);
    if !check.is_valid {
        let missing: Vec<&str> = check.requirements.iter().filter(|r| !r.met).map(|r| r.label).collect();
        return Err(format!("Password does not meet requirements: {}.", missing.join(", ")));
    }
    if password != confirmation {
        return Err("Passwords do not match.".to_string());
    }
    Ok(())
}
