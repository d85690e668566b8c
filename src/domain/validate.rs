/// Rejections raised by draft validation before anything touches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Required { field: &'static str },
    Length { field: &'static str, min: usize, max: usize },
    NegativeAmount,
    InvalidEmail,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Required { field } => write!(f, "{} cannot be empty", field),
            ValidationError::Length { field, min, max } => {
                write!(f, "{} must be between {} and {} characters", field, min, max)
            }
            ValidationError::NegativeAmount => {
                write!(f, "Amount must be zero or a positive integer")
            }
            ValidationError::InvalidEmail => write!(f, "Email address is not valid"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Character-count bound shared by every text field the server accepts.
pub fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field });
    }
    let count = trimmed.chars().count();
    if count < min || count > max {
        return Err(ValidationError::Length { field, min, max });
    }
    Ok(())
}

pub fn check_email(value: &str) -> Result<(), ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required { field: "email" });
    }
    // Same shallow shape check the server applies; full validation is its job.
    let Some((local, host)) = trimmed.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    if local.is_empty() || host.is_empty() || !host.contains('.') {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}
