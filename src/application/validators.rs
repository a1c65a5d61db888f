use validator::ValidateEmail;

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_BANK_CODE_LEN: usize = 50;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 200;
pub const MAX_OBJECT_ID_LEN: usize = 255;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a customer display name: non-blank and bounded.
pub fn is_valid_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name.chars().count() <= MAX_NAME_LEN
}

/// Validates a bank-transfer bank code (e.g. `bca`, `permata`, `test_bank`).
/// Rules:
/// - 1-50 characters
/// - Only lowercase ASCII letters, digits and underscores
///
/// Whether the bank is supported for the currency is decided by the processor.
pub fn is_valid_bank_code(code: &str) -> bool {
    if code.is_empty() || code.len() > MAX_BANK_CODE_LEN {
        return false;
    }

    code.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Validates a processor object id (`sub_...`, `cus_...`) before it is placed in a URL path.
pub fn is_valid_object_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_OBJECT_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates a caller-supplied idempotency key: 1-200 visible ASCII characters.
pub fn is_valid_idempotency_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_IDEMPOTENCY_KEY_LEN
        && key.chars().all(|c| c.is_ascii_graphic())
}
