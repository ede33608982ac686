//! Normalization boundary for rule keys.
//!
//! Emails and resource names are compared case-insensitively and without
//! surrounding whitespace. Everything that enters the core (principals,
//! resource descriptors, rule payloads, rows read back from storage) passes
//! through these functions once, so the resolver can compare plain strings.

/// Trim and lowercase an email address.
pub fn email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trim and lowercase a resource name.
pub fn resource_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trim a role name. Role names keep their case.
pub fn role(raw: &str) -> String {
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(email(" Jane@Example.com "), "jane@example.com");
        assert_eq!(email("jane@example.com"), "jane@example.com");
    }

    #[test]
    fn resource_name_is_trimmed_and_lowercased() {
        assert_eq!(resource_name("\tAudit-Reports\n"), "audit-reports");
    }

    #[test]
    fn role_keeps_case() {
        assert_eq!(role("  Auditor "), "Auditor");
    }
}
