use anyhow::{Result, anyhow};

/// Normalizes a domain to its lowercase ASCII (punycode) form. The result is
/// also used as the file stem of the domain's artifacts, so anything outside
/// hostname characters (plus a leading wildcard label) is refused.
pub fn normalize_domain_for_storage(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(anyhow!("domain name is required"));
    }
    let ascii = idna::domain_to_ascii(trimmed)
        .map_err(|err| anyhow!("invalid domain name: {err}"))?
        .to_lowercase();
    let host = ascii.strip_prefix("*.").unwrap_or(&ascii);
    let valid = !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if !valid {
        return Err(anyhow!("invalid domain name: {trimmed}"));
    }
    Ok(ascii)
}

pub fn normalize_domain_for_display(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('.');
    let (unicode, _) = idna::domain_to_unicode(trimmed);
    unicode.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_trailing_dot() {
        assert_eq!(
            normalize_domain_for_storage(" Example.COM. ").unwrap(),
            "example.com"
        );
    }

    #[test]
    fn converts_idn_to_punycode() {
        assert_eq!(
            normalize_domain_for_storage("testé.fr").unwrap(),
            "xn--test-epa.fr"
        );
        assert_eq!(normalize_domain_for_display("xn--test-epa.fr"), "testé.fr");
    }

    #[test]
    fn keeps_wildcard_label() {
        assert_eq!(
            normalize_domain_for_storage("*.Example.com").unwrap(),
            "*.example.com"
        );
    }

    #[test]
    fn rejects_path_like_input() {
        assert!(normalize_domain_for_storage("").is_err());
        assert!(normalize_domain_for_storage("../etc/passwd").is_err());
        assert!(normalize_domain_for_storage("a..b").is_err());
    }
}
