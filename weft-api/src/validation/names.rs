//! DNS-1123 name checks

const MAX_LABEL_LENGTH: usize = 63;
const MAX_SUBDOMAIN_LENGTH: usize = 253;

/// `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, at most 63 characters.
pub fn is_dns1123_label(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_LABEL_LENGTH {
        return false;
    }
    let bytes = value.as_bytes();
    let alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !alnum(bytes[0]) || !alnum(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes.iter().all(|&b| alnum(b) || b == b'-')
}

/// Dot-separated DNS-1123 labels, at most 253 characters.
pub fn is_dns1123_subdomain(value: &str) -> bool {
    if value.is_empty() || value.len() > MAX_SUBDOMAIN_LENGTH {
        return false;
    }
    value.split('.').all(is_dns1123_label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert!(is_dns1123_label("web"));
        assert!(is_dns1123_label("west-coast-1"));
        assert!(is_dns1123_label("0a"));
        assert!(!is_dns1123_label(""));
        assert!(!is_dns1123_label("-web"));
        assert!(!is_dns1123_label("web-"));
        assert!(!is_dns1123_label("Web"));
        assert!(!is_dns1123_label("a.b"));
        assert!(!is_dns1123_label(&"a".repeat(64)));
    }

    #[test]
    fn subdomains() {
        assert!(is_dns1123_subdomain("web"));
        assert!(is_dns1123_subdomain("web.default.svc"));
        assert!(!is_dns1123_subdomain("web..svc"));
        assert!(!is_dns1123_subdomain(".web"));
        assert!(!is_dns1123_subdomain(&"a.".repeat(127)));
    }
}
