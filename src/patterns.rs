//! Built-in regular expressions for common string formats.
//!
//! Each pattern has a registry name usable from JSON declarations
//! (`"regEx": "Email"`) and a message that replaces the generic
//! "failed regular expression validation" text.

use std::sync::LazyLock;

use regex::Regex;

const IPV4: &str = r"(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])";
const IPV6: &str = r"(?:(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}|(?:[0-9A-Fa-f]{1,4}:){1,7}:|(?:[0-9A-Fa-f]{1,4}:){1,6}:[0-9A-Fa-f]{1,4}|(?:[0-9A-Fa-f]{1,4}:){1,5}(?::[0-9A-Fa-f]{1,4}){1,2}|(?:[0-9A-Fa-f]{1,4}:){1,4}(?::[0-9A-Fa-f]{1,4}){1,3}|(?:[0-9A-Fa-f]{1,4}:){1,3}(?::[0-9A-Fa-f]{1,4}){1,4}|(?:[0-9A-Fa-f]{1,4}:){1,2}(?::[0-9A-Fa-f]{1,4}){1,5}|[0-9A-Fa-f]{1,4}:(?::[0-9A-Fa-f]{1,4}){1,6}|:(?:(?::[0-9A-Fa-f]{1,4}){1,7}|:))";
const LABEL: &str = r"[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?";
const EMAIL_LOCAL: &str = r"[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+";

fn anchored(body: &str) -> Regex {
    Regex::new(&format!("^(?:{body})$")).expect("built-in pattern compiles")
}

pub static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| anchored(&format!(r"{EMAIL_LOCAL}@{LABEL}(?:\.{LABEL})*")));
pub static EMAIL_WITH_TLD: LazyLock<Regex> =
    LazyLock::new(|| anchored(&format!(r"{EMAIL_LOCAL}@(?:{LABEL}\.)+[A-Za-z]{{2,}}")));
pub static DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| anchored(&format!(r"(?:{LABEL}\.)+[A-Za-z]{{2,}}")));
pub static WEAK_DOMAIN: LazyLock<Regex> =
    LazyLock::new(|| anchored(r"(?:[A-Za-z0-9-]+\.)+[A-Za-z0-9-]+"));
pub static IP: LazyLock<Regex> = LazyLock::new(|| anchored(&format!("{IPV4}|{IPV6}")));
pub static IP_V4: LazyLock<Regex> = LazyLock::new(|| anchored(IPV4));
pub static IP_V6: LazyLock<Regex> = LazyLock::new(|| anchored(IPV6));
pub static URL: LazyLock<Regex> =
    LazyLock::new(|| anchored(r"(?:https?|ftp)://[^\s/$.?#][^\s]*"));
pub static ID: LazyLock<Regex> =
    LazyLock::new(|| anchored("[23456789ABCDEFGHJKLMNPQRSTWXYZabcdefghijkmnopqrstuvwxyz]{17}"));
pub static ZIP_CODE: LazyLock<Regex> = LazyLock::new(|| anchored(r"\d{5}(?:-\d{4})?"));
pub static PHONE: LazyLock<Regex> = LazyLock::new(|| anchored(r"\+?[1-9]\d{1,14}"));

struct Entry {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
    message: &'static str,
}

static REGISTRY: &[Entry] = &[
    Entry { name: "Email", pattern: &EMAIL, message: "must be a valid email address" },
    Entry { name: "EmailWithTLD", pattern: &EMAIL_WITH_TLD, message: "must be a valid email address" },
    Entry { name: "Domain", pattern: &DOMAIN, message: "must be a valid domain" },
    Entry { name: "WeakDomain", pattern: &WEAK_DOMAIN, message: "must be a valid domain" },
    Entry { name: "IP", pattern: &IP, message: "must be a valid IPv4 or IPv6 address" },
    Entry { name: "IPv4", pattern: &IP_V4, message: "must be a valid IPv4 address" },
    Entry { name: "IPv6", pattern: &IP_V6, message: "must be a valid IPv6 address" },
    Entry { name: "Url", pattern: &URL, message: "must be a valid URL" },
    Entry { name: "Id", pattern: &ID, message: "must be a valid alphanumeric ID" },
    Entry { name: "ZipCode", pattern: &ZIP_CODE, message: "must be a valid ZIP code" },
    Entry { name: "Phone", pattern: &PHONE, message: "must be a valid phone number" },
];

/// Look up a built-in pattern by registry name.
pub fn by_name(name: &str) -> Option<Regex> {
    REGISTRY
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| Regex::clone(entry.pattern))
}

/// The specific message for a built-in pattern, matched by source text.
pub fn message_for(source: &str) -> Option<&'static str> {
    REGISTRY
        .iter()
        .find(|entry| entry.pattern.as_str() == source)
        .map(|entry| entry.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_patterns() {
        assert!(EMAIL.is_match("someone@example.com"));
        assert!(EMAIL.is_match("someone@localhost"));
        assert!(!EMAIL_WITH_TLD.is_match("someone@localhost"));
        assert!(!EMAIL.is_match("not an email"));
    }

    #[test]
    fn ip_patterns() {
        assert!(IP_V4.is_match("192.168.0.1"));
        assert!(!IP_V4.is_match("256.1.1.1"));
        assert!(IP_V6.is_match("2001:db8::1"));
        assert!(IP.is_match("::1"));
    }

    #[test]
    fn misc_patterns() {
        assert!(URL.is_match("https://example.com/path?q=1"));
        assert!(!URL.is_match("example.com"));
        assert!(ZIP_CODE.is_match("12345-6789"));
        assert!(ID.is_match("aBcDeFgHiJkLmNoPq"));
        assert!(DOMAIN.is_match("sub.example.org"));
    }

    #[test]
    fn registry_lookups() {
        let email = by_name("Email").unwrap();
        assert_eq!(message_for(email.as_str()), Some("must be a valid email address"));
        assert!(by_name("Nope").is_none());
        assert!(message_for("^abc$").is_none());
    }
}
