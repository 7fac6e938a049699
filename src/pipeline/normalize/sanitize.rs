use once_cell::sync::Lazy;
use regex::Regex;

static MAC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:-]){5}[0-9A-Fa-f]{2}$").unwrap());

pub fn is_valid_mac(mac: &str) -> bool {
    MAC_RE.is_match(mac)
}

/// Uppercase, colon-separated form of a MAC address. Callers validate first.
pub fn canonical_mac(mac: &str) -> String {
    mac.chars()
        .filter(|c| c.is_ascii_hexdigit() || *c == ':' || *c == '-')
        .map(|c| if c == '-' { ':' } else { c.to_ascii_uppercase() })
        .collect()
}

/// Make free text safe for a downstream consumer that may render it as markup:
/// truncate to `max_chars`, escape markup-significant characters, then drop control characters.
pub fn sanitize_text(value: &str, max_chars: usize) -> String {
    let truncated: String = value.chars().take(max_chars).collect();
    strip_control(&escape_html(&truncated))
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn strip_control(value: &str) -> String {
    value.chars().filter(|c| (*c as u32) >= 32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_macs_are_accepted() {
        for mac in [
            "AA:BB:CC:DD:EE:FF",
            "aa:bb:cc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "00:11:22:33:44:55",
            "0a:1B-2c:3D-4e:5F",
        ] {
            assert!(is_valid_mac(mac), "{} should be valid", mac);
        }
    }

    #[test]
    fn invalid_macs_are_rejected() {
        for mac in [
            "invalid",
            "GG:HH:II:JJ:KK:LL",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AABBCCDDEEFF",
            "AA:BB:CC:DD:EE:FF\n",
            " AA:BB:CC:DD:EE:FF",
            "'; DROP TABLE devices; --",
            "",
        ] {
            assert!(!is_valid_mac(mac), "{:?} should be invalid", mac);
        }
    }

    #[test]
    fn macs_canonicalize_to_upper_colon_form() {
        assert_eq!(canonical_mac("aa-bb-cc-dd-ee-ff"), "AA:BB:CC:DD:EE:FF");
        assert_eq!(canonical_mac("0a:1b-2c:3d-4e:5f"), "0A:1B:2C:3D:4E:5F");
    }

    #[test]
    fn markup_is_escaped() {
        let out = sanitize_text("<script>alert('XSS')</script>", 256);
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<script>"));
        assert_eq!(out, "&lt;script&gt;alert(&#x27;XSS&#x27;)&lt;/script&gt;");
        assert_eq!(escape_html("a & \"b\""), "a &amp; &quot;b&quot;");
    }

    #[test]
    fn control_characters_are_stripped() {
        let out = sanitize_text("Test\x00\x01\x02String", 256);
        assert_eq!(out, "TestString");
        assert!(out.chars().all(|c| c as u32 >= 32));
        assert_eq!(strip_control("tab\there\nnewline"), "tabherenewline");
    }

    #[test]
    fn truncation_happens_before_escaping() {
        let long = "A".repeat(100);
        assert_eq!(sanitize_text(&long, 32).chars().count(), 32);
        // The limit counts source characters, so an escaped entity can push past it
        assert_eq!(sanitize_text("<<<", 2), "&lt;&lt;");
        assert_eq!(sanitize_text("héllo wörld", 5), "héllo");
    }
}
