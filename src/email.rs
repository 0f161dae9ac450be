//! Obfuscated `mailto:` links for email autolinks.

use rand::Rng;

/// Render `addr` as a `mailto:` anchor with its characters randomly encoded
/// as decimal entities, hex entities or left as they are.
///
/// `@` is always encoded and `:` never is. The visible text omits the
/// `mailto:` prefix.
pub fn obfuscate_email<R: Rng + ?Sized>(addr: &str, rng: &mut R) -> String {
    let address = format!("mailto:{addr}");
    let mut encoded = String::with_capacity(address.len() * 6);
    for c in address.chars() {
        match c {
            ':' => encoded.push(c),
            '@' if rng.random_bool(0.5) => push_decimal(&mut encoded, c),
            '@' => push_hex(&mut encoded, c),
            _ => {
                let r: f64 = rng.random();
                if r > 0.9 {
                    encoded.push(c);
                } else if r > 0.45 {
                    push_hex(&mut encoded, c);
                } else {
                    push_decimal(&mut encoded, c);
                }
            }
        }
    }
    let visible = match encoded.rfind(':') {
        Some(colon) if colon > 0 => &encoded[colon + 1..],
        _ => encoded.as_str(),
    };
    format!("<a href=\"{encoded}\">{visible}</a>")
}

fn push_decimal(out: &mut String, c: char) {
    out.push_str(&format!("&#{};", c as u32));
}

fn push_hex(out: &mut String, c: char) {
    out.push_str(&format!("&#x{:02X};", c as u32));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn decode(text: &str) -> String {
        let mut out = String::new();
        let mut rest = text;
        while let Some(at) = rest.find("&#") {
            out.push_str(&rest[..at]);
            let end = at + rest[at..].find(';').unwrap();
            let code = &rest[at + 2..end];
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).unwrap(),
                None => code.parse().unwrap(),
            };
            out.push(char::from_u32(value).unwrap());
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        out
    }

    #[test]
    fn decodes_back_to_the_address() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let html = obfuscate_email("foo@example.com", &mut rng);
            let href = html
                .strip_prefix("<a href=\"")
                .and_then(|rest| rest.split_once("\">"))
                .unwrap();
            assert_eq!(decode(href.0), "mailto:foo@example.com");
            assert_eq!(decode(href.1.strip_suffix("</a>").unwrap()), "foo@example.com");
        }
    }

    #[test]
    fn at_sign_is_always_encoded() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let html = obfuscate_email("a@b.co", &mut rng);
            assert!(!html.contains('@'));
            assert_eq!(html.matches(':').count(), 1);
        }
    }
}
