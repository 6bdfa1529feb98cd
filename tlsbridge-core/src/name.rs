// Copyright 2026 tlsbridge developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SAN DNS-name normalization.

/// Leading fragments that are not themselves IDNA labels but must survive
/// encoding: the wildcard label and a bare leading dot.
const ACE_PREFIXES: &[&str] = &["*.", "."];

/// Normalize a SAN DNS name to the ASCII form used for hostname matching.
///
/// Names containing `'!'` are pattern-format entries and pass through
/// verbatim. Otherwise the name is IDNA-encoded, trying each known prefix
/// strip first so `*.bücher.example` keeps its wildcard label. A name that
/// encodes to nothing returns `None`; a certificate cannot carry an empty
/// SAN entry.
///
/// When IDNA encoding fails outright the name is reduced to its ASCII
/// characters instead (legacy lossy policy, kept for compatibility with
/// certificates in the wild). Note the IDNA codec lowercases ASCII input.
pub fn dns_name_to_ascii(name: &str) -> Option<String> {
    if name.contains('!') {
        return Some(name.to_string());
    }
    for prefix in ACE_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            if let Ok(encoded) = idna::domain_to_ascii(rest) {
                if encoded.is_empty() {
                    return None;
                }
                return Some(format!("{prefix}{encoded}"));
            }
        }
    }
    match idna::domain_to_ascii(name) {
        Ok(encoded) if encoded.is_empty() => None,
        Ok(encoded) => Some(encoded),
        Err(_) => {
            let lossy: String = name.chars().filter(|c| c.is_ascii()).collect();
            if lossy.is_empty() {
                None
            } else {
                Some(lossy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_names_unchanged() {
        let cases = ["example.com", "a.b.c.example.org", "localhost"];
        for case in cases {
            assert_eq!(Some(case.to_string()), dns_name_to_ascii(case), "{}", case);
        }
        // the IDNA codec folds case
        assert_eq!(
            Some("example.com".to_string()),
            dns_name_to_ascii("EXAMPLE.com")
        );
    }

    #[test]
    fn test_pattern_names_verbatim() {
        let cases = ["foo!bar", "!", "ex!ample.com", "münchen!"];
        for case in cases {
            assert_eq!(Some(case.to_string()), dns_name_to_ascii(case), "{}", case);
        }
    }

    #[test]
    fn test_unicode_encoded() {
        assert_eq!(
            Some("xn--bcher-kva.example".to_string()),
            dns_name_to_ascii("bücher.example")
        );
    }

    #[test]
    fn test_wildcard_prefix_preserved() {
        assert_eq!(
            Some("*.xn--bcher-kva.example".to_string()),
            dns_name_to_ascii("*.bücher.example")
        );
        assert_eq!(
            Some("*.example.com".to_string()),
            dns_name_to_ascii("*.example.com")
        );
    }

    #[test]
    fn test_leading_dot_preserved() {
        assert_eq!(
            Some(".example.com".to_string()),
            dns_name_to_ascii(".example.com")
        );
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(None, dns_name_to_ascii(""));
        assert_eq!(None, dns_name_to_ascii("*."));
    }
}
