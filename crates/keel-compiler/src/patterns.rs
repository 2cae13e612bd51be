// patterns.rs - Prohibited diff patterns derived from security flags.
//
// Each pattern is a regular expression the local engine applies to added
// diff lines. Patterns are stored as strings in the package so the
// verifier and the scanner agree on them byte for byte.

use keel_model::ProhibitedPattern;

/// The flags that select prohibited patterns, after precedence merging.
#[derive(Debug, Clone, Default)]
pub struct PatternFlags<'a> {
    pub forbid_hardcoded_secrets: bool,
    pub forbid_private_keys: bool,
    pub forbid_pii_in_logs: bool,
    pub banned_functions: &'a [String],
}

fn pattern(name: &str, regex: &str, description: &str) -> ProhibitedPattern {
    ProhibitedPattern {
        name: name.to_string(),
        pattern: regex.to_string(),
        description: description.to_string(),
    }
}

pub fn prohibited_patterns(flags: &PatternFlags<'_>) -> Vec<ProhibitedPattern> {
    let mut out = Vec::new();

    if flags.forbid_hardcoded_secrets {
        out.push(pattern(
            "aws_access_key",
            r"\b(AKIA|ASIA)[0-9A-Z]{16}\b",
            "AWS access key id",
        ));
        out.push(pattern(
            "github_token",
            r"\bgh[pousr]_[A-Za-z0-9]{36,}\b",
            "GitHub personal or app token",
        ));
        out.push(pattern(
            "hardcoded_secret",
            r#"(?i)\b(api[_-]?key|secret|password|passwd|token)\b\s*[:=]\s*["'][^"'\s]{8,}["']"#,
            "secret literal assigned to a credential-like name",
        ));
    }

    if flags.forbid_private_keys {
        out.push(pattern(
            "private_key",
            r"-----BEGIN (RSA |EC |OPENSSH |DSA |PGP )?PRIVATE KEY( BLOCK)?-----",
            "private key material",
        ));
    }

    if flags.forbid_pii_in_logs {
        out.push(pattern(
            "us_ssn",
            r"\b\d{3}-\d{2}-\d{4}\b",
            "US social security number",
        ));
    }

    for function in flags.banned_functions {
        let function = function.trim();
        if function.is_empty() {
            continue;
        }
        out.push(pattern(
            &format!("banned_function:{}", function),
            &format!(r"\b{}\s*\(", regex::escape(function)),
            "call to a function banned by the org baseline",
        ));
    }

    out
}
