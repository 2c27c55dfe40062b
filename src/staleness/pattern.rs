//! Ref state patterns
//!
//! A pattern records that every ref matching a glob was captured at index
//! time. Wire form is `<project>:<glob>`.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use super::errors::{StalenessError, StalenessResult};

/// Compiled ref glob. `*` matches any run of characters, `/` included.
#[derive(Debug, Clone)]
pub struct RefStatePattern {
    pattern: String,
    prefix: String,
    regex: Regex,
}

impl RefStatePattern {
    /// Compiles a glob.
    ///
    /// The glob must contain a `*` that is not its first character, and must
    /// be a valid ref name once every `*` is replaced by a letter.
    pub fn create(pattern: &str) -> StalenessResult<Self> {
        let invalid = || StalenessError::InvalidPattern(pattern.to_string());

        let star = match pattern.find('*') {
            Some(i) if i > 0 => i,
            _ => return Err(invalid()),
        };
        if !is_valid_ref_name(&pattern.replace('*', "x")) {
            return Err(invalid());
        }

        let body: Vec<String> = pattern.split('*').map(regex::escape).collect();
        let regex = Regex::new(&format!("^{}$", body.join(".*"))).map_err(|_| invalid())?;

        Ok(Self {
            pattern: pattern.to_string(),
            prefix: pattern[..star].to_string(),
            regex,
        })
    }

    /// Parses wire entries, grouped by project
    pub fn parse_patterns<I, B>(
        entries: I,
    ) -> StalenessResult<BTreeMap<String, Vec<RefStatePattern>>>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut out: BTreeMap<String, Vec<RefStatePattern>> = BTreeMap::new();
        for entry in entries {
            let raw = entry.as_ref();
            let text = std::str::from_utf8(raw).map_err(|_| {
                StalenessError::InvalidPattern(String::from_utf8_lossy(raw).into_owned())
            })?;
            let parts: Vec<&str> = text.split(':').collect();
            if parts.len() != 2 || parts[0].is_empty() {
                return Err(StalenessError::InvalidPattern(text.to_string()));
            }
            out.entry(parts[0].to_string())
                .or_default()
                .push(Self::create(parts[1])?);
        }
        Ok(out)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Literal text before the first `*`
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full, case-sensitive match
    pub fn matches(&self, ref_name: &str) -> bool {
        self.regex.is_match(ref_name)
    }

    pub fn to_byte_array(&self, project: &str) -> Vec<u8> {
        format!("{}:{}", project, self.pattern).into_bytes()
    }
}

impl PartialEq for RefStatePattern {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for RefStatePattern {}

impl fmt::Display for RefStatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Git ref name rules, for names with at least two components
pub fn is_valid_ref_name(name: &str) -> bool {
    if name.is_empty() || name.ends_with(".lock") || name.contains("@{") {
        return false;
    }

    let mut components = 1;
    let mut prev = '/';
    for c in name.chars() {
        if c <= ' ' || c == '\u{7f}' {
            return false;
        }
        match c {
            '.' if prev == '/' || prev == '.' => return false,
            '/' if prev == '/' => return false,
            '/' => components += 1,
            '~' | '^' | ':' | '?' | '[' | '*' | '\\' => return false,
            _ => {}
        }
        prev = c;
    }

    prev != '.' && prev != '/' && components >= 2
}
