//! Glob URL patterns
//!
//! Patterns follow the browser-routing glob dialect and are matched against
//! the full request URL, anchored at both ends:
//!
//! - `**` standing as a whole path segment matches any characters including
//!   `/` (`**/` may also match nothing)
//! - `*`, and a `**` glued to other characters such as `order**`, matches any
//!   characters except `/`
//! - `{a,b}` matches either alternative
//! - everything else is literal, including `?`

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MockError, MockResult};

/// A compiled glob pattern over request URLs
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    /// Compile a glob pattern
    pub fn new(pattern: &str) -> MockResult<Self> {
        let invalid = |reason: &str| MockError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let source = glob_to_regex(pattern).map_err(|reason| invalid(&reason))?;
        let regex = Regex::new(&source).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// The glob as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check whether a full URL matches this pattern
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

fn glob_to_regex(glob: &str) -> Result<String, String> {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    let mut in_group = false;
    let mut i = 0;

    out.push('^');
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                let before = if i == 0 { None } else { Some(chars[i - 1]) };
                let mut stars = 1;
                while chars.get(i + 1) == Some(&'*') {
                    stars += 1;
                    i += 1;
                }
                let after = chars.get(i + 1).copied();
                let bounded = |c: Option<char>| c.map_or(true, |c| c == '/');

                if stars > 1 && bounded(before) && bounded(after) {
                    if after.is_some() {
                        i += 1;
                        out.push_str("(?:.*/)?");
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str("[^/]*");
                }
            }
            '{' => {
                if in_group {
                    return Err("nested '{' groups are not supported".to_string());
                }
                in_group = true;
                out.push_str("(?:");
            }
            '}' => {
                if !in_group {
                    return Err("'}' without matching '{'".to_string());
                }
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            }
        }
        i += 1;
    }

    if in_group {
        return Err("unclosed '{' group".to_string());
    }
    out.push('$');

    Ok(out)
}

impl TryFrom<String> for UrlPattern {
    type Error = MockError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<UrlPattern> for String {
    fn from(pattern: UrlPattern) -> Self {
        pattern.source
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for UrlPattern {}

impl fmt::Debug for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UrlPattern").field(&self.source).finish()
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
