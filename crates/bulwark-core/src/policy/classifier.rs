//! Operation classification from GraphQL document text.
//!
//! Only the leading keyword matters for retry eligibility. The scanner
//! skips ignored tokens and any leading fragment definitions, then reads
//! the first operation's keyword, name and root field. It never builds an
//! AST and never fails: anything it cannot make sense of is a `query`.

use serde::Serialize;
use std::fmt;

/// Endpoint key used when an operation has neither a name nor a root field.
pub const ANONYMOUS_ENDPOINT: &str = "anonymous";

const BOM: &[u8] = "\u{feff}".as_bytes();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Only queries are safe to run more than once.
    pub const fn is_idempotent(self) -> bool {
        matches!(self, Self::Query)
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "query" => Some(Self::Query),
            "mutation" => Some(Self::Mutation),
            "subscription" => Some(Self::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of the first operation in `operation_text`.
///
/// Shorthand selection sets (`{ viewer { id } }`), empty input and unknown
/// keywords are all treated as `query`.
pub fn classify_operation(operation_text: &str) -> OperationKind {
    match Scanner::new(operation_text).operation_head() {
        Head::Keyword(kind, _) => kind,
        Head::Shorthand | Head::Unknown => OperationKind::Query,
    }
}

/// Endpoint key for an operation: its declared name, else the first root
/// field (aliases resolved to the field), else [`ANONYMOUS_ENDPOINT`].
pub fn derive_endpoint(operation_text: &str) -> String {
    let mut scanner = Scanner::new(operation_text);
    let name = match scanner.operation_head() {
        Head::Keyword(_, name) => name,
        Head::Shorthand => None,
        Head::Unknown => return ANONYMOUS_ENDPOINT.to_string(),
    };
    if let Some(name) = name {
        return name.to_string();
    }
    scanner.first_root_field().unwrap_or(ANONYMOUS_ENDPOINT).to_string()
}

enum Head<'a> {
    Keyword(OperationKind, Option<&'a str>),
    Shorthand,
    Unknown,
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, bytes: text.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn starts_with(&self, needle: &[u8]) -> bool {
        self.bytes.get(self.pos..).is_some_and(|rest| rest.starts_with(needle))
    }

    /// Leaves the cursor after the operation name, or on `{` for shorthand.
    fn operation_head(&mut self) -> Head<'a> {
        loop {
            self.skip_ignored();
            match self.peek() {
                Some(b'{') => return Head::Shorthand,
                Some(_) => {},
                None => return Head::Unknown,
            }
            let Some(keyword) = self.read_name() else {
                return Head::Unknown;
            };
            if keyword == "fragment" {
                self.skip_to_selection_set();
                self.skip_block();
                continue;
            }
            let Some(kind) = OperationKind::from_keyword(keyword) else {
                return Head::Unknown;
            };
            self.skip_ignored();
            return Head::Keyword(kind, self.read_name());
        }
    }

    fn first_root_field(&mut self) -> Option<&'a str> {
        self.skip_to_selection_set();
        if self.peek() != Some(b'{') {
            return None;
        }
        self.pos += 1;
        self.skip_ignored();
        let first = self.read_name()?;
        self.skip_ignored();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_ignored();
            return self.read_name();
        }
        Some(first)
    }

    fn skip_ignored(&mut self) {
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\n' | b'\r' | b',' => self.pos += 1,
                b'#' => self.skip_comment(),
                _ if self.starts_with(BOM) => self.pos += BOM.len(),
                _ => break,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' || byte == b'\r' {
                break;
            }
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b == b'_' || b.is_ascii_alphabetic() => self.pos += 1,
            _ => return None,
        }
        while let Some(b) = self.peek() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.text.get(start..self.pos)
    }

    fn skip_string(&mut self) {
        if self.starts_with(b"\"\"\"") {
            self.pos += 3;
            while self.pos < self.bytes.len() {
                if self.starts_with(b"\\\"\"\"") {
                    self.pos += 4;
                } else if self.starts_with(b"\"\"\"") {
                    self.pos += 3;
                    return;
                } else {
                    self.pos += 1;
                }
            }
            return;
        }

        self.pos += 1;
        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'\\' => self.pos += 1,
                b'"' | b'\n' => return,
                _ => {},
            }
        }
    }

    /// Advance to the `{` opening a definition's selection set. Braces
    /// inside parenthesized arguments or variable defaults do not count.
    fn skip_to_selection_set(&mut self) {
        let mut depth = 0_usize;
        while let Some(byte) = self.peek() {
            match byte {
                b'"' => {
                    self.skip_string();
                    continue;
                },
                b'#' => {
                    self.skip_comment();
                    continue;
                },
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b'{' if depth == 0 => return,
                _ => {},
            }
            self.pos += 1;
        }
    }

    /// Skip a balanced `{ ... }` block starting at the cursor.
    fn skip_block(&mut self) {
        let mut depth = 0_usize;
        while let Some(byte) = self.peek() {
            match byte {
                b'"' => {
                    self.skip_string();
                    continue;
                },
                b'#' => {
                    self.skip_comment();
                    continue;
                },
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                },
                _ => {},
            }
            self.pos += 1;
        }
    }
}
