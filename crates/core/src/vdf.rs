//! Brace-delimited key-value text ("VDF") primitives.
//!
//! Writers in this crate never round-trip a whole document through a tree;
//! they splice text at offsets found by [`find_matching_brace`]. The tree
//! parser here is read-only and used to inspect records.

/// Escape a value for embedding between double quotes.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

/// Brace scanner state shared by the offset helpers.
///
/// Braces inside quoted strings are not structural.
struct Scanner {
    depth: usize,
    in_quote: bool,
    escaped: bool,
}

enum Step {
    Open,
    Close,
    Other,
}

impl Scanner {
    fn new() -> Self {
        Self {
            depth: 0,
            in_quote: false,
            escaped: false,
        }
    }

    fn step(&mut self, b: u8) -> Step {
        if self.in_quote {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_quote = false;
            }
            return Step::Other;
        }
        match b {
            b'"' => {
                self.in_quote = true;
                Step::Other
            }
            b'{' => {
                self.depth += 1;
                Step::Open
            }
            b'}' => {
                self.depth = self.depth.saturating_sub(1);
                Step::Close
            }
            _ => Step::Other,
        }
    }
}

/// Find the brace closing the first `{` at or after `from`.
///
/// Returns the byte offset of the matching `}`, or `None` when no `{`
/// follows `from` or the block never closes.
pub fn find_matching_brace(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut scanner = Scanner::new();
    let mut found_open = false;

    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match scanner.step(b) {
            Step::Open => found_open = true,
            Step::Close if found_open && scanner.depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

/// Offset of the first structural `{` at or after `from`.
pub fn find_open_brace(text: &str, from: usize) -> Option<usize> {
    let mut scanner = Scanner::new();
    for (i, &b) in text.as_bytes().iter().enumerate().skip(from) {
        if let Step::Open = scanner.step(b) {
            return Some(i);
        }
    }
    None
}

/// Number of blocks open at `offset`.
pub fn depth_at(text: &str, offset: usize) -> usize {
    let mut scanner = Scanner::new();
    for &b in text.as_bytes().iter().take(offset) {
        scanner.step(b);
    }
    scanner.depth
}

/// Whether structural `{` and `}` pair up across the whole text.
pub fn is_balanced(text: &str) -> bool {
    let mut depth: i64 = 0;
    let mut scanner = Scanner::new();
    for &b in text.as_bytes() {
        match scanner.step(b) {
            Step::Open => depth += 1,
            Step::Close => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            Step::Other => {}
        }
    }
    depth == 0 && !scanner.in_quote
}

/// Find `"key"` as a whole quoted token at or after `from`.
pub fn find_key(text: &str, key: &str, from: usize) -> Option<usize> {
    let needle = format!("\"{key}\"");
    let mut start = from;
    while let Some(pos) = text.get(start..)?.find(&needle) {
        let at = start + pos;
        if at == 0 || text.as_bytes()[at - 1] != b'\\' {
            return Some(at);
        }
        start = at + needle.len();
    }
    None
}

/// A parsed key/value node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Section(Vec<Node>),
}

/// A named entry in a section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub key: String,
    pub value: Value,
}

impl Node {
    /// Child entries if this node is a section.
    pub fn children(&self) -> &[Node] {
        match &self.value {
            Value::Section(children) => children,
            Value::Str(_) => &[],
        }
    }

    /// First child with the given key (case-insensitive, like the client).
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.children()
            .iter()
            .find(|n| n.key.eq_ignore_ascii_case(key))
    }

    /// String value of a direct child.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match &self.get(key)?.value {
            Value::Str(s) => Some(s),
            Value::Section(_) => None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Str(String),
    Open,
    Close,
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' => tokens.push(Token::Open),
            '}' => tokens.push(Token::Close),
            '"' => {
                let mut s = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                            None => break,
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => s.push(c),
                    }
                }
                if !closed {
                    return Err("unterminated string".to_string());
                }
                tokens.push(Token::Str(s));
            }
            '/' if chars.peek() == Some(&'/') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {}
            // Unquoted tokens are tolerated as bare words.
            _ => {
                let mut s = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || n == '{' || n == '}' || n == '"' {
                        break;
                    }
                    s.push(n);
                    chars.next();
                }
                tokens.push(Token::Str(s));
            }
        }
    }
    Ok(tokens)
}

/// Parse a document into its top-level nodes.
pub fn parse(text: &str) -> Result<Vec<Node>, String> {
    let tokens = tokenize(text)?;
    let mut iter = tokens.into_iter();
    let nodes = parse_entries(&mut iter, false)?;
    Ok(nodes)
}

fn parse_entries(
    iter: &mut std::vec::IntoIter<Token>,
    nested: bool,
) -> Result<Vec<Node>, String> {
    let mut nodes = Vec::new();
    loop {
        let key = match iter.next() {
            Some(Token::Str(key)) => key,
            Some(Token::Close) if nested => return Ok(nodes),
            Some(Token::Close) => return Err("unexpected '}'".to_string()),
            Some(Token::Open) => return Err("section without a name".to_string()),
            None if nested => return Err("unexpected end of input".to_string()),
            None => return Ok(nodes),
        };
        let value = match iter.next() {
            Some(Token::Str(value)) => Value::Str(value),
            Some(Token::Open) => Value::Section(parse_entries(iter, true)?),
            Some(Token::Close) | None => return Err(format!("missing value for \"{key}\"")),
        };
        nodes.push(Node { key, value });
    }
}
