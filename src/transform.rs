use std::sync::LazyLock;

use regex::{bytes, Captures, Regex};

/// Exponent-notation number not embedded in an identifier. `pre` consumes
/// the boundary character so it can be written back unchanged.
const SCIENTIFIC_PATTERN: &str =
    r"(?P<pre>^|[^\w.])(?P<sign>[+-]?)(?P<mant>\d+(?:\.\d*)?|\.\d+)[eE](?P<esign>[+-]?)(?P<exp>\d+)\b";

static SCIENTIFIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SCIENTIFIC_PATTERN).expect("scientific notation pattern is valid"));

static SCIENTIFIC_BYTES: LazyLock<bytes::Regex> = LazyLock::new(|| {
    bytes::Regex::new(SCIENTIFIC_PATTERN).expect("scientific notation pattern is valid")
});

/// Characters after which a right-anchored literal may start.
const TOKEN_DELIMITERS: &[char] = &['"', '\'', '=', ':', ',', ';', '(', '[', '<'];

/// A normalization rule applied to golden and actual text before comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Remove `needle`. When `right_anchored`, only occurrences that start a
    /// token are removed, leaving the right-hand remainder of the token.
    Literal { needle: String, right_anchored: bool },
    /// Rewrite `1.5E5`, `1.50e+005`, ... into `1.5e+05`.
    ScientificExponent,
}

impl Transform {
    /// Strip a path prefix such as `/abs/source/tests/` from tokens.
    pub fn strip_prefix(needle: impl Into<String>) -> Self {
        Transform::Literal {
            needle: needle.into(),
            right_anchored: true,
        }
    }

    pub fn remove(needle: impl Into<String>) -> Self {
        Transform::Literal {
            needle: needle.into(),
            right_anchored: false,
        }
    }

    pub fn apply(&self, text: &str) -> String {
        match self {
            Transform::Literal { needle, .. } if needle.is_empty() => text.to_string(),
            Transform::Literal {
                needle,
                right_anchored: false,
            } => text.replace(needle.as_str(), ""),
            Transform::Literal {
                needle,
                right_anchored: true,
            } => strip_anchored(text, needle),
            Transform::ScientificExponent => normalize_exponents(text),
        }
    }

    /// Same rewrite as [`Transform::apply`] on content that may not be UTF-8.
    pub fn apply_bytes(&self, text: &[u8]) -> Vec<u8> {
        match self {
            Transform::Literal { needle, .. } if needle.is_empty() => text.to_vec(),
            Transform::Literal {
                needle,
                right_anchored,
            } => strip_bytes(text, needle.as_bytes(), *right_anchored),
            Transform::ScientificExponent => normalize_exponents_bytes(text),
        }
    }

    fn is_literal(&self) -> bool {
        matches!(self, Transform::Literal { .. })
    }
}

fn at_token_start(text: &str, idx: usize) -> bool {
    match text[..idx].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || TOKEN_DELIMITERS.contains(&c),
    }
}

fn strip_anchored(text: &str, needle: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut consumed = 0;
    while let Some(pos) = rest.find(needle) {
        let idx = consumed + pos;
        if at_token_start(text, idx) {
            out.push_str(&rest[..pos]);
            rest = &rest[pos + needle.len()..];
            consumed = idx + needle.len();
            // A stripped prefix may uncover another copy at the same token start.
            while let Some(tail) = rest.strip_prefix(needle) {
                consumed += needle.len();
                rest = tail;
            }
        } else {
            let step = pos + needle.chars().next().map_or(1, char::len_utf8);
            out.push_str(&rest[..step]);
            rest = &rest[step..];
            consumed += step;
        }
    }
    out.push_str(rest);
    out
}

fn at_token_start_bytes(text: &[u8], idx: usize) -> bool {
    let head = &text[..idx];
    let Some(&last) = head.last() else {
        return true;
    };
    if last.is_ascii() {
        let c = char::from(last);
        return c.is_whitespace() || TOKEN_DELIMITERS.contains(&c);
    }
    // Trailing multi-byte character, if the bytes before idx end in one.
    (2..=head.len().min(4))
        .find_map(|n| std::str::from_utf8(&head[head.len() - n..]).ok())
        .and_then(|tail| tail.chars().next_back())
        .is_some_and(char::is_whitespace)
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn strip_bytes(text: &[u8], needle: &[u8], right_anchored: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut consumed = 0;
    while let Some(pos) = find_bytes(&text[consumed..], needle) {
        let idx = consumed + pos;
        if !right_anchored || at_token_start_bytes(text, idx) {
            out.extend_from_slice(&text[consumed..idx]);
            consumed = idx + needle.len();
            while right_anchored && text[consumed..].starts_with(needle) {
                consumed += needle.len();
            }
        } else {
            out.extend_from_slice(&text[consumed..=idx]);
            consumed = idx + 1;
        }
    }
    out.extend_from_slice(&text[consumed..]);
    out
}

fn normalize_exponents(text: &str) -> String {
    SCIENTIFIC
        .replace_all(text, |caps: &Captures<'_>| {
            canonical_number(
                &caps["pre"],
                &caps["sign"],
                &caps["mant"],
                &caps["esign"],
                &caps["exp"],
            )
        })
        .into_owned()
}

fn normalize_exponents_bytes(text: &[u8]) -> Vec<u8> {
    SCIENTIFIC_BYTES
        .replace_all(text, |caps: &bytes::Captures<'_>| {
            // Every group matches whole UTF-8 characters, so this never loses bytes.
            let field = |name: &str| String::from_utf8_lossy(&caps[name]).into_owned();
            canonical_number(
                &field("pre"),
                &field("sign"),
                &field("mant"),
                &field("esign"),
                &field("exp"),
            )
            .into_bytes()
        })
        .into_owned()
}

fn canonical_number(pre: &str, sign: &str, mant: &str, esign: &str, exp: &str) -> String {
    let mantissa = canonical_mantissa(mant);
    let digits = exp.trim_start_matches('0');
    let exp_sign = if esign == "-" && !digits.is_empty() {
        '-'
    } else {
        '+'
    };
    let sign = if sign == "-" { "-" } else { "" };
    format!("{pre}{sign}{mantissa}e{exp_sign}{digits:0>2}")
}

fn canonical_mantissa(mant: &str) -> String {
    let (int, frac) = mant.split_once('.').unwrap_or((mant, ""));
    let int = int.trim_start_matches('0');
    let int = if int.is_empty() { "0" } else { int };
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        int.to_string()
    } else {
        format!("{int}.{frac}")
    }
}

/// Ordered list of transforms. Later transforms see already-rewritten text.
///
/// Consecutive literal transforms are repeated until none of them changes
/// the text, so stripping one prefix cannot expose another that an earlier
/// stage would have removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline(Vec<Transform>);

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transform: Transform) {
        self.0.push(transform);
    }

    pub fn with(mut self, transform: Transform) -> Self {
        self.push(transform);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transform> {
        self.0.iter()
    }

    pub fn apply(&self, text: &str) -> String {
        self.run(text.to_string(), |transform, acc: &String| transform.apply(acc))
    }

    pub fn apply_bytes(&self, text: &[u8]) -> Vec<u8> {
        self.run(text.to_vec(), |transform, acc: &Vec<u8>| transform.apply_bytes(acc))
    }

    fn run<T: PartialEq>(&self, input: T, apply: impl Fn(&Transform, &T) -> T) -> T {
        let mut value = input;
        for stage in self.0.chunk_by(|a, b| a.is_literal() && b.is_literal()) {
            loop {
                let next = stage[1..]
                    .iter()
                    .fold(apply(&stage[0], &value), |acc, transform| apply(transform, &acc));
                // Literals only ever remove text, so this terminates.
                let settled = !stage[0].is_literal() || next == value;
                value = next;
                if settled {
                    break;
                }
            }
        }
        value
    }
}

impl FromIterator<Transform> for Pipeline {
    fn from_iter<I: IntoIterator<Item = Transform>>(iter: I) -> Self {
        Pipeline(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Pipeline {
    type Item = &'a Transform;
    type IntoIter = std::slice::Iter<'a, Transform>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
