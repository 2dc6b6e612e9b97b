use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex_syntax::hir::{Hir, HirKind, Literal};
use std::borrow::Cow;

const QNAME_ENCODE_SET: &AsciiSet = &CONTROLS.add(b' ').add(b':').add(b'%');

/// Maximum number of leading literal characters considered when deriving a
/// `[lower, upper)` prefix range from a regular expression.
const MAX_PREFIX_LEN: usize = 10;

pub fn join_qname(ns: &str, name: &str) -> String {
    let mut result = String::with_capacity(ns.len() + name.len() + 2);
    if !ns.is_empty() {
        let encoded_anno_ns: Cow<str> = utf8_percent_encode(ns, QNAME_ENCODE_SET).into();
        result.push_str(&encoded_anno_ns);
        result.push_str("::");
    }
    let encoded_anno_name: Cow<str> = utf8_percent_encode(name, QNAME_ENCODE_SET).into();
    result.push_str(&encoded_anno_name);
    result
}

pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some(pos) = qname.find("::") {
        (Some(&qname[..pos]), &qname[pos + 2..])
    } else {
        (None, qname)
    }
}

pub fn regex_full_match(pattern: &str) -> String {
    let mut full_match_pattern = String::new();
    full_match_pattern.push_str(r"\A(");
    full_match_pattern.push_str(pattern);
    full_match_pattern.push_str(r")\z");

    full_match_pattern
}

/// Walk the leading literal characters of a parsed pattern, stopping at the
/// first non-literal (alternation, repetition, class, ...) construct or after
/// `MAX_PREFIX_LEN` characters, whichever comes first.
fn literal_prefix(hir: &Hir) -> String {
    fn walk(hir: &Hir, out: &mut String) -> bool {
        if out.len() >= MAX_PREFIX_LEN {
            return false;
        }
        match hir.kind() {
            HirKind::Literal(Literal::Unicode(c)) => {
                out.push(*c);
                true
            }
            HirKind::Literal(Literal::Byte(b)) => {
                out.push(*b as char);
                true
            }
            HirKind::Concat(items) => {
                for item in items {
                    if !walk(item, out) {
                        return false;
                    }
                    if out.len() >= MAX_PREFIX_LEN {
                        return false;
                    }
                }
                true
            }
            HirKind::Group(g) => walk(&g.hir, out),
            _ => false,
        }
    }
    let mut out = String::new();
    walk(hir, &mut out);
    out
}

/// Compute a deterministic `[lower, upper]` range of strings reachable as a
/// prefix of `pattern`'s matches, used to narrow `guess_max_count` estimation
/// for regex-based annotation value searches.
///
/// When the pattern has no useful literal prefix, the range degenerates to
/// `("", None)`, i.e. "could be anything".
pub fn regex_prefix_range(pattern: &str) -> (String, Option<String>) {
    let parser = regex_syntax::Parser::new().parse(pattern);
    let prefix = match parser {
        Ok(hir) => literal_prefix(&hir),
        Err(_) => String::new(),
    };
    if prefix.is_empty() {
        return (String::new(), None);
    }
    // upper bound: increment the last character so the range covers every
    // string that starts with `prefix`.
    let mut upper_chars: Vec<char> = prefix.chars().collect();
    if let Some(last) = upper_chars.last_mut() {
        *last = ((*last as u32) + 1)
            .try_into()
            .unwrap_or(char::MAX);
    }
    let upper: String = upper_chars.into_iter().collect();
    (prefix, Some(upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qname_roundtrip() {
        let joined = join_qname("tiger", "pos");
        assert_eq!(joined, "tiger::pos");
        assert_eq!(split_qname(&joined), (Some("tiger"), "pos"));
    }

    #[test]
    fn qname_without_namespace() {
        assert_eq!(split_qname("pos"), (None, "pos"));
    }

    #[test]
    fn prefix_range_for_literal_pattern() {
        let (lower, upper) = regex_prefix_range("Bilharziose");
        assert_eq!(lower, "Bilharziose");
        assert!(upper.unwrap() > lower);
    }

    #[test]
    fn prefix_range_for_unanchored_pattern() {
        let (lower, upper) = regex_prefix_range(".*");
        assert_eq!(lower, "");
        assert_eq!(upper, None);
    }
}
