use indexmap::IndexMap;

/// Parse properties text into an insertion-ordered map.
///
/// Supports `#`/`!` comments, `=`/`:`/whitespace separators, backslash line
/// continuation and the usual escapes. Later duplicates win.
pub fn parse_properties(content: &str) -> IndexMap<String, String> {
    let mut properties = IndexMap::new();
    let mut logical = String::new();
    let mut continuing = false;

    for raw in content.lines() {
        let line = raw.trim_start();
        if !continuing {
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            logical.clear();
        }

        if ends_with_continuation(line) {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }

        logical.push_str(line);
        continuing = false;
        let (key, value) = split_entry(&logical);
        properties.shift_remove(&key);
        properties.insert(key, value);
    }

    if continuing && !logical.is_empty() {
        let (key, value) = split_entry(&logical);
        properties.shift_remove(&key);
        properties.insert(key, value);
    }

    properties
}

/// Odd number of trailing backslashes
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let mut chars = line.chars().peekable();
    let mut key = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    key.push(unescape(next, &mut chars));
                }
            }
            '=' | ':' => break,
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|c| c.is_whitespace()) {
                    chars.next();
                }
                if chars.peek().is_some_and(|c| *c == '=' || *c == ':') {
                    chars.next();
                }
                break;
            }
            c => key.push(c),
        }
    }

    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }

    let mut value = String::new();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                value.push(unescape(next, &mut chars));
            }
        } else {
            value.push(ch);
        }
    }

    (key, value.trim_end().to_string())
}

fn unescape(ch: char, rest: &mut std::iter::Peekable<std::str::Chars<'_>>) -> char {
    match ch {
        't' => '\t',
        'n' => '\n',
        'r' => '\r',
        'f' => '\u{000C}',
        'u' => {
            let hex: String = rest.by_ref().take(4).collect();
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or('\u{FFFD}')
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_and_comments() {
        let props = parse_properties(
            "# comment\n! also comment\n\na=1\nb : 2\nc 3\n  d=  spaced value  \n",
        );
        assert_eq!(props.get("a").map(String::as_str), Some("1"));
        assert_eq!(props.get("b").map(String::as_str), Some("2"));
        assert_eq!(props.get("c").map(String::as_str), Some("3"));
        assert_eq!(props.get("d").map(String::as_str), Some("spaced value"));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn test_continuation_lines() {
        let props = parse_properties("topics=a,\\\n    b,\\\n    c\nnext=1\n");
        assert_eq!(props.get("topics").map(String::as_str), Some("a,b,c"));
        assert_eq!(props.get("next").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_escaped_separator_in_key() {
        let props = parse_properties("a\\=b=c\nuni=\\u0041x\n");
        assert_eq!(props.get("a=b").map(String::as_str), Some("c"));
        assert_eq!(props.get("uni").map(String::as_str), Some("Ax"));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let props = parse_properties("k=1\nother=x\nk=2\n");
        assert_eq!(props.get("k").map(String::as_str), Some("2"));
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["other", "k"]);
    }

    #[test]
    fn test_empty_value() {
        let props = parse_properties("empty=\n");
        assert_eq!(props.get("empty").map(String::as_str), Some(""));
    }
}
