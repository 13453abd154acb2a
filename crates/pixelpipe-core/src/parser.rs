//! Descriptor mini-language
//!
//! A descriptor names a chain of filters ending in a device or a bracketed
//! list of sub-descriptors:
//!
//! ```text
//! pipeline ::= (filterName[:args] '|')* (deviceName[:args] | '[' pipeline (',' pipeline)* ']')
//! ```
//!
//! Arguments are comma separated. Parentheses and brackets nest, and quoted
//! text (`'...'` or `"..."`) is opaque to the splitter.

use crate::error::{Error, Result};

/// One `name[:args]` element of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub args: Vec<String>,
}

/// What a pipeline bottoms out in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    Device(Stage),
    /// Sub-descriptors of a bracketed combo, unparsed
    List(Vec<String>),
}

/// A descriptor split into its filter chain and leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    /// Outermost filter first
    pub filters: Vec<Stage>,
    pub leaf: Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    Paren,
    Bracket,
}

impl Group {
    fn singular(self) -> &'static str {
        match self {
            Group::Paren => "parenthesis",
            Group::Bracket => "bracket",
        }
    }

    fn plural(self) -> &'static str {
        match self {
            Group::Paren => "parentheses",
            Group::Bracket => "brackets",
        }
    }
}

/// Split `input` on `delimiter` wherever it is not nested or quoted
///
/// Tokens are trimmed. Empty input is an [`Error::EmptyList`]; an empty
/// token between two delimiters is kept as `""`.
pub fn split_top_level(input: &str, delimiter: char, context: &str) -> Result<Vec<String>> {
    if input.trim().is_empty() {
        return Err(Error::EmptyList(context.to_string()));
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut open: Vec<Group> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in input.chars() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' | '[' => {
                open.push(if ch == '(' { Group::Paren } else { Group::Bracket });
                current.push(ch);
            }
            ')' | ']' => {
                let closing = if ch == ')' { Group::Paren } else { Group::Bracket };
                match open.pop() {
                    None => {
                        return Err(Error::syntax(
                            context,
                            format!("too many right {}", closing.plural()),
                        ))
                    }
                    Some(opened) if opened != closing => {
                        return Err(Error::syntax(
                            context,
                            format!(
                                "left {} closed by right {}",
                                opened.singular(),
                                closing.singular()
                            ),
                        ))
                    }
                    Some(_) => current.push(ch),
                }
            }
            c if c == delimiter && open.is_empty() => {
                tokens.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if quote.is_some() {
        return Err(Error::syntax(context, "missing closing quote"));
    }
    if let Some(unclosed) = open.last() {
        return Err(Error::syntax(
            context,
            format!("missing right {}", unclosed.singular()),
        ));
    }

    tokens.push(current.trim().to_string());
    Ok(tokens)
}

/// Split a comma separated argument list
pub fn parse_param_list(input: &str, context: &str) -> Result<Vec<String>> {
    split_top_level(input, ',', context)
}

/// Strip one layer of matching quotes and resolve backslash escapes
pub fn unquote(token: &str) -> String {
    let bytes = token.as_bytes();
    let quoted = bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0];
    if !quoted {
        return token.to_string();
    }

    let mut out = String::with_capacity(token.len());
    let mut escaped = false;
    for ch in token[1..token.len() - 1].chars() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_stage(text: &str) -> Result<Stage> {
    let (name, args) = match text.split_once(':') {
        Some((name, args)) => (name.trim(), Some(args)),
        None => (text.trim(), None),
    };

    if name.is_empty() {
        return Err(Error::syntax(text, "missing type name"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::syntax(text, format!("bad type name '{}'", name)));
    }

    let args = match args {
        Some(args) => parse_param_list(args, name)?,
        None => Vec::new(),
    };

    Ok(Stage {
        name: name.to_string(),
        args,
    })
}

/// Split a full descriptor into filter stages and a leaf
pub fn parse_pipeline(descriptor: &str) -> Result<Pipeline> {
    let mut segments = split_top_level(descriptor, '|', "descriptor")?;
    // split_top_level never returns an empty vector
    let leaf_text = segments.pop().unwrap_or_default();

    let mut filters = Vec::with_capacity(segments.len());
    for segment in &segments {
        if segment.is_empty() {
            return Err(Error::syntax(descriptor, "empty filter stage"));
        }
        filters.push(parse_stage(segment)?);
    }

    if leaf_text.is_empty() {
        return Err(Error::syntax(descriptor, "missing device after last '|'"));
    }

    let leaf = if let Some(rest) = leaf_text.strip_prefix('[') {
        let inner = rest
            .strip_suffix(']')
            .ok_or_else(|| Error::syntax(&leaf_text, "unexpected text after ']'"))?;
        Leaf::List(parse_param_list(inner, "device list")?)
    } else {
        Leaf::Device(parse_stage(&leaf_text)?)
    };

    Ok(Pipeline { filters, leaf })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_split() {
        assert_eq!(parse_param_list("a,b,c", "t").unwrap(), strings(&["a", "b", "c"]));
        assert_eq!(
            parse_param_list("  a , b ,c  ", "t").unwrap(),
            strings(&["a", "b", "c"])
        );
    }

    #[test]
    fn test_nested_commas_preserved() {
        assert_eq!(
            parse_param_list("a(1,2),b", "t").unwrap(),
            strings(&["a(1,2)", "b"])
        );
        assert_eq!(
            parse_param_list("[x,y(1,[2,3])],z", "t").unwrap(),
            strings(&["[x,y(1,[2,3])]", "z"])
        );
    }

    #[test]
    fn test_unbalanced_groups() {
        let err = parse_param_list("a(b", "t").unwrap_err().to_string();
        assert!(err.contains("parenthesis"), "{}", err);
        assert!(err.contains("missing right"), "{}", err);

        let err = parse_param_list("a)b", "t").unwrap_err().to_string();
        assert!(err.contains("too many right parentheses"), "{}", err);

        let err = parse_param_list("[a", "t").unwrap_err().to_string();
        assert!(err.contains("missing right bracket"), "{}", err);

        let err = parse_param_list("a]", "t").unwrap_err().to_string();
        assert!(err.contains("too many right brackets"), "{}", err);
    }

    #[test]
    fn test_mismatched_kinds_name_both() {
        let err = parse_param_list("(a]", "t").unwrap_err().to_string();
        assert!(err.contains("parenthesis"), "{}", err);
        assert!(err.contains("bracket"), "{}", err);
    }

    #[test]
    fn test_quotes_are_opaque() {
        assert_eq!(
            parse_param_list("'a,(b',c", "t").unwrap(),
            strings(&["'a,(b'", "c"])
        );
        assert_eq!(
            parse_param_list(r#""x\",y",z"#, "t").unwrap(),
            strings(&[r#""x\",y""#, "z"])
        );
        assert!(parse_param_list("'abc", "t").is_err());
    }

    #[test]
    fn test_empty_list_vs_empty_argument() {
        assert!(matches!(
            parse_param_list("   ", "t"),
            Err(Error::EmptyList(_))
        ));
        assert_eq!(parse_param_list("a,,b", "t").unwrap(), strings(&["a", "", "b"]));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'hello'"), "hello");
        assert_eq!(unquote(r#""a\"b""#), "a\"b");
        assert_eq!(unquote(r"'a\\b'"), r"a\b");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("'"), "'");
    }

    #[test]
    fn test_pipeline_with_filters() {
        let p = parse_pipeline("random|flip|ck:10.0.0.1/1(10)").unwrap();
        assert_eq!(p.filters.len(), 2);
        assert_eq!(p.filters[0].name, "random");
        assert!(p.filters[0].args.is_empty());
        assert_eq!(p.filters[1].name, "flip");
        assert_eq!(
            p.leaf,
            Leaf::Device(Stage {
                name: "ck".to_string(),
                args: strings(&["10.0.0.1/1(10)"]),
            })
        );
    }

    #[test]
    fn test_pipeline_with_combo() {
        let p = parse_pipeline("skip:2|[null:4, shift:1|null:6]").unwrap();
        assert_eq!(p.filters[0].args, strings(&["2"]));
        assert_eq!(p.leaf, Leaf::List(strings(&["null:4", "shift:1|null:6"])));
    }

    #[test]
    fn test_pipeline_errors() {
        assert!(matches!(parse_pipeline(""), Err(Error::EmptyList(_))));
        assert!(parse_pipeline("flip|").is_err());
        assert!(parse_pipeline("|null:3").is_err());
        assert!(parse_pipeline("[null:3]x").is_err());
        assert!(parse_pipeline("bad name:3").is_err());
        assert!(parse_pipeline("null:").is_err());
    }
}
