//! WDL 1.x reserved words

use once_cell::sync::Lazy;
use std::collections::HashSet;

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Array",
        "Boolean",
        "Directory",
        "File",
        "Float",
        "Int",
        "Map",
        "None",
        "Object",
        "Pair",
        "String",
        "alias",
        "as",
        "call",
        "command",
        "else",
        "hints",
        "if",
        "import",
        "input",
        "meta",
        "object",
        "output",
        "parameter_meta",
        "requirements",
        "runtime",
        "scatter",
        "struct",
        "task",
        "then",
        "version",
        "workflow",
    ]
    .into_iter()
    .collect()
});

/// Check if a word is reserved in WDL 1.x
pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(word)
}

/// Check if a string is a valid identifier (not a keyword)
pub fn is_valid_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !is_keyword(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_keyword() {
        assert!(is_keyword("task"));
        assert!(is_keyword("struct"));
        assert!(is_keyword("parameter_meta"));
        assert!(!is_keyword("my_task"));
        assert!(!is_keyword("after"));
    }

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("gatk_docker"));
        assert!(is_valid_identifier("foo123"));

        assert!(!is_valid_identifier("_private"));
        assert!(!is_valid_identifier("task"));
        assert!(!is_valid_identifier("123foo"));
        assert!(!is_valid_identifier("picard-cloud"));
    }
}
