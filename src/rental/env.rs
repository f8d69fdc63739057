//! Parsing of comma-separated `KEY=VALUE` environment lists.

use thiserror::Error;

/// Errors raised while parsing an environment list.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EnvParseError {
    /// Raised when an entry has no `=`.
    #[error("environment entry '{0}' is missing '='")]
    MissingSeparator(String),
    /// Raised when an entry has an empty name.
    #[error("environment entry '{0}' has an empty name")]
    EmptyKey(String),
    /// Raised when a double quote is never closed.
    #[error("unterminated quote in environment list")]
    UnterminatedQuote,
}

/// Parses `KEY=VALUE,KEY2="quoted, value"` into ordered pairs.
///
/// Commas inside double quotes do not split entries, and a value wrapped in
/// double quotes has them removed. Blank entries are skipped.
///
/// # Errors
///
/// Returns [`EnvParseError`] for entries without `=`, entries with an empty
/// name, or an unbalanced quote.
pub fn parse_env_vars(input: &str) -> Result<Vec<(String, String)>, EnvParseError> {
    split_entries(input)?
        .into_iter()
        .map(|entry| entry.trim().to_owned())
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_entry(&entry))
        .collect()
}

fn split_entries(input: &str) -> Result<Vec<String>, EnvParseError> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => entries.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err(EnvParseError::UnterminatedQuote);
    }
    entries.push(current);
    Ok(entries)
}

fn parse_entry(entry: &str) -> Result<(String, String), EnvParseError> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| EnvParseError::MissingSeparator(entry.to_owned()))?;
    let name = key.trim();
    if name.is_empty() {
        return Err(EnvParseError::EmptyKey(entry.to_owned()));
    }
    let trimmed = value.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);
    Ok((name.to_owned(), unquoted.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_owned(), value.to_owned())
    }

    #[rstest]
    fn parses_entries_in_declaration_order() {
        let parsed = parse_env_vars(r#"JUPYTER_PASSWORD=vastai-demo,DEMO_VAR="Hello from VAST.ai!""#)
            .expect("env list should parse");
        assert_eq!(
            parsed,
            vec![
                pair("JUPYTER_PASSWORD", "vastai-demo"),
                pair("DEMO_VAR", "Hello from VAST.ai!"),
            ]
        );
    }

    #[rstest]
    fn keeps_commas_inside_quotes() {
        let parsed = parse_env_vars(r#"GREETING="a, b",X=1"#).expect("env list should parse");
        assert_eq!(parsed, vec![pair("GREETING", "a, b"), pair("X", "1")]);
    }

    #[rstest]
    #[case("")]
    #[case("  ")]
    #[case(" , ,")]
    fn blank_lists_are_empty(#[case] input: &str) {
        assert_eq!(parse_env_vars(input), Ok(Vec::new()));
    }

    #[rstest]
    fn value_may_contain_equals_sign() {
        let parsed = parse_env_vars("OPTS=a=b").expect("env list should parse");
        assert_eq!(parsed, vec![pair("OPTS", "a=b")]);
    }

    #[rstest]
    #[case("NOVALUE", EnvParseError::MissingSeparator(String::from("NOVALUE")))]
    #[case("=value", EnvParseError::EmptyKey(String::from("=value")))]
    #[case(r#"A="open"#, EnvParseError::UnterminatedQuote)]
    fn rejects_malformed_entries(#[case] input: &str, #[case] expected: EnvParseError) {
        assert_eq!(parse_env_vars(input), Err(expected));
    }
}
