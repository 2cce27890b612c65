use once_cell::sync::Lazy;
use regex::Regex;

static THINK_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<think>[\s\S]*?</think>|<think\s*/>").unwrap());

static REASONING_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<reasoning>[\s\S]*?</reasoning>").unwrap());

static MULTIPLE_NEWLINES_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static CODE_FENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```[a-z]*\s*|\s*```$").unwrap());

static FIRST_STATEMENT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^(.*?;)").unwrap());

const SQL_QUERY_MARKER: &str = "SQLQuery:";
const SQL_RESULT_MARKER: &str = "SQLResult:";

/// Removes reasoning blocks some local models emit and normalizes whitespace.
pub fn clean_llm_response(response: &str) -> String {
    let cleaned = THINK_TAG_PATTERN.replace_all(response, "");
    let cleaned = REASONING_TAG_PATTERN.replace_all(&cleaned, "");
    let cleaned = cleaned.trim();
    MULTIPLE_NEWLINES_PATTERN
        .replace_all(cleaned, "\n\n")
        .to_string()
}

/// Pulls the SQL statement out of a text-to-SQL completion.
///
/// Text after a `SQLQuery:` marker is kept, anything from `SQLResult:` on is
/// dropped, and markdown fences are stripped.
pub fn parse_sql_from_response(response: &str) -> String {
    let cleaned = clean_llm_response(response);
    let mut sql: &str = &cleaned;

    if let Some(start) = sql.find(SQL_QUERY_MARKER) {
        sql = &sql[start + SQL_QUERY_MARKER.len()..];
    }
    if let Some(end) = sql.find(SQL_RESULT_MARKER) {
        sql = &sql[..end];
    }

    CODE_FENCE_PATTERN
        .replace_all(sql.trim(), "")
        .trim()
        .to_string()
}

/// Keeps the first statement up to and including its `;`.
/// Text without a `;` is returned trimmed.
pub fn clean_sql_query(sql_query: &str) -> String {
    match FIRST_STATEMENT_PATTERN.captures(sql_query) {
        Some(caps) => caps[1].trim().to_string(),
        None => sql_query.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_think_tags() {
        let input = "<think>Some reasoning here</think>The actual response";
        assert_eq!(clean_llm_response(input), "The actual response");
    }

    #[test]
    fn test_clean_self_closing_think() {
        assert_eq!(clean_llm_response("<think />Answer"), "Answer");
    }

    #[test]
    fn test_clean_reasoning_and_newlines() {
        let input = "<reasoning>x</reasoning>Line 1\n\n\n\n\nLine 2";
        assert_eq!(clean_llm_response(input), "Line 1\n\nLine 2");
    }

    #[test]
    fn test_parse_sql_with_markers() {
        let response = "SQLQuery: SELECT COUNT(*) FROM orders;\nSQLResult: 42\nAnswer: 42 orders";
        assert_eq!(
            parse_sql_from_response(response),
            "SELECT COUNT(*) FROM orders;"
        );
    }

    #[test]
    fn test_parse_sql_with_code_fence() {
        let response = "```sql\nSELECT id FROM customers\n```";
        assert_eq!(parse_sql_from_response(response), "SELECT id FROM customers");
    }

    #[test]
    fn test_parse_sql_plain() {
        assert_eq!(parse_sql_from_response("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_parse_sql_empty_response() {
        assert_eq!(parse_sql_from_response("<think>hmm</think>"), "");
    }

    #[test]
    fn test_clean_sql_query_keeps_first_statement() {
        let input = "SELECT * FROM orders;\nThis query lists all orders.";
        assert_eq!(clean_sql_query(input), "SELECT * FROM orders;");
    }

    #[test]
    fn test_clean_sql_query_multiline_statement() {
        let input = "SELECT id\nFROM orders\nWHERE total > 10; SELECT 2;";
        assert_eq!(clean_sql_query(input), "SELECT id\nFROM orders\nWHERE total > 10;");
    }

    #[test]
    fn test_clean_sql_query_without_semicolon() {
        assert_eq!(clean_sql_query("  SELECT 1 \n"), "SELECT 1");
    }
}
