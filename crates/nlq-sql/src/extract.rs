//! SQL candidate extraction from untrusted generated text.
//!
//! Generators wrap answers in markdown fences, prefix them with prose, or
//! return bare SQL. Extraction tries a fixed sequence of patterns, first
//! match wins, and normalizes whatever it finds. The result is still
//! untrusted; it goes through [`crate::validate::validate_sql`] next.

use regex::Regex;
use std::sync::LazyLock;

static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```sql\s*(.+?)```").unwrap());

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```(?:\w+)?\s*(.+?)```").unwrap());

// A SELECT statement running until a semicolon or end of text.
static SELECT_STMT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bSELECT\b[^;]*").unwrap());

/// Outcome of extraction over a generated response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Sql(String),
    NoCandidate,
}

impl Extraction {
    pub fn into_sql(self) -> Option<String> {
        match self {
            Extraction::Sql(sql) => Some(sql),
            Extraction::NoCandidate => None,
        }
    }
}

/// Pull a SQL candidate out of free-form text.
///
/// Rules, in order:
/// 1. a fenced block tagged `sql`;
/// 2. any fenced block whose trimmed body starts with SELECT;
/// 3. the longest `SELECT … (until ; or end)` match anywhere in the text;
/// 4. the raw trimmed text (typically fails validation downstream).
///
/// The winning candidate has trailing semicolons stripped and internal
/// whitespace collapsed, which makes the function idempotent on
/// already-clean SQL.
pub fn extract_sql(text: &str) -> Extraction {
    let candidate = if let Some(caps) = SQL_FENCE.captures(text) {
        caps[1].to_string()
    } else if let Some(body) = fenced_select(text) {
        body
    } else if let Some(stmt) = longest_select(text) {
        stmt
    } else {
        text.trim().to_string()
    };

    match clean(&candidate) {
        sql if sql.is_empty() => Extraction::NoCandidate,
        sql => Extraction::Sql(sql),
    }
}

fn fenced_select(text: &str) -> Option<String> {
    for caps in ANY_FENCE.captures_iter(text) {
        let body = caps[1].trim();
        let starts_with_select = body
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"));
        if starts_with_select {
            return Some(body.to_string());
        }
    }
    None
}

fn longest_select(text: &str) -> Option<String> {
    SELECT_STMT
        .find_iter(text)
        .max_by_key(|m| m.len())
        .map(|m| m.as_str().to_string())
}

fn clean(candidate: &str) -> String {
    let trimmed = candidate.trim().trim_end_matches(';').trim_end();
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sql(text: &str) -> String {
        extract_sql(text).into_sql().expect("expected a candidate")
    }

    #[test]
    fn extracts_tagged_fence() {
        let text = "Here is the query:\n```sql\nSELECT * FROM hotels;\n```\nDone.";
        assert_eq!(sql(text), "SELECT * FROM hotels");
    }

    #[test]
    fn extracts_untagged_fence_starting_with_select() {
        let text = "```\nselect name from hotels\n```";
        assert_eq!(sql(text), "select name from hotels");
    }

    #[test]
    fn ignores_non_select_fence_and_falls_through() {
        let text = "```json\n{\"a\": 1}\n```\nSELECT name FROM hotels";
        assert_eq!(sql(text), "SELECT name FROM hotels");
    }

    #[test]
    fn picks_longest_bare_select() {
        let text =
            "Maybe SELECT 1; or better: SELECT name, rating FROM hotels WHERE rating > 4;";
        assert_eq!(sql(text), "SELECT name, rating FROM hotels WHERE rating > 4");
    }

    #[test]
    fn select_runs_to_end_without_semicolon() {
        let text = "SELECT name FROM hotels ORDER BY name";
        assert_eq!(sql(text), "SELECT name FROM hotels ORDER BY name");
    }

    #[test]
    fn collapses_whitespace_and_strips_semicolons() {
        let text = "SELECT   name,\n    rating\nFROM hotels;;";
        assert_eq!(sql(text), "SELECT name, rating FROM hotels");
    }

    #[test]
    fn idempotent_on_clean_sql() {
        let clean = "SELECT name FROM hotels WHERE rating > 4";
        let once = sql(clean);
        assert_eq!(once, clean);
        assert_eq!(sql(&once), once);
    }

    #[test]
    fn raw_text_without_select_is_returned_trimmed() {
        // Rule 4: the raw response survives extraction and is left for the
        // validator to reject.
        assert_eq!(
            extract_sql("  I cannot answer that.  "),
            Extraction::Sql("I cannot answer that.".to_string())
        );
    }

    #[test]
    fn empty_response_yields_no_candidate() {
        assert_eq!(extract_sql(""), Extraction::NoCandidate);
        assert_eq!(extract_sql("   \n ;; "), Extraction::NoCandidate);
    }
}
