//! Statement classification by leading keyword, with a look inside
//! blocks and common table expressions.

/// Coarse kind of an SQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// SELECT, WITH, SHOW, DESCRIBE, EXPLAIN.
    Read,
    /// INSERT, UPDATE, DELETE, MERGE, REPLACE, and blocks running them.
    Write,
    /// CREATE, ALTER, DROP, RENAME, TRUNCATE, GRANT, REVOKE, COMMENT.
    Ddl,
    /// Anything else (SET, CALL, blocks without DML, ...).
    Other,
}

impl StatementKind {
    pub fn is_read(self) -> bool {
        self == StatementKind::Read
    }

    pub fn is_write(self) -> bool {
        self == StatementKind::Write
    }

    pub fn is_ddl(self) -> bool {
        self == StatementKind::Ddl
    }
}

/// Upper-cased first keyword, skipping whitespace, comments and opening
/// parentheses.
pub fn leading_keyword(sql: &str) -> String {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map(|p| &after[p..]).unwrap_or("");
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map(|p| &after[p + 2..]).unwrap_or("");
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase()
}

/// Data-changing keywords looked for inside blocks. REPLACE is left out:
/// it is also a string function and part of CREATE OR REPLACE.
const BLOCK_DML: [&str; 4] = ["INSERT", "UPDATE", "DELETE", "MERGE"];

/// Classify a statement by its leading keyword.
///
/// `WITH` takes the kind of its main statement (MySQL allows
/// `WITH .. DELETE`). Blocks and calls that contain DML are writes.
pub fn classify(sql: &str) -> StatementKind {
    match leading_keyword(sql).as_str() {
        "WITH" => classify_with(sql),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" => StatementKind::Read,
        "INSERT" | "UPDATE" | "DELETE" | "MERGE" | "REPLACE" => StatementKind::Write,
        "CREATE" | "ALTER" | "DROP" | "RENAME" | "TRUNCATE" | "GRANT" | "REVOKE" | "COMMENT" => {
            StatementKind::Ddl
        }
        _ if words(sql).iter().any(|(w, _)| BLOCK_DML.contains(&w.as_str())) => {
            StatementKind::Write
        }
        _ => StatementKind::Other,
    }
}

fn classify_with(sql: &str) -> StatementKind {
    // CTE bodies sit inside parentheses; the main statement is the first
    // top-level SELECT or DML keyword
    let main = words(sql).into_iter().skip(1).find(|(w, depth)| {
        *depth == 0 && (w == "SELECT" || w == "REPLACE" || BLOCK_DML.contains(&w.as_str()))
    });
    match main {
        Some((w, _)) if w != "SELECT" => StatementKind::Write,
        _ => StatementKind::Read,
    }
}

/// Upper-cased words outside literals and comments, with their
/// parenthesis depth.
fn words(sql: &str) -> Vec<(String, usize)> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"' | '`') => {
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    i += 1;
                }
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '(' => {
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push((word.to_uppercase(), depth));
            }
            _ => i += 1,
        }
    }

    out
}
