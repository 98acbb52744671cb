//! Word tokenizer shared by lexical indexing and lexical querying.
//!
//! A token is a maximal run of word characters (Unicode alphanumerics and
//! `_`) or hyphens, taken from the lowercased text. There is no stopword
//! list and no stemming. Both sides of the BM25 index go through
//! [`tokenize`]; any second normalisation path would silently cost recall.
//!
//! ```rust
//! use ragloop_core::tokenize::tokenize;
//!
//! assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
//! assert_eq!(tokenize("CLI-2024 e-mail_id"), vec!["cli-2024", "e-mail_id"]);
//! ```

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Split `text` into lowercase word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_token_char(c))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
