// src/utils/html.rs

/// Clean question explanation HTML using the ammonia library.
///
/// Explanations are authored as rich text and shown verbatim during solution
/// review. Safe tags (<b>, <p>, <sub>) are preserved; <script>, <iframe> and
/// event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
