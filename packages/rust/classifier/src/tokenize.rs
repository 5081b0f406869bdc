//! Tokenizer for classification features.
//!
//! Lowercases, splits on anything that is not a letter or digit (apostrophes
//! are dropped so `can't` becomes `cant`), removes stopwords, folds numbers
//! into a single `<num>` token and emits adjacent bigrams.

/// Placeholder for any run of digits.
pub(crate) const NUM_TOKEN: &str = "<num>";

/// Function words that carry no category signal. Negations and modal verbs
/// (`not`, `cant`, `can`, `would`) are kept on purpose.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "before", "but", "by", "did", "do", "for", "from", "had", "has", "have", "he",
    "her", "here", "hi", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just", "me",
    "my", "of", "on", "or", "our", "she", "so", "some", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "to", "too", "us", "very", "was", "we",
    "were", "what", "when", "which", "who", "will", "with", "you", "your",
];

/// Tokenize `text` into unigrams followed by bigrams.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let unigrams = unigrams(text);
    let mut tokens = Vec::with_capacity(unigrams.len() * 2);
    for pair in unigrams.windows(2) {
        tokens.push(format!("{} {}", pair[0], pair[1]));
    }
    let mut out = unigrams;
    out.append(&mut tokens);
    out
}

fn unigrams(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|word| word.replace(['\'', '\u{2019}'], ""))
        .filter(|word| !word.is_empty())
        .filter_map(|word| {
            if word.chars().all(|c| c.is_ascii_digit()) {
                Some(NUM_TOKEN.to_string())
            } else if word.chars().count() < 2 || STOPWORDS.contains(&word.as_str()) {
                None
            } else {
                Some(word)
            }
        })
        .collect()
}
