/// Leading title words that describe the product rather than name its maker.
const NON_BRAND_DESCRIPTORS: &[&str] = &[
    "fresh",
    "organic",
    "free",
    "australian",
    "aussie",
    "natural",
    "premium",
    "large",
    "medium",
    "small",
    "mini",
    "baby",
    "whole",
    "raw",
    "frozen",
    "chilled",
    "loose",
    "new",
    "the",
    "classic",
    "value",
];

/// Infer a brand from the first token of a product title.
///
/// Returns `None` for descriptors, numbers, and empty titles.
#[must_use]
pub fn infer_brand(title: &str) -> Option<String> {
    let first = title.split_whitespace().next()?;
    let token: String = first
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '&' || *c == '\'')
        .collect();

    if token.is_empty() || !token.chars().any(char::is_alphabetic) {
        return None;
    }

    let lowered = token.to_lowercase();
    if NON_BRAND_DESCRIPTORS.contains(&lowered.as_str()) {
        return None;
    }

    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_title_token() {
        assert_eq!(infer_brand("Pauls Smarter White Milk 2L").as_deref(), Some("Pauls"));
        assert_eq!(infer_brand("Arnott's Tim Tam").as_deref(), Some("Arnott's"));
    }

    #[test]
    fn rejects_descriptors_case_insensitively() {
        assert!(infer_brand("Fresh Atlantic Salmon").is_none());
        assert!(infer_brand("ORGANIC Carrots 1kg").is_none());
    }

    #[test]
    fn rejects_numeric_and_empty() {
        assert!(infer_brand("2 Minute Noodles").is_none());
        assert!(infer_brand("   ").is_none());
        assert!(infer_brand("-- ").is_none());
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(infer_brand("Bega, Tasty Cheese").as_deref(), Some("Bega"));
    }
}
