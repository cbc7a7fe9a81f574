use std::sync::LazyLock;

use regex::Regex;

/// A currency amount: `$1,299.00`, `$4.5`, `$ 3`.
const AMOUNT: &str = r"\$\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{1,2})?)";

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(AMOUNT).expect("valid regex"));

/// `$3.50 / kg`, `$1.20 per 100g`, `$0.45/ea`.
static UNIT_PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i){AMOUNT}\s*(?:/|per)\s*(\d+\s*)?(kg|g|ml|l|litre|liter|ea|each|pack|pk)\b"
    ))
    .expect("valid regex")
});

/// `Save $2.00` or `$2 off`.
static SAVING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\bsave\s*{AMOUNT}|{AMOUNT}\s*off\b")).expect("valid regex")
});

static SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(was|now|save|special|specials|half\s+price)\b").expect("valid regex")
});

/// What the container says about savings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Saving {
    None,
    /// Discount amount backed by a second price signal.
    Amount(f64),
    /// On special, but the source gives no second price to derive a saving from.
    Unspecified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceExtraction {
    /// Price the shopper pays now.
    pub current: Option<f64>,
    /// Pre-discount price, only when a saving amount is known.
    pub original: Option<f64>,
    pub saving: Saving,
    /// Per-unit price text such as `$3.50 / kg`.
    pub unit_price: Option<String>,
}

impl PriceExtraction {
    #[must_use]
    pub fn is_special(&self) -> bool {
        self.saving != Saving::None
    }
}

/// Parse the first currency amount in `text`.
#[must_use]
pub fn parse_amount(text: &str) -> Option<f64> {
    AMOUNT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Render an amount as a display price, e.g. `4.5` -> `"$4.50"`.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    format!("${amount:.2}")
}

/// Derive current/original price and saving from a product container's text.
///
/// `badge` is an explicit special marker found in the markup. Unit-price and
/// explicit saving fragments are taken out before shelf prices are counted.
#[must_use]
pub fn extract_price(text: &str, badge: bool) -> PriceExtraction {
    let unit_price = UNIT_PRICE_RE.captures(text).map(|caps| {
        let amount = caps.get(1).map_or("", |m| m.as_str());
        let base = caps.get(2).map_or("", |m| m.as_str().trim());
        let unit = caps.get(3).map_or("", |m| m.as_str());
        format!("${amount} / {base}{unit}")
    });
    let remaining = UNIT_PRICE_RE.replace_all(text, " ");

    let explicit_saving = SAVING_RE.captures(&remaining).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
    });
    let remaining = SAVING_RE.replace_all(&remaining, " ");

    let amounts: Vec<f64> = AMOUNT_RE
        .captures_iter(&remaining)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();

    let signal = badge || explicit_saving.is_some() || SIGNAL_RE.is_match(&remaining);

    let (current, original, saving) = match (amounts.as_slice(), signal) {
        ([], _) => (None, None, Saving::None),
        ([only], true) => match explicit_saving.filter(|s| *s > 0.0) {
            Some(saved) => (
                Some(*only),
                Some(round_cents(*only + saved)),
                Saving::Amount(saved),
            ),
            None => (Some(*only), None, Saving::Unspecified),
        },
        (many, true) => {
            let low = many.iter().copied().fold(f64::INFINITY, f64::min);
            let high = many.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if high - low > 0.004 {
                (Some(low), Some(high), Saving::Amount(round_cents(high - low)))
            } else {
                (Some(low), None, Saving::Unspecified)
            }
        }
        ([first, ..], false) => (Some(*first), None, Saving::None),
    };

    PriceExtraction {
        current,
        original,
        saving,
        unit_price,
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_amount_without_signal_is_plain_price() {
        let p = extract_price("Bananas Cavendish $4.90 ea", false);
        assert_eq!(p.current, Some(4.90));
        assert_eq!(p.original, None);
        assert_eq!(p.saving, Saving::None);
    }

    #[test]
    fn was_now_pair_uses_lower_as_current() {
        let p = extract_price("Was $5.00 Now $4.50", false);
        assert_eq!(p.current, Some(4.50));
        assert_eq!(p.original, Some(5.00));
        assert_eq!(p.saving, Saving::Amount(0.50));
    }

    #[test]
    fn order_of_amounts_does_not_matter_when_signalled() {
        let p = extract_price("$3.00 special was $6.00", false);
        assert_eq!(p.current, Some(3.00));
        assert_eq!(p.original, Some(6.00));
        assert_eq!(p.saving, Saving::Amount(3.00));
    }

    #[test]
    fn badge_with_single_amount_is_unspecified_special() {
        let p = extract_price("Greek Yoghurt 1kg $6.50", true);
        assert_eq!(p.current, Some(6.50));
        assert_eq!(p.original, None);
        assert_eq!(p.saving, Saving::Unspecified);
        assert!(p.is_special());
    }

    #[test]
    fn two_amounts_without_signal_takes_first_and_no_discount() {
        let p = extract_price("$2.80 $3.10", false);
        assert_eq!(p.current, Some(2.80));
        assert_eq!(p.saving, Saving::None);
    }

    #[test]
    fn unit_price_is_removed_before_counting_shelf_prices() {
        let p = extract_price("Beef Mince 500g $8.99 $17.98 / kg", false);
        assert_eq!(p.current, Some(8.99));
        assert_eq!(p.saving, Saving::None);
        assert_eq!(p.unit_price.as_deref(), Some("$17.98 / kg"));
    }

    #[test]
    fn unit_price_keeps_base_quantity() {
        let p = extract_price("$4.00 $0.80 per 100g", false);
        assert_eq!(p.current, Some(4.00));
        assert_eq!(p.unit_price.as_deref(), Some("$0.80 / 100g"));
    }

    #[test]
    fn explicit_saving_with_single_shelf_price_derives_original() {
        let p = extract_price("Save $2.00 $8.99 ea $17.98 / kg", false);
        assert_eq!(p.current, Some(8.99));
        assert_eq!(p.original, Some(10.99));
        assert_eq!(p.saving, Saving::Amount(2.00));
    }

    #[test]
    fn dollars_off_counts_as_saving() {
        let p = extract_price("$1 off $3.50", false);
        assert_eq!(p.current, Some(3.50));
        assert_eq!(p.saving, Saving::Amount(1.0));
    }

    #[test]
    fn equal_amounts_with_signal_do_not_invent_a_saving() {
        let p = extract_price("Special $4.00 $4.00", false);
        assert_eq!(p.current, Some(4.00));
        assert_eq!(p.saving, Saving::Unspecified);
    }

    #[test]
    fn no_amounts_yields_nothing() {
        let p = extract_price("Price unavailable", true);
        assert_eq!(p.current, None);
        assert_eq!(p.saving, Saving::None);
    }

    #[test]
    fn thousands_separator_parses() {
        assert_eq!(parse_amount("$1,299.00"), Some(1299.0));
        assert_eq!(parse_amount("from $ 3"), Some(3.0));
        assert_eq!(parse_amount("N/A"), None);
    }

    #[test]
    fn keyword_inside_word_is_not_a_signal() {
        let p = extract_price("Snow Peas $3.00 $2.50", false);
        assert_eq!(p.current, Some(3.00));
        assert_eq!(p.saving, Saving::None);
    }

    #[test]
    fn format_amount_pads_cents() {
        assert_eq!(format_amount(4.5), "$4.50");
        assert_eq!(format_amount(12.0), "$12.00");
    }
}
