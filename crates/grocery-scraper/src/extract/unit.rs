use std::sync::LazyLock;

use regex::Regex;

static CURRENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*\d[\d,]*(?:\.\d+)?").expect("valid regex"));

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*(kilograms?|kgs?|grams?|gm?|millilit(?:re|er)s?|ml|lit(?:re|er)s?|ltr|l|packs?|pk|each|ea)\b",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Litre,
    Millilitre,
    Kilogram,
    Gram,
    Pack,
    Each,
}

impl Unit {
    fn from_token(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        let unit = match token.as_str() {
            "kg" | "kgs" | "kilogram" | "kilograms" => Unit::Kilogram,
            "g" | "gm" | "gram" | "grams" => Unit::Gram,
            "ml" => Unit::Millilitre,
            "l" | "ltr" => Unit::Litre,
            "pk" | "pack" | "packs" => Unit::Pack,
            "ea" | "each" => Unit::Each,
            other if other.starts_with("millilit") => Unit::Millilitre,
            other if other.starts_with("lit") => Unit::Litre,
            _ => return None,
        };
        Some(unit)
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Litre => "L",
            Unit::Millilitre => "mL",
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
            Unit::Pack => " pack",
            Unit::Each => " each",
        }
    }
}

/// A size or count token found in product text, e.g. `2L` or `6 pack`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub amount: f64,
    pub unit: Unit,
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.amount.fract() == 0.0 {
            write!(f, "{:.0}{}", self.amount, self.unit.symbol())
        } else {
            write!(f, "{}{}", self.amount, self.unit.symbol())
        }
    }
}

/// First quantity token in `text`. Currency amounts are ignored so
/// `$2.00 each` is not read as two items.
#[must_use]
pub fn extract_quantity(text: &str) -> Option<Quantity> {
    let without_prices = CURRENCY_RE.replace_all(text, " ");
    QUANTITY_RE.captures(&without_prices).and_then(|caps| {
        let amount = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let unit = Unit::from_token(caps.get(2)?.as_str())?;
        Some(Quantity { amount, unit })
    })
}
