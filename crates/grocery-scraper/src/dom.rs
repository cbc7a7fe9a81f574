//! Declarative product-card extraction over rendered HTML.
//!
//! Each source supplies ordered selector lists; the first container selector
//! that yields a non-empty set wins, and every field lookup inside a card
//! walks its own fallback list the same way.

use chrono::{DateTime, Utc};
use grocery_core::{Product, StoreId};
use scraper::{ElementRef, Html, Selector};

use crate::error::ScraperError;
use crate::extract::{extract_price, extract_quantity};
use crate::normalize::{absolutize_url, clean_title, ProductDraft};

const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-original", "srcset"];
const OUT_OF_STOCK_TEXT: &[&str] = &["out of stock", "sold out", "currently unavailable"];

/// Ordered selector fallbacks for one source's product cards.
#[derive(Debug, Clone, Copy)]
pub struct CardSelectors {
    pub containers: &'static [&'static str],
    pub title: &'static [&'static str],
    /// Elements holding price text. Empty means the whole card text is scanned.
    pub price: &'static [&'static str],
    pub link: &'static [&'static str],
    pub image: &'static [&'static str],
    pub brand: &'static [&'static str],
    pub category: &'static [&'static str],
    pub special_badge: &'static [&'static str],
    pub out_of_stock: &'static [&'static str],
    /// Attributes on the card carrying a stable product id.
    pub id_attributes: &'static [&'static str],
}

/// Unvalidated fields lifted from one card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCard {
    pub title: Option<String>,
    pub text: String,
    pub price_text: String,
    pub href: Option<String>,
    pub image: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub badge: bool,
    pub out_of_stock: bool,
    pub source_id: Option<String>,
}

/// Per-run values stamped onto every product built from a card.
#[derive(Debug, Clone)]
pub struct CardContext<'a> {
    pub store: StoreId,
    pub query: &'a str,
    pub base_url: &'a str,
    pub scraped_at: DateTime<Utc>,
}

impl RawCard {
    /// Build the canonical product for this card.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ExtractionMismatch`] when the card has no title.
    pub fn into_product(self, ctx: &CardContext<'_>) -> Result<Product, ScraperError> {
        let title = self
            .title
            .as_deref()
            .map(clean_title)
            .filter(|t| !t.is_empty())
            .ok_or(ScraperError::ExtractionMismatch { field: "title" })?;

        let extraction = extract_price(&self.price_text, self.badge);
        let mut draft = ProductDraft::new(ctx.store, title.clone(), ctx.query)
            .with_extraction(&extraction);

        if draft.unit_price.is_empty() {
            if let Some(quantity) = extract_quantity(&title).or_else(|| extract_quantity(&self.text))
            {
                draft.unit_price = quantity.to_string();
            }
        }
        draft.in_stock = !self.out_of_stock;
        draft.image_url = self
            .image
            .map(|src| absolutize_url(ctx.base_url, &src))
            .unwrap_or_default();
        draft.product_url = self
            .href
            .map(|href| absolutize_url(ctx.base_url, &href))
            .unwrap_or_default();
        draft.brand = self.brand.unwrap_or_default();
        draft.category = self.category.unwrap_or_default();

        draft.finish(ctx.scraped_at)
    }
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some(sel),
            Err(e) => {
                tracing::warn!(selector = s, error = %e, "skipping invalid selector");
                None
            }
        })
        .collect()
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope
            .select(sel)
            .map(text_of)
            .find(|text| !text.is_empty())
    })
}

fn first_attr(scope: ElementRef<'_>, selectors: &[Selector], attrs: &[&str]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        scope.select(sel).find_map(|el| {
            attrs.iter().find_map(|attr| {
                el.value()
                    .attr(attr)
                    .map(|v| {
                        // srcset lists "url width" pairs; keep the first url.
                        let v = v.trim();
                        if *attr == "srcset" {
                            v.split_whitespace().next().unwrap_or("").to_string()
                        } else {
                            v.to_string()
                        }
                    })
                    .filter(|v| !v.is_empty() && !v.starts_with("data:"))
            })
        })
    })
}

/// The element a card's fields are read from. Bare product links are
/// usually wrapped by the real card, so their parent is used instead.
fn card_scope(container: ElementRef<'_>) -> ElementRef<'_> {
    if container.value().name() == "a" {
        container
            .parent()
            .and_then(ElementRef::wrap)
            .unwrap_or(container)
    } else {
        container
    }
}

/// Extract every product card from `html` using the first container selector
/// that matches anything.
#[must_use]
pub fn extract_cards(html: &str, selectors: &CardSelectors) -> Vec<RawCard> {
    let document = Html::parse_document(html);

    let containers = compile(selectors.containers);
    let Some(matched) = containers.iter().find_map(|sel| {
        let found: Vec<ElementRef<'_>> = document.select(sel).collect();
        (!found.is_empty()).then_some(found)
    }) else {
        return Vec::new();
    };

    let title = compile(selectors.title);
    let price = compile(selectors.price);
    let link = compile(selectors.link);
    let image = compile(selectors.image);
    let brand = compile(selectors.brand);
    let category = compile(selectors.category);
    let badge = compile(selectors.special_badge);
    let out_of_stock = compile(selectors.out_of_stock);
    let img_alt = compile(&["img[alt]"]);

    matched
        .into_iter()
        .map(|container| {
            let scope = card_scope(container);
            let text = text_of(scope);
            let lowered = text.to_lowercase();

            let title_text = first_text(scope, &title)
                .or_else(|| first_attr(scope, &img_alt, &["alt"]))
                .or_else(|| (container.value().name() == "a").then(|| text_of(container)))
                .filter(|t| !t.is_empty());

            let price_text = if price.is_empty() {
                text.clone()
            } else {
                let joined: Vec<String> = price
                    .iter()
                    .flat_map(|sel| scope.select(sel).map(text_of))
                    .filter(|t| !t.is_empty())
                    .collect();
                if joined.is_empty() {
                    text.clone()
                } else {
                    joined.join(" ")
                }
            };

            let href = if container.value().name() == "a" {
                container.value().attr("href").map(str::to_string)
            } else {
                first_attr(scope, &link, &["href"])
            };

            let source_id = selectors
                .id_attributes
                .iter()
                .find_map(|attr| scope.value().attr(attr).or(container.value().attr(attr)))
                .map(str::to_string);

            RawCard {
                title: title_text,
                price_text,
                href,
                image: first_attr(scope, &image, IMAGE_ATTRIBUTES),
                brand: first_text(scope, &brand),
                category: first_text(scope, &category),
                badge: badge.iter().any(|sel| scope.select(sel).next().is_some()),
                out_of_stock: out_of_stock
                    .iter()
                    .any(|sel| scope.select(sel).next().is_some())
                    || OUT_OF_STOCK_TEXT.iter().any(|t| lowered.contains(t)),
                source_id,
                text,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTORS: CardSelectors = CardSelectors {
        containers: &[".product-card", "[class*='product']", "a[href*='/product']"],
        title: &["h3", ".title"],
        price: &[],
        link: &["a[href]"],
        image: &["img"],
        brand: &["[class*='brand']"],
        category: &["[class*='category']"],
        special_badge: &["[data-badge='special']"],
        out_of_stock: &["[class*='out-of-stock']"],
        id_attributes: &["data-product-id"],
    };

    fn ctx() -> CardContext<'static> {
        CardContext {
            store: StoreId::Harris,
            query: "milk",
            base_url: "https://shop.test",
            scraped_at: "2026-03-01T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn first_matching_container_selector_wins() {
        let html = r#"
            <div class="product-card" data-product-id="A1">
              <a href="/products/milk"><h3>Pauls Milk 2L</h3></a>
              <img data-src="/img/milk.jpg">
              <span class="brand">Pauls</span>
              <span>$3.10</span>
            </div>
            <div class="product-tile"><h3>Should not be read</h3></div>
        "#;
        let cards = extract_cards(html, &SELECTORS);
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.title.as_deref(), Some("Pauls Milk 2L"));
        assert_eq!(card.href.as_deref(), Some("/products/milk"));
        assert_eq!(card.image.as_deref(), Some("/img/milk.jpg"));
        assert_eq!(card.brand.as_deref(), Some("Pauls"));
        assert_eq!(card.source_id.as_deref(), Some("A1"));
        assert!(!card.badge);
    }

    #[test]
    fn falls_back_to_later_container_selectors() {
        let html = r#"<section><div class="ProductTile-product"><span class="title">Eggs 12 Pack</span> $6.00</div></section>"#;
        let cards = extract_cards(html, &SELECTORS);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].title.as_deref(), Some("Eggs 12 Pack"));
    }

    #[test]
    fn product_link_container_reads_from_parent() {
        let html = r#"
            <ul><li>
              <a href="/product/full-cream-milk"><img src="/m.jpg" alt="Full Cream Milk 2L"></a>
              <span data-badge="special">Special</span>
              <span>$2.90</span>
            </li></ul>
        "#;
        let cards = extract_cards(html, &SELECTORS);
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.title.as_deref(), Some("Full Cream Milk 2L"));
        assert_eq!(card.href.as_deref(), Some("/product/full-cream-milk"));
        assert!(card.badge);
        assert!(card.price_text.contains("$2.90"));
    }

    #[test]
    fn no_matching_container_yields_nothing() {
        assert!(extract_cards("<html><body><p>No results</p></body></html>", &SELECTORS).is_empty());
    }

    #[test]
    fn detects_out_of_stock_by_class_or_text() {
        let html = r#"
            <div class="product-card"><h3>Kale</h3><span class="out-of-stock">x</span></div>
            <div class="product-card"><h3>Figs</h3><p>Out of stock</p></div>
            <div class="product-card"><h3>Plums</h3><p>$4.00</p></div>
        "#;
        let flags: Vec<bool> = extract_cards(html, &SELECTORS)
            .into_iter()
            .map(|c| c.out_of_stock)
            .collect();
        assert_eq!(flags, vec![true, true, false]);
    }

    #[test]
    fn card_becomes_product_with_absolute_urls_and_unit() {
        let card = RawCard {
            title: Some("Pauls Full Cream Milk 2L $3.10".to_string()),
            text: "Pauls Full Cream Milk 2L $3.10".to_string(),
            price_text: "$3.10".to_string(),
            href: Some("/products/milk".to_string()),
            image: Some("//cdn.shop.test/milk.jpg".to_string()),
            ..RawCard::default()
        };
        let product = card.into_product(&ctx()).unwrap();
        assert_eq!(product.title, "Pauls Full Cream Milk 2L");
        assert_eq!(product.price, "$3.10");
        assert_eq!(product.unit_price, "2L");
        assert_eq!(product.product_url, "https://shop.test/products/milk");
        assert_eq!(product.image_url, "https://cdn.shop.test/milk.jpg");
        assert_eq!(product.brand, "Pauls");
        assert_eq!(product.store, "Harris Farm");
        assert_eq!(product.source_query, "milk");
    }

    #[test]
    fn card_without_title_is_an_extraction_mismatch() {
        let card = RawCard {
            price_text: "$3.10".to_string(),
            ..RawCard::default()
        };
        assert!(matches!(
            card.into_product(&ctx()),
            Err(ScraperError::ExtractionMismatch { field: "title" })
        ));
    }
}
