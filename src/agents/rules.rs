//! Regex and keyword based extraction/classification

use super::{CollaboratorError, Entities, EntityExtractor, IntentClassifier, IntentResult};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;

const MAX_DATES: usize = 3;
const MAX_PART_NUMBERS: usize = 5;
const MAX_PRICES: usize = 3;

/// Fallback when no keyword matches at all
const FALLBACK_INTENT: &str = "general_inquiry";
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Intents in priority order; ties go to the earlier entry
const INTENT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "delivery_delay",
        &["delay", "delayed", "late", "postpone", "reschedule", "behind schedule"],
    ),
    (
        "price_change",
        &["price", "pricing", "cost", "quote", "increase", "decrease", "change"],
    ),
    (
        "quantity_change",
        &["quantity", "qty", "units", "increase", "decrease", "revise"],
    ),
    (
        "acknowledgement_request",
        &["acknowledge", "confirm", "receipt", "received", "please confirm"],
    ),
    (
        "quality_issue",
        &["defect", "quality", "damage", "issue", "problem", "reject"],
    ),
    (
        "general_inquiry",
        &["question", "inquiry", "ask", "help", "information"],
    ),
];

/// Supply-chain email parser built on regular expressions
#[derive(Debug, Clone)]
pub struct RuleBasedParser {
    po: Regex,
    quantity: Regex,
    date: Regex,
    part_number: Regex,
    price: Regex,
}

impl RuleBasedParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            po: Regex::new(r"(?i)\bPO[#\s]*:?\s*(\d{4,})\b")?,
            quantity: Regex::new(r"(?i)\b(\d+(?:,\d+)?)\s*(?:units?|pcs?|pieces?|qty)\b")?,
            date: Regex::new(
                r"\b(\d{1,2}[/-]\d{1,2}[/-]\d{2,4}|\w+\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2})\b",
            )?,
            part_number: Regex::new(r"(?i)\b(?:Part|Item|SKU)[#\s]*:?\s*([A-Z0-9-]+)\b")?,
            price: Regex::new(r"\$?\s*(\d+(?:,\d+)?(?:\.\d{2})?)\b")?,
        })
    }

    pub fn extract_entities(&self, body: &str, subject: &str) -> Entities {
        let text = format!("{} {}", subject, body);
        let text = text.trim();

        let mut entities = Entities::default();

        if let Some(po) = first_capture(&self.po, text).next() {
            entities.po_number = Some(po);
            entities.confidence += 0.3;
        }

        entities.quantities = first_capture(&self.quantity, text)
            .map(|quantity| quantity.replace(',', ""))
            .collect();
        if !entities.quantities.is_empty() {
            entities.confidence += 0.2;
        }

        entities.dates = first_capture(&self.date, text).take(MAX_DATES).collect();
        entities.part_numbers = first_capture(&self.part_number, text)
            .take(MAX_PART_NUMBERS)
            .collect();
        entities.prices = first_capture(&self.price, text).take(MAX_PRICES).collect();

        entities.confidence = entities.confidence.min(1.0);
        entities
    }

    pub fn classify_intent(&self, subject: &str, body: &str) -> IntentResult {
        let text = format!("{} {}", subject, body).to_lowercase();

        let mut best: Option<(&str, u32, usize)> = None;
        let mut scores = BTreeMap::new();

        for &(intent, keywords) in INTENT_KEYWORDS {
            let score = keywords.iter().filter(|keyword| text.contains(*keyword)).count() as u32;
            scores.insert(intent.to_string(), score);

            if score > 0 && best.map_or(true, |(_, top, _)| score > top) {
                best = Some((intent, score, keywords.len()));
            }
        }

        match best {
            Some((intent, score, keyword_count)) => IntentResult {
                intent: intent.to_string(),
                confidence: (score as f64 / keyword_count as f64).min(1.0),
                scores,
            },
            None => IntentResult {
                intent: FALLBACK_INTENT.to_string(),
                confidence: FALLBACK_CONFIDENCE,
                scores,
            },
        }
    }
}

fn first_capture<'a>(pattern: &'a Regex, text: &'a str) -> impl Iterator<Item = String> + 'a {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
}

#[async_trait]
impl EntityExtractor for RuleBasedParser {
    async fn extract(&self, text: &str, subject_hint: &str) -> Result<Entities, CollaboratorError> {
        Ok(self.extract_entities(text, subject_hint))
    }
}

#[async_trait]
impl IntentClassifier for RuleBasedParser {
    async fn classify(&self, subject: &str, body: &str) -> Result<IntentResult, CollaboratorError> {
        Ok(self.classify_intent(subject, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> RuleBasedParser {
        RuleBasedParser::new().unwrap()
    }

    #[test]
    fn test_delivery_delay_email() {
        let parser = parser();
        let subject = "PO #12345 Delivery Update";
        let body = "Dear buyer, Purchase Order #12345 will be delayed by 3 days. New delivery date: December 15, 2024. Quantity: 500 units. We apologize for the inconvenience.";

        let entities = parser.extract_entities(body, subject);
        assert_eq!(entities.po_number.as_deref(), Some("12345"));
        assert_eq!(entities.quantities, vec!["500"]);
        assert_eq!(entities.dates, vec!["December 15, 2024"]);
        assert!(entities.part_numbers.is_empty());
        assert!((entities.confidence - 0.5).abs() < 1e-9);

        // delivery_delay and quantity_change tie at 2; declaration order wins
        let intent = parser.classify_intent(subject, body);
        assert_eq!(intent.intent, "delivery_delay");
        assert_eq!(intent.scores["delivery_delay"], 2);
        assert_eq!(intent.scores["quantity_change"], 2);
        assert!((intent.confidence - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_price_change_email() {
        let parser = parser();
        let subject = "Price Change Notification - Order #67890";
        let body = "Please be advised that the price for Part #ABC-123 has increased from $10.00 to $12.00 per unit, effective January 1, 2025. This affects PO #67890. Please confirm acceptance.";

        let entities = parser.extract_entities(body, subject);
        assert_eq!(entities.po_number.as_deref(), Some("67890"));
        assert_eq!(entities.part_numbers, vec!["ABC-123"]);
        assert_eq!(entities.dates, vec!["January 1, 2025"]);
        assert_eq!(entities.prices.len(), 3);
        assert!((entities.confidence - 0.3).abs() < 1e-9);

        let intent = parser.classify_intent(subject, body);
        assert_eq!(intent.intent, "price_change");
        assert_eq!(intent.scores["price_change"], 3);
    }

    #[test]
    fn test_acknowledgement_email_strips_commas() {
        let parser = parser();
        let subject = "Please acknowledge receipt of PO #99999";
        let body = "We have received your Purchase Order #99999 for 1,000 units. Please confirm receipt so we can proceed with production. Delivery scheduled for March 20, 2025.";

        let entities = parser.extract_entities(body, subject);
        assert_eq!(entities.po_number.as_deref(), Some("99999"));
        assert_eq!(entities.quantities, vec!["1000"]);

        let intent = parser.classify_intent(subject, body);
        assert_eq!(intent.intent, "acknowledgement_request");
        assert_eq!(intent.confidence, 1.0);
    }

    #[test]
    fn test_quantity_change_email() {
        let parser = parser();
        let subject = "Quantity revision for order #11111";
        let body = "Regarding PO #11111, we need to revise the quantity from 250 units to 300 units. All other terms remain the same. Please confirm if this works.";

        let entities = parser.extract_entities(body, subject);
        assert_eq!(entities.quantities, vec!["250", "300"]);

        let intent = parser.classify_intent(subject, body);
        assert_eq!(intent.intent, "quantity_change");
        assert_eq!(intent.confidence, 0.5);
    }

    #[test]
    fn test_no_keywords_falls_back_to_general_inquiry() {
        let intent = parser().classify_intent("Hello", "Greetings from the warehouse team.");
        assert_eq!(intent.intent, "general_inquiry");
        assert_eq!(intent.confidence, 0.5);
        assert!(intent.scores.values().all(|score| *score == 0));
        assert_eq!(intent.scores.len(), 6);
    }

    #[test]
    fn test_empty_text_yields_empty_entities() {
        let entities = parser().extract_entities("", "");
        assert_eq!(entities, Entities::default());
    }

    #[tokio::test]
    async fn test_trait_implementations_delegate() {
        let parser = parser();
        let entities = parser.extract("PO 4444 for 10 pcs", "").await.unwrap();
        assert_eq!(entities.po_number.as_deref(), Some("4444"));
        assert_eq!(entities.quantities, vec!["10"]);

        let intent = parser.classify("Defect report", "quality problem").await.unwrap();
        assert_eq!(intent.intent, "quality_issue");
    }
}
