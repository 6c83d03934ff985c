//! Invoice header form
//!
//! An in-memory [`FieldRegistry`] holding the invoice header slots that
//! region extraction can fill. Values are normalized per slot kind on
//! write and the whole form serializes to JSON as the correction payload.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use serde::Serialize;

use crate::extract::{ExtractionStatus, FieldKey, FieldRegistry};

/// How a slot normalizes the text written into it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    /// `DD.MM.YYYY` becomes `YYYY-MM-DD`
    Date,
    /// Currency marks stripped, regional separators resolved to a plain
    /// decimal
    Amount,
}

pub const INVOICE_FIELDS: &[(&str, FieldKind)] = &[
    ("invoice_number", FieldKind::Text),
    ("invoice_type", FieldKind::Text),
    ("brand_name", FieldKind::Text),
    ("supplier_name", FieldKind::Text),
    ("po_number", FieldKind::Text),
    ("issue_date", FieldKind::Date),
    ("due_date", FieldKind::Date),
    ("tax_point_date", FieldKind::Date),
    ("invoice_receipt_date", FieldKind::Date),
    ("supplier_tax_id", FieldKind::Text),
    ("buyer_tax_id", FieldKind::Text),
    ("buyer_company_reg_id", FieldKind::Text),
    ("supplier_details", FieldKind::Text),
    ("supplier_country_code", FieldKind::Text),
    ("buyer_details", FieldKind::Text),
    ("buyer_country_code", FieldKind::Text),
    ("ship_to_details", FieldKind::Text),
    ("ship_to_country_code", FieldKind::Text),
    ("payment_terms", FieldKind::Text),
    ("payment_information", FieldKind::Text),
    ("currency", FieldKind::Text),
    ("exchange_rate", FieldKind::Amount),
    ("subtotal", FieldKind::Amount),
    ("tax", FieldKind::Amount),
    ("total", FieldKind::Amount),
    ("delivery_note", FieldKind::Text),
    ("notes", FieldKind::Text),
];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

#[derive(Clone, Debug, Serialize)]
pub struct FieldSlot {
    pub kind: FieldKind,
    pub value: Option<String>,
    pub status: ExtractionStatus,
}

#[derive(Clone, Debug, Serialize)]
pub struct InvoiceForm {
    fields: BTreeMap<FieldKey, FieldSlot>,
}

impl Default for InvoiceForm {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceForm {
    #[must_use]
    pub fn new() -> Self {
        let fields = INVOICE_FIELDS
            .iter()
            .map(|&(key, kind)| {
                (
                    FieldKey::from(key),
                    FieldSlot {
                        kind,
                        value: None,
                        status: ExtractionStatus::Idle,
                    },
                )
            })
            .collect();
        Self { fields }
    }

    #[must_use]
    pub fn has_field(&self, field: &FieldKey) -> bool {
        self.fields.contains_key(field)
    }

    #[must_use]
    pub fn value(&self, field: &FieldKey) -> Option<&str> {
        self.fields.get(field)?.value.as_deref()
    }

    #[must_use]
    pub fn status(&self, field: &FieldKey) -> Option<ExtractionStatus> {
        self.fields.get(field).map(|slot| slot.status)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl FieldRegistry for InvoiceForm {
    fn write_field_value(&mut self, field: &FieldKey, text: &str) {
        let Some(slot) = self.fields.get_mut(field) else {
            warn!("Ignoring write to unknown field {field}");
            return;
        };

        let value = match slot.kind {
            FieldKind::Text => text.to_string(),
            FieldKind::Date => normalize_date(text),
            FieldKind::Amount => {
                let (amount, currency) = normalize_amount(text);
                if let Some(currency) = currency {
                    self.fill_currency(currency);
                }
                amount
            }
        };
        debug!("{field} = {value:?}");

        if let Some(slot) = self.fields.get_mut(field) {
            slot.value = Some(value);
        }
    }

    fn on_extraction_status(&mut self, field: &FieldKey, status: ExtractionStatus) {
        match self.fields.get_mut(field) {
            Some(slot) => slot.status = status,
            None => warn!("Status {status:?} for unknown field {field}"),
        }
    }
}

impl InvoiceForm {
    /// Record a currency seen next to an amount, unless one is set already
    fn fill_currency(&mut self, currency: String) {
        if let Some(slot) = self.fields.get_mut(&FieldKey::from("currency")) {
            if slot.value.is_none() {
                debug!("currency = {currency:?} (from amount)");
                slot.value = Some(currency);
            }
        }
    }
}

/// `DD.MM.YYYY` to `YYYY-MM-DD`. Anything else is kept verbatim.
fn normalize_date(text: &str) -> String {
    let trimmed = text.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    match parts.as_slice() {
        [day, month, year]
            if all_digits(day)
                && all_digits(month)
                && year.len() == 4
                && all_digits(year)
                && day.len() <= 2
                && month.len() <= 2 =>
        {
            format!("{year}-{month:0>2}-{day:0>2}")
        }
        _ => text.to_string(),
    }
}

/// Parse a monetary amount in US/UK or European notation.
///
/// Returns the plain decimal (or the input unchanged when it does not
/// parse) and the currency symbol or ISO code found next to it.
static CURRENCY_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z])([A-Z]{3})(?:[^A-Za-z]|$)")
        .expect("Failed to compile currency code regex")
});

fn normalize_amount(text: &str) -> (String, Option<String>) {
    let trimmed = text.trim();

    let mut currency = trimmed
        .chars()
        .find(|c| CURRENCY_SYMBOLS.contains(c))
        .map(String::from);
    let mut rest = trimmed.replace(CURRENCY_SYMBOLS, "");

    if currency.is_none() {
        let code = CURRENCY_CODE_RE
            .captures(&rest)
            .and_then(|caps| caps.get(1))
            .map(|m| (m.range(), m.as_str().to_string()));
        if let Some((range, code)) = code {
            rest.replace_range(range, "");
            currency = Some(code);
        }
    }

    let cleaned = rest.trim();
    let has_comma = cleaned.contains(',');
    let has_period = cleaned.contains('.');
    let has_space = cleaned.contains(' ');

    let candidate = if has_comma && has_period {
        // 5,123.45
        cleaned.replace(',', "")
    } else if has_comma {
        // 5 123,45 or 123,45
        cleaned.replace(' ', "").replace(',', ".")
    } else {
        // 123.45 or 5 123
        cleaned.replace(' ', "")
    };

    match candidate.parse::<f64>() {
        Ok(v) if v.is_finite() => (candidate, currency),
        _ => (text.to_string(), currency),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_are_normalized() {
        assert_eq!(normalize_date("5.3.2024"), "2024-03-05");
        assert_eq!(normalize_date("15.11.2023"), "2023-11-15");
        assert_eq!(normalize_date("2024-03-05"), "2024-03-05");
        assert_eq!(normalize_date("v1.2.3"), "v1.2.3");
    }

    #[test]
    fn amounts_handle_regional_formats() {
        assert_eq!(normalize_amount("5,123.45"), ("5123.45".into(), None));
        assert_eq!(normalize_amount("5 123,45"), ("5123.45".into(), None));
        assert_eq!(normalize_amount("123,45"), ("123.45".into(), None));
        assert_eq!(normalize_amount("5 123"), ("5123".into(), None));
        assert_eq!(
            normalize_amount("€ 1 250,00"),
            ("1250.00".into(), Some("€".into()))
        );
        assert_eq!(
            normalize_amount("1,250.00 EUR"),
            ("1250.00".into(), Some("EUR".into()))
        );
    }

    #[test]
    fn currency_code_glued_to_amount_is_found() {
        assert_eq!(
            normalize_amount("EUR1,250.00"),
            ("1250.00".into(), Some("EUR".into()))
        );
        assert_eq!(
            normalize_amount("99,90CHF"),
            ("99.90".into(), Some("CHF".into()))
        );
        assert_eq!(normalize_amount("TOTALS 5"), ("TOTALS 5".into(), None));
    }

    #[test]
    fn unparsable_amount_is_kept() {
        assert_eq!(normalize_amount("see attached"), ("see attached".into(), None));
    }

    #[test]
    fn write_normalizes_by_kind() {
        let mut form = InvoiceForm::new();
        form.write_field_value(&FieldKey::from("issue_date"), "01.02.2024");
        form.write_field_value(&FieldKey::from("invoice_number"), "01.02.2024");

        assert_eq!(form.value(&FieldKey::from("issue_date")), Some("2024-02-01"));
        assert_eq!(form.value(&FieldKey::from("invoice_number")), Some("01.02.2024"));
    }

    #[test]
    fn amount_fills_empty_currency_only() {
        let mut form = InvoiceForm::new();
        form.write_field_value(&FieldKey::from("total"), "$99.50");
        assert_eq!(form.value(&FieldKey::from("total")), Some("99.50"));
        assert_eq!(form.value(&FieldKey::from("currency")), Some("$"));

        form.write_field_value(&FieldKey::from("tax"), "£1.00");
        assert_eq!(form.value(&FieldKey::from("currency")), Some("$"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut form = InvoiceForm::new();
        let key = FieldKey::from("favourite_colour");
        form.write_field_value(&key, "blue");
        form.on_extraction_status(&key, ExtractionStatus::Matched);
        assert!(!form.has_field(&key));
        assert_eq!(form.value(&key), None);
    }

    #[test]
    fn json_carries_values_and_status() {
        let mut form = InvoiceForm::new();
        let key = FieldKey::from("po_number");
        form.write_field_value(&key, "PO-7");
        form.on_extraction_status(&key, ExtractionStatus::Matched);

        let json: serde_json::Value = serde_json::from_str(&form.to_json().unwrap()).unwrap();
        assert_eq!(json["fields"]["po_number"]["value"], "PO-7");
        assert_eq!(json["fields"]["po_number"]["status"], "matched");
        assert_eq!(json["fields"]["due_date"]["value"], serde_json::Value::Null);
    }
}
