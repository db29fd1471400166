//! Batch options from the report page's `<select>` control.

use scraper::{Html, Selector};

use crate::api::TimetableError;
use crate::models::Batch;

/// Options whose label starts with this are type placeholders, not batches
const PLACEHOLDER_PREFIX: &str = "type.";

/// Pseudo-batches the picker offers that never carry their own classes
const EXCLUDED_NAMES: &[&str] = &["Common Batch", "BREAK"];

fn is_placeholder(name: &str) -> bool {
    name.starts_with(PLACEHOLDER_PREFIX) || EXCLUDED_NAMES.contains(&name)
}

fn selector(css: &str) -> Result<Selector, TimetableError> {
    Selector::parse(css).map_err(|e| TimetableError::Parse(format!("bad selector {}: {:?}", css, e)))
}

/// Enumerate `(value, label)` options of the control with id (or name)
/// `control_id`, skipping placeholders. Names are unique; the first
/// occurrence wins. No valid option is a parse failure.
pub fn parse_batch_options(html: &str, control_id: &str) -> Result<Vec<Batch>, TimetableError> {
    let document = Html::parse_document(html);
    let by_id = selector(&format!(r#"select[id="{}"]"#, control_id))?;
    let by_name = selector(&format!(r#"select[name="{0}"], select[name="{0}[]"]"#, control_id))?;
    let option = selector("option")?;

    let control = document
        .select(&by_id)
        .next()
        .or_else(|| document.select(&by_name).next())
        .ok_or_else(|| TimetableError::Parse("Batch list not found".to_string()))?;

    let mut batches: Vec<Batch> = Vec::new();
    for node in control.select(&option) {
        let value = node.value().attr("value").unwrap_or_default().trim();
        let name = node.text().collect::<String>();
        let name = name.trim();
        if value.is_empty() || name.is_empty() || is_placeholder(name) {
            continue;
        }
        if batches.iter().any(|b| b.name == name) {
            continue;
        }
        batches.push(Batch::new(name, value));
    }

    if batches.is_empty() {
        return Err(TimetableError::Parse("No batches found in response".to_string()));
    }
    Ok(batches)
}
