use super::document::ExperimentConfig;
use crate::error::{OdynError, Result};
use std::path::Path;
use toml_edit::{DocumentMut, Item, TableLike, Value};

/// On-disk text of a config document, comments and unknown keys included.
///
/// Saving merges the recognized keys into this layout and only rewrites
/// values that actually changed, keeping their surrounding whitespace and
/// comments.
#[derive(Debug, Clone)]
pub struct ConfigLayout {
    document: DocumentMut,
}

impl ConfigLayout {
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let text = decode(bytes, path)?;
        let document = text.parse::<DocumentMut>().map_err(|e| OdynError::ConfigDocument {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })?;
        Ok(Self { document })
    }

    /// Layout with `config`'s recognized keys merged in
    pub fn merged(&self, config: &ExperimentConfig) -> Result<Self> {
        let fresh = config
            .to_toml_string()?
            .parse::<DocumentMut>()
            .map_err(|e| OdynError::invalid("document", e.message()))?;

        let mut document = self.document.clone();
        merge_table(document.as_table_mut(), fresh.as_table());
        Ok(Self { document })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.document.to_string().into_bytes()
    }
}

/// Config file bytes as UTF-8 text; invalid bytes are a document error
pub fn decode<'a>(bytes: &'a [u8], path: &Path) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| OdynError::ConfigDocument {
        path: path.to_path_buf(),
        message: format!("not valid UTF-8: {}", e),
    })
}

fn merge_table(target: &mut dyn TableLike, source: &dyn TableLike) {
    for (key, item) in source.iter() {
        match target.get_mut(key) {
            Some(existing) => merge_item(existing, item),
            None => {
                target.insert(key, item.clone());
            }
        }
    }
}

fn merge_item(existing: &mut Item, update: &Item) {
    if let (Some(target), Some(source)) = (existing.as_table_like_mut(), update.as_table_like()) {
        merge_table(target, source);
        return;
    }

    if let (Some(current), Some(value)) = (existing.as_value_mut(), update.as_value()) {
        if !same_value(current, value) {
            let decor = current.decor().clone();
            *current = value.clone();
            *current.decor_mut() = decor;
        }
        return;
    }

    *existing = update.clone();
}

/// Equal as data, whatever the quoting, number formatting or spacing
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.value() == y.value(),
        (Value::Integer(x), Value::Integer(y)) => x.value() == y.value(),
        (Value::Float(x), Value::Float(y)) => x.value() == y.value(),
        (Value::Integer(x), Value::Float(y)) | (Value::Float(y), Value::Integer(x)) => {
            *x.value() as f64 == *y.value()
        }
        (Value::Boolean(x), Value::Boolean(y)) => x.value() == y.value(),
        (Value::Datetime(x), Value::Datetime(y)) => x.value() == y.value(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| same_value(a, b))
        }
        (Value::InlineTable(x), Value::InlineTable(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, v)| y.get(key).map_or(false, |w| same_value(v, w)))
        }
        _ => false,
    }
}
