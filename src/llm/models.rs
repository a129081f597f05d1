//! Model listing shapes and name normalization.

use serde_json::Value;

/// One element of a model listing.
///
/// Hosts report models as bare names, as objects with `name`/`model` keys, or
/// as `(label, [entries])` pairs. Anything else is kept for its rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelListing {
    Name(String),
    Entry {
        name: Option<String>,
        model: Option<String>,
    },
    Group {
        label: String,
        entries: Vec<ModelListing>,
    },
    Other(Value),
}

impl ModelListing {
    /// Classify a raw JSON listing element.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(name) => ModelListing::Name(name),
            Value::Object(ref map) => {
                let field = |key: &str| {
                    map.get(key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                };
                let name = field("name");
                let model = field("model");
                if name.is_none() && model.is_none() {
                    ModelListing::Other(value)
                } else {
                    ModelListing::Entry { name, model }
                }
            }
            Value::Array(ref items) if is_group(items) => {
                let label = items[0].as_str().unwrap_or_default().to_string();
                let entries = items[1]
                    .as_array()
                    .map(|list| list.iter().cloned().map(ModelListing::from_value).collect())
                    .unwrap_or_default();
                ModelListing::Group { label, entries }
            }
            other => ModelListing::Other(other),
        }
    }
}

fn is_group(items: &[Value]) -> bool {
    items.len() == 2 && items[0].is_string() && items[1].is_array()
}

/// Flatten listings into unique model names, keeping first-seen order.
pub fn normalize_models(listings: &[ModelListing]) -> Vec<String> {
    let mut names = Vec::new();
    for listing in listings {
        collect_names(listing, &mut names);
    }
    names
}

fn collect_names(listing: &ModelListing, names: &mut Vec<String>) {
    let name = match listing {
        ModelListing::Name(name) => Some(name.clone()),
        ModelListing::Entry { name, model } => name.clone().or_else(|| model.clone()),
        ModelListing::Group { entries, .. } => {
            for entry in entries {
                collect_names(entry, names);
            }
            None
        }
        ModelListing::Other(value) => Some(value.to_string()),
    };

    if let Some(name) = name {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
}
