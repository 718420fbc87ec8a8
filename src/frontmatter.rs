use std::collections::BTreeMap;

const FENCE: &str = "---";

/// Flat `key: "value"` front matter, rendered in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    fields: Vec<(String, String)>,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn opt_field(self, key: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {}", quote(v)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// JSON string literal, so quotes, backslashes and newlines survive.
fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Full content file: front matter, blank line, body in a single `<div>`.
pub fn render_document(front: &FrontMatter, body: &str) -> String {
    format!("{FENCE}\n{}\n{FENCE}\n\n<div>\n{body}\n</div>\n", front.render())
}

/// Read the front matter block back. `None` if the file has none.
pub fn parse(content: &str) -> Option<BTreeMap<String, String>> {
    let mut lines = content.lines();
    if lines.next()?.trim_end() != FENCE {
        return None;
    }

    let mut fields = BTreeMap::new();
    for line in lines {
        if line.trim_end() == FENCE {
            return Some(fields);
        }
        let Some((key, raw)) = line.split_once(':') else {
            continue;
        };
        let raw = raw.trim();
        let value = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string());
        fields.insert(key.trim().to_string(), value);
    }
    // Unterminated block.
    None
}
