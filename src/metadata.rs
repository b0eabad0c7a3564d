use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

pub const FILE_NAME_FIELD: &str = "file_name";
pub const UNKNOWN_VALUE: &str = "Unknown";
pub const TEXT_FIELDS: [&str; 5] = ["abstract", "description", "title", "creator", "subject"];
pub const LIST_FIELDS: [&str; 4] = [
    "keywords",
    "basic_keywords",
    "long_tail_keywords",
    "seo_keywords",
];

const PLACEHOLDER_VALUES: [&str; 2] = ["unknown", "not available"];

const PROMPT_HEADER: &str = "You are an expert metadata curator and librarian specializing in media studies. Your task is to analyze the provided OCR text from a document and generate structured metadata in JSON format. Please ensure the metadata is detailed, contextually accurate, and adheres to the following keys:

- Abstract (Resumen): A concise summary (150-200 words) of the document's primary themes and content.
- Keywords (Palabras Clave): A list of relevant keywords (6-10) summarizing the document's core topics.
- Description: A brief (1-2 sentence) description capturing the essence of the document.
- Title: The main title of the document.
- Creator (Autor): The name(s) of the document's author(s).
- Subject: The general subject or field the document pertains to.
- Basic Keywords: A list of simple keywords summarizing the document.
- Long-tail keywords: Detailed, descriptive keyword phrases related to the document's content.
- SEO Keywords: Keywords optimized for search engines, capturing both broad and niche aspects of the document.

**Output:**
The metadata should be returned as a well-structured JSON object with all keys filled. Use \"Unknown\" or \"Not Available\" for any fields that cannot be determined from the input text.
";

pub fn build_prompt(document_text: &str) -> String {
    format!("{PROMPT_HEADER}\n{document_text}\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetadataRecord(Map<String, Value>);

impl MetadataRecord {
    pub fn degraded(file_name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(FILE_NAME_FIELD.to_string(), Value::String(file_name.to_string()));
        Self(fields)
    }

    pub fn is_degraded(&self) -> bool {
        self.0.len() == 1 && self.0.contains_key(FILE_NAME_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn complete(mut fields: Map<String, Value>, file_name: &str) -> Self {
        for field in TEXT_FIELDS {
            let missing = fields.get(field).map(Value::is_null).unwrap_or(true);
            if missing {
                fields.insert(field.to_string(), Value::String(UNKNOWN_VALUE.to_string()));
            }
        }
        for field in LIST_FIELDS {
            let missing = fields.get(field).map(Value::is_null).unwrap_or(true);
            if missing {
                fields.insert(field.to_string(), Value::Array(Vec::new()));
            }
        }
        fields.insert(FILE_NAME_FIELD.to_string(), Value::String(file_name.to_string()));
        Self(fields)
    }

    /// Folds per-batch records into one: the first informative text value
    /// wins, keyword lists are unioned in order, other keys keep their first
    /// occurrence.
    pub fn merge(records: Vec<MetadataRecord>, file_name: &str) -> Self {
        let parsed: Vec<MetadataRecord> = records
            .into_iter()
            .filter(|record| !record.is_degraded())
            .collect();
        if parsed.is_empty() {
            return Self::degraded(file_name);
        }

        let mut merged = Map::new();
        for record in parsed {
            for (key, value) in record.0 {
                if key == FILE_NAME_FIELD {
                    continue;
                }

                if LIST_FIELDS.contains(&key.as_str()) {
                    let entry = merged
                        .entry(key)
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let (Value::Array(existing), Value::Array(incoming)) = (entry, value) {
                        for item in incoming {
                            if !existing.contains(&item) {
                                existing.push(item);
                            }
                        }
                    }
                    continue;
                }

                let replace = match merged.get(&key) {
                    None => true,
                    Some(current) => is_placeholder(current) && !is_placeholder(&value),
                };
                if replace {
                    merged.insert(key, value);
                }
            }
        }

        Self::complete(merged, file_name)
    }
}

fn is_placeholder(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => is_placeholder_text(text),
        _ => false,
    }
}

fn is_placeholder_text(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    normalized.is_empty() || PLACEHOLDER_VALUES.contains(&normalized.as_str())
}

pub struct ResponseParser {
    parenthetical: Regex,
    separators: Regex,
    fence: Regex,
}

impl ResponseParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            parenthetical: Regex::new(r"\([^)]*\)")
                .context("failed to compile parenthetical regex")?,
            separators: Regex::new(r"[^a-z0-9]+").context("failed to compile separator regex")?,
            fence: Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```$")
                .context("failed to compile code fence regex")?,
        })
    }

    pub fn canonical_key(&self, key: &str) -> String {
        let lowered = key.to_lowercase();
        let without_translation = self.parenthetical.replace_all(&lowered, " ");
        self.separators
            .replace_all(&without_translation, "_")
            .trim_matches('_')
            .to_string()
    }

    pub fn parse(&self, file_name: &str, content: &str) -> Result<MetadataRecord> {
        let trimmed = content.trim();
        let body = self
            .fence
            .captures(trimmed)
            .and_then(|captures| captures.get(1))
            .map(|body| body.as_str())
            .unwrap_or(trimmed);

        let value: Value =
            serde_json::from_str(body).context("metadata content is not valid JSON")?;
        let Value::Object(raw_fields) = value else {
            bail!("metadata content is not a JSON object");
        };

        let mut fields = Map::new();
        for (key, value) in raw_fields {
            let canonical = self.canonical_key(&key);
            if canonical.is_empty() || fields.contains_key(&canonical) {
                continue;
            }
            let value = if LIST_FIELDS.contains(&canonical.as_str()) {
                split_keyword_string(value)
            } else {
                value
            };
            fields.insert(canonical, value);
        }

        Ok(MetadataRecord::complete(fields, file_name))
    }

    pub fn parse_or_degrade(&self, file_name: &str, content: &str) -> MetadataRecord {
        match self.parse(file_name, content) {
            Ok(record) => record,
            Err(err) => {
                warn!(file = %file_name, error = %err, "metadata content is malformed");
                MetadataRecord::degraded(file_name)
            }
        }
    }
}

fn split_keyword_string(value: Value) -> Value {
    match value {
        Value::String(text) if is_placeholder_text(&text) => Value::Array(Vec::new()),
        Value::String(text) => Value::Array(
            text.split([',', ';'])
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        ),
        other => other,
    }
}
