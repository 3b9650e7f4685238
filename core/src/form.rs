//! Request data: ordered key/value fields plus file uploads.
//!
//! # Design
//! A `Form` is the single input type for every verb method. Depending on the
//! verb and flags it becomes a query string, a URL-encoded body, a JSON body,
//! or (when it carries an `UploadFile`) a multipart body that the transport
//! encodes itself.
//!
//! Query strings follow the conventions common to PHP-style backends:
//! `true`/`false` become `1`/`0`, `null` is dropped, arrays and objects are
//! flattened into `key[0]` / `key[sub]` pairs.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::error::ClientError;

const DEFAULT_UPLOAD_MIME: &str = "application/octet-stream";

/// A file to send as one part of a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    path: PathBuf,
    mime_type: Option<String>,
    file_name: Option<String>,
}

impl UploadFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mime_type: None,
            file_name: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Override the file name reported to the server.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_UPLOAD_MIME)
    }

    /// The explicit file name, else the last path component.
    pub fn file_name(&self) -> String {
        if let Some(name) = &self.file_name {
            return name.clone();
        }
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    }
}

/// The value of a single form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Value(Value),
    File(UploadFile),
}

/// Ordered request fields. Keys are unique; setting an existing key replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    fields: Vec<(String, FormValue)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key.into(), FormValue::Value(value.into()));
        self
    }

    pub fn file(mut self, key: impl Into<String>, file: UploadFile) -> Self {
        self.insert(key.into(), FormValue::File(file));
        self
    }

    /// Build a form from any value that serializes to a JSON object.
    /// `null` yields an empty form.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self, ClientError> {
        match serde_json::to_value(data)? {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ClientError::Serialization(format!(
                "form data must serialize to an object, got {other}"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, key: &str) -> Option<&FormValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether any field is a file upload.
    pub fn has_file(&self) -> bool {
        self.fields
            .iter()
            .any(|(_, value)| matches!(value, FormValue::File(_)))
    }

    /// Encode the plain fields as `application/x-www-form-urlencoded`.
    /// File fields are not representable in a query string and are skipped.
    pub fn to_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.fields {
            if let FormValue::Value(value) = value {
                append_value(&mut query, key, value);
            }
        }
        query.finish()
    }

    /// The fields as a JSON object. Fails if the form carries a file.
    pub fn to_json(&self) -> Result<Value, ClientError> {
        let mut map = serde_json::Map::with_capacity(self.fields.len());
        for (key, value) in &self.fields {
            match value {
                FormValue::Value(value) => {
                    map.insert(key.clone(), value.clone());
                }
                FormValue::File(file) => {
                    return Err(ClientError::Serialization(format!(
                        "field `{key}` is a file upload ({}) and cannot be JSON encoded",
                        file.path().display()
                    )));
                }
            }
        }
        Ok(Value::Object(map))
    }

    fn insert(&mut self, key: String, value: FormValue) {
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Form {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Form::new(), |form, (key, value)| form.field(key, value))
    }
}

fn append_value(query: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(flag) => {
            query.append_pair(key, if *flag { "1" } else { "0" });
        }
        Value::Number(number) => {
            query.append_pair(key, &number.to_string());
        }
        Value::String(text) => {
            query.append_pair(key, text);
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                append_value(query, &format!("{key}[{index}]"), item);
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                append_value(query, &format!("{key}[{sub}]"), item);
            }
        }
    }
}

/// Join URL-encoded `key=value` pairs with `separator`.
pub(crate) fn encode_pairs<'a, I>(pairs: I, separator: &str) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                form_urlencoded::byte_serialize(key.as_bytes()).collect::<String>(),
                form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>()
            )
        })
        .collect::<Vec<_>>()
        .join(separator)
}
