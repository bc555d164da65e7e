use serde_json::{Map, Value};

use crate::error::{ChartError, ChartResult};

/// Render entry point a series view should use for the current cycle.
///
/// Partial update paths mark the payload so the render task calls the
/// narrower view method when the view implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMethod {
    Render,
    UpdateView,
    UpdateVisual,
    UpdateLayout,
    UpdateTransform,
}

/// Action-dispatch message: an object with a `type` plus action fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    body: Map<String, Value>,
    render_method: Option<RenderMethod>,
}

impl Payload {
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("type".to_owned(), Value::String(action_type.into()));
        Self {
            body,
            render_method: None,
        }
    }

    /// Builds a payload from a JSON object with a string `type`.
    pub fn from_value(value: Value) -> ChartResult<Self> {
        let Value::Object(body) = value else {
            return Err(ChartError::InvalidData(
                "action payload must be an object".to_owned(),
            ));
        };
        if !body.get("type").is_some_and(Value::is_string) {
            return Err(ChartError::InvalidData(
                "action payload must carry a string `type`".to_owned(),
            ));
        }
        Ok(Self {
            body,
            render_method: None,
        })
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn action_type(&self) -> &str {
        self.body.get("type").and_then(Value::as_str).unwrap_or("")
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key).filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.body.clone())
    }

    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self.get("batch"), Some(Value::Array(_)))
    }

    /// Fans a batch payload out into items: each batch entry overlaid on the
    /// outer payload fields, with `batch` removed.
    #[must_use]
    pub fn batch_items(&self) -> Vec<Payload> {
        let Some(Value::Array(entries)) = self.get("batch") else {
            return vec![self.clone()];
        };
        entries
            .iter()
            .map(|entry| {
                let mut body = self.body.clone();
                body.remove("batch");
                if let Value::Object(fields) = entry {
                    for (key, value) in fields {
                        body.insert(key.clone(), value.clone());
                    }
                }
                Payload {
                    body,
                    render_method: self.render_method,
                }
            })
            .collect()
    }

    /// `dataIndex` as a list, accepting a single index or an array.
    #[must_use]
    pub fn data_indices(&self) -> Option<Vec<usize>> {
        match self.get("dataIndex")? {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|index| usize::try_from(index).ok())
                    .collect(),
            ),
            value => value
                .as_u64()
                .and_then(|index| usize::try_from(index).ok())
                .map(|index| vec![index]),
        }
    }

    #[must_use]
    pub fn render_method(&self) -> Option<RenderMethod> {
        self.render_method
    }

    pub fn mark_render_method(&mut self, method: RenderMethod) {
        self.render_method = Some(method);
    }
}
