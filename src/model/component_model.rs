use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::option::{merge_option, option_f64, option_str, value_to_key};

static NEXT_MODEL_UID: AtomicU64 = AtomicU64::new(1);

/// Identity of one model object. A model re-created for the same logical
/// component gets a fresh uid even when its `id` is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelUid(u64);

impl ModelUid {
    pub(crate) fn next() -> Self {
        Self(NEXT_MODEL_UID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Type tag and identity shared by component and series models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelIdentity {
    pub uid: ModelUid,
    pub main_type: String,
    pub sub_type: String,
    pub id: String,
    pub name: Option<String>,
    pub component_index: usize,
}

impl ModelIdentity {
    /// `main.sub`, or just `main` for untyped components.
    #[must_use]
    pub fn full_type(&self) -> String {
        if self.sub_type.is_empty() {
            self.main_type.clone()
        } else {
            format!("{}.{}", self.main_type, self.sub_type)
        }
    }

    /// Key of the view bound to this model.
    #[must_use]
    pub fn view_id(&self) -> String {
        format!("_ec_{}_{}", self.id, self.full_type())
    }
}

/// Derived, engine-owned state hung off a model node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelState {
    pub(crate) require_new_view: bool,
    pub(crate) view_id: Option<String>,
    pub(crate) assigned_zlevel: i32,
}

/// Read access common to every node of the model tree.
pub trait ModelNode {
    fn identity(&self) -> &ModelIdentity;
    fn option(&self) -> &Value;
    fn state(&self) -> &ModelState;
    fn state_mut(&mut self) -> &mut ModelState;

    fn get(&self, key: &str) -> Option<&Value> {
        self.option().get(key).filter(|value| !value.is_null())
    }

    /// Declared `zlevel`, 0 when absent.
    fn zlevel(&self) -> i32 {
        option_f64(self.option(), "zlevel").map_or(0, |value| value as i32)
    }

    fn z(&self) -> f64 {
        option_f64(self.option(), "z").unwrap_or(0.0)
    }

    fn zlevel_key(&self) -> Option<&str> {
        option_str(self.option(), "zlevelKey").filter(|key| !key.is_empty())
    }

    /// Z-level assigned by the last allocation pass.
    fn assigned_zlevel(&self) -> i32 {
        self.state().assigned_zlevel
    }

    fn view_id(&self) -> Option<&str> {
        self.state().view_id.as_deref()
    }
}

/// One non-series component (`grid`, `xAxis`, `title`...).
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentModel {
    identity: ModelIdentity,
    option: Value,
    state: ModelState,
}

impl ComponentModel {
    #[must_use]
    pub(crate) fn new(identity: ModelIdentity, option: Value) -> Self {
        Self {
            identity,
            option,
            state: ModelState::default(),
        }
    }

    #[must_use]
    pub fn uid(&self) -> ModelUid {
        self.identity.uid
    }

    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.identity.main_type
    }

    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.identity.sub_type
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.identity.name.as_deref()
    }

    #[must_use]
    pub fn component_index(&self) -> usize {
        self.identity.component_index
    }

    pub(crate) fn merge_option(&mut self, option: &Value) {
        merge_option(&mut self.option, option);
    }

    pub(crate) fn set_component_index(&mut self, index: usize) {
        self.identity.component_index = index;
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.identity.name = name;
    }
}

impl ModelNode for ComponentModel {
    fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    fn option(&self) -> &Value {
        &self.option
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum QueryKey {
    #[default]
    Any,
    All,
    Indices(Vec<usize>),
    Ids(Vec<String>),
    Names(Vec<String>),
}

/// Selects models of one main type by `<main>Index`, `<main>Id` or
/// `<main>Name` fields. Index wins over id, id over name; with none of them
/// every model of the main type matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentQuery {
    main_type: String,
    key: QueryKey,
}

impl ComponentQuery {
    #[must_use]
    pub fn all(main_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            key: QueryKey::All,
        }
    }

    #[must_use]
    pub fn by_index(main_type: impl Into<String>, index: usize) -> Self {
        Self {
            main_type: main_type.into(),
            key: QueryKey::Indices(vec![index]),
        }
    }

    #[must_use]
    pub fn by_id(main_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            key: QueryKey::Ids(vec![id.into()]),
        }
    }

    #[must_use]
    pub fn by_name(main_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            key: QueryKey::Names(vec![name.into()]),
        }
    }

    /// Reads `<main>Index|Id|Name` from an object such as an action payload
    /// or a pixel-conversion finder.
    #[must_use]
    pub fn from_fields(main_type: &str, fields: &serde_json::Map<String, Value>) -> Self {
        let read = |suffix: &str| {
            fields
                .get(&format!("{main_type}{suffix}"))
                .filter(|value| !value.is_null())
        };

        let key = if let Some(index) = read("Index") {
            match index {
                Value::String(text) if text == "all" => QueryKey::All,
                Value::Array(items) => QueryKey::Indices(
                    items
                        .iter()
                        .filter_map(Value::as_u64)
                        .filter_map(|index| usize::try_from(index).ok())
                        .collect(),
                ),
                other => other
                    .as_u64()
                    .and_then(|index| usize::try_from(index).ok())
                    .map_or(QueryKey::Indices(Vec::new()), |index| {
                        QueryKey::Indices(vec![index])
                    }),
            }
        } else if let Some(id) = read("Id") {
            QueryKey::Ids(keys_of(id))
        } else if let Some(name) = read("Name") {
            QueryKey::Names(keys_of(name))
        } else {
            QueryKey::Any
        };

        Self {
            main_type: main_type.to_owned(),
            key,
        }
    }

    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    /// `true` when no selecting field was given.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        matches!(self.key, QueryKey::Any)
    }

    #[must_use]
    pub fn matches(&self, identity: &ModelIdentity) -> bool {
        if identity.main_type != self.main_type {
            return false;
        }
        match &self.key {
            QueryKey::Any | QueryKey::All => true,
            QueryKey::Indices(indices) => indices.contains(&identity.component_index),
            QueryKey::Ids(ids) => ids.iter().any(|id| *id == identity.id),
            QueryKey::Names(names) => identity
                .name
                .as_ref()
                .is_some_and(|name| names.contains(name)),
        }
    }
}

fn keys_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_key).collect(),
        other => value_to_key(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ComponentQuery, ModelIdentity, ModelUid};
    use serde_json::json;

    fn identity(index: usize, id: &str, name: Option<&str>) -> ModelIdentity {
        ModelIdentity {
            uid: ModelUid::next(),
            main_type: "series".to_owned(),
            sub_type: "scatter".to_owned(),
            id: id.to_owned(),
            name: name.map(str::to_owned),
            component_index: index,
        }
    }

    #[test]
    fn view_id_combines_id_and_full_type() {
        let model = identity(0, "a", None);
        assert_eq!(model.full_type(), "series.scatter");
        assert_eq!(model.view_id(), "_ec_a_series.scatter");
    }

    #[test]
    fn query_prefers_index_over_id_and_name() {
        let fields = json!({ "seriesIndex": [1], "seriesId": "a", "seriesName": "n" });
        let query = ComponentQuery::from_fields("series", fields.as_object().expect("object"));
        assert!(!query.matches(&identity(0, "a", Some("n"))));
        assert!(query.matches(&identity(1, "b", None)));

        let by_name = json!({ "seriesName": ["n", "m"] });
        let query = ComponentQuery::from_fields("series", by_name.as_object().expect("object"));
        assert!(query.matches(&identity(4, "z", Some("m"))));
        assert!(!query.matches(&identity(4, "z", None)));

        let empty = json!({});
        let query = ComponentQuery::from_fields("series", empty.as_object().expect("object"));
        assert!(query.is_unconstrained());
        assert!(query.matches(&identity(9, "q", None)));
    }
}
