use std::collections::BTreeMap;

/// Keys removed before filtering. Ordering always comes from the resource's default sort.
pub const RESERVED_KEYS: &[&str] = &["sort"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(v) => vec![v.as_str()],
            ParamValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Non-empty values only
    pub fn present_values(&self) -> Vec<&str> {
        self.values().into_iter().filter(|v| !v.trim().is_empty()).collect()
    }

    pub fn is_blank(&self) -> bool {
        self.present_values().is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.values().into_iter().next()
    }
}

/// Canonical query-parameter map: repeated keys and `key[]` keys collapse into `Many`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map: BTreeMap<String, ParamValue> = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            let (key, bracketed) = match key.strip_suffix("[]") {
                Some(stripped) => (stripped.to_string(), true),
                None => (key, false),
            };

            match map.remove(&key) {
                Some(ParamValue::Single(prev)) => {
                    map.insert(key, ParamValue::Many(vec![prev, value]));
                }
                Some(ParamValue::Many(mut prev)) => {
                    prev.push(value);
                    map.insert(key, ParamValue::Many(prev));
                }
                None if bracketed => {
                    map.insert(key, ParamValue::Many(vec![value]));
                }
                None => {
                    map.insert(key, ParamValue::Single(value));
                }
            }
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(ParamValue::first)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    /// Move a value to a new key, replacing anything already stored there.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) {
        if let Some(value) = self.0.remove(from) {
            self.0.insert(to.into(), value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Strip reserved keys. Resource-specific reshaping happens before this, in
/// `Resource::format_params`.
pub fn normalize(mut params: QueryParams) -> QueryParams {
    for key in RESERVED_KEYS {
        if params.remove(key).is_some() {
            tracing::debug!("Ignoring client-supplied '{}' parameter", key);
        }
    }
    params
}
