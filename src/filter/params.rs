use serde_json::{Map, Value};
use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Push,
}

/// Decoded query string. `a[b][c]=v` nests objects, `a[]=v` appends to an
/// array and a repeated scalar key keeps its last value. The raw pairs
/// are kept in order for link construction.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
    tree: Map<String, Value>,
}

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let pairs: Vec<(String, String)> = raw
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let mut root = Value::Object(Map::new());
        for (key, value) in &pairs {
            insert(&mut root, &split_key(key), value.clone());
        }
        let tree = match root {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { pairs, tree }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.tree.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tree.contains_key(key)
    }

    pub fn tree(&self) -> &Map<String, Value> {
        &self.tree
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Original query string with the keys in `replace` set to new values.
    /// Replaced keys keep their position; new keys are appended.
    pub fn rewrite(&self, replace: &[(&str, String)]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut written: Vec<&str> = vec![];
        for (key, value) in &self.pairs {
            match replace.iter().find(|(k, _)| *k == key.as_str()) {
                Some((k, v)) => {
                    if !written.contains(k) {
                        serializer.append_pair(k, v);
                        written.push(*k);
                    }
                }
                None => {
                    serializer.append_pair(key, value);
                }
            }
        }
        for (key, value) in replace {
            if !written.contains(key) {
                serializer.append_pair(key, value);
            }
        }
        serializer.finish()
    }

    pub fn to_query_string(&self) -> String {
        self.rewrite(&[])
    }
}

/// Bracket levels below the root key; deeper keys stay literal
const MAX_NESTING: usize = 64;

fn split_key(key: &str) -> Vec<Segment> {
    let literal = vec![Segment::Key(key.to_string())];
    let Some(open) = key.find('[') else {
        return literal;
    };
    if open == 0 {
        return literal;
    }

    let mut segments = vec![Segment::Key(key[..open].to_string())];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return literal;
        }
        let Some(close) = rest.find(']') else {
            return literal;
        };
        if segments.len() > MAX_NESTING {
            return literal;
        }
        let name = &rest[1..close];
        segments.push(if name.is_empty() { Segment::Push } else { Segment::Key(name.to_string()) });
        rest = &rest[close + 1..];
    }
    segments
}

fn insert(target: &mut Value, segments: &[Segment], value: String) {
    match segments.split_first() {
        None => *target = Value::String(value),
        Some((Segment::Push, rest)) => {
            if !target.is_array() {
                *target = Value::Array(vec![]);
            }
            if let Value::Array(items) = target {
                let mut slot = Value::Null;
                insert(&mut slot, rest, value);
                items.push(slot);
            }
        }
        Some((Segment::Key(name), rest)) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(map) = target {
                let slot = map.entry(name.clone()).or_insert(Value::Null);
                insert(slot, rest, value);
            }
        }
    }
}
