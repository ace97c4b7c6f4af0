use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Module parameters. The blog module defines none, but the query
/// surface still exposes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub creator: String,
    #[serde(with = "stringy_u64")]
    pub id: u64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentPost {
    pub creator: String,
    #[serde(with = "stringy_u64")]
    pub id: u64,
    #[serde(rename = "postID")]
    pub post_id: String,
    pub title: String,
    pub chain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoData {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IbcPostPacketData {
    pub title: String,
    pub content: String,
    pub creator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IbcUpdatePostPacketData {
    #[serde(rename = "postID")]
    pub post_id: String,
    pub title: String,
    pub content: String,
    pub editor: String,
}

/// IBC packet payload, one-of over the packet kinds the module sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlogPacket {
    NoData(NoData),
    IbcPostPacket(IbcPostPacketData),
    IbcUpdatePostPacket(IbcUpdatePostPacketData),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogPacketData {
    pub packet: Option<BlogPacket>,
}

/// Pagination request forwarded to the node, mirroring the SDK's
/// `PageRequest` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub offset: u64,
    pub limit: u64,
    pub count_total: bool,
    pub reverse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageResponse {
    pub next_key: Option<String>,
    #[serde(with = "stringy_u64")]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsResponse {
    pub params: Params,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostResponse {
    pub post: Post,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostAllResponse {
    pub post: Vec<Post>,
    pub pagination: Option<PageResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentPostResponse {
    #[serde(rename = "sentPost")]
    pub sent_post: SentPost,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentPostAllResponse {
    #[serde(rename = "sentPost")]
    pub sent_post: Vec<SentPost>,
    pub pagination: Option<PageResponse>,
}

/// Folds a follow-up page into an accumulated response: repeated fields
/// concatenate, everything else takes the newest page's value.
pub trait MergePages {
    fn merge_page(&mut self, next: Self);
}

impl MergePages for PostAllResponse {
    fn merge_page(&mut self, next: Self) {
        self.post.extend(next.post);
        self.pagination = next.pagination;
    }
}

impl MergePages for SentPostAllResponse {
    fn merge_page(&mut self, next: Self) {
        self.sent_post.extend(next.sent_post);
        self.pagination = next.pagination;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    pub subscribe: bool,
    pub all: bool,
}

/// Filter for queries keyed by post id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostId {
    pub id: u64,
}

/// Filter for queries with no filter fields; serializes to `{}` so list
/// and params queries still key on `{ params, query }` uniformly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoFilter {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockEvent {
    pub height: u64,
}

/// Cache key derived from `{ params, query }` via canonical JSON, so two
/// logically equal parameter objects always collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Arc<str>);

impl QueryKey {
    pub fn new<P: Serialize>(params: &P, query: Option<&PageRequest>) -> Self {
        let body = serde_json::json!({ "params": params, "query": query });
        QueryKey(Arc::from(canonical_json(&body).as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact JSON with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    use fmt::Write as _;

    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{}", Value::String((*key).clone()));
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => {
            let _ = write!(out, "{other}");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub runtime_type: &'static str,
}

/// Derives the field descriptor list of an entity type from the JSON
/// shape of its default-constructed instance.
pub fn structure_of<T: Serialize + Default>() -> Vec<FieldDescriptor> {
    match serde_json::to_value(T::default()).unwrap_or(Value::Null) {
        Value::Object(map) => map
            .into_iter()
            .map(|(name, value)| FieldDescriptor {
                name,
                runtime_type: runtime_type_name(&value),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn runtime_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// u64 fields that nodes emit as decimal strings in JSON.
pub(crate) mod stringy_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(n),
            Raw::Text(t) => t.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_sorts_keys_recursively() {
        let v: Value = serde_json::from_str(r#"{"b":{"y":2,"x":1},"a":[{"q":0,"p":3}]}"#).unwrap();
        assert_eq!(
            canonical_json(&v),
            r#"{"a":[{"p":3,"q":0}],"b":{"x":1,"y":2}}"#
        );
    }

    #[test]
    fn query_key_ignores_field_order() {
        let left: Value = serde_json::from_str(r#"{"id":5,"creator":"alice"}"#).unwrap();
        let right: Value = serde_json::from_str(r#"{"creator":"alice","id":5}"#).unwrap();
        assert_eq!(QueryKey::new(&left, None), QueryKey::new(&right, None));
    }

    #[test]
    fn query_key_distinguishes_absent_query() {
        let page = PageRequest {
            limit: 10,
            ..Default::default()
        };
        assert_ne!(
            QueryKey::new(&NoFilter {}, None),
            QueryKey::new(&NoFilter {}, Some(&page))
        );
    }

    #[test]
    fn structure_of_post_lists_all_fields() {
        let fields = structure_of::<Post>();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"creator"));
        assert!(names.contains(&"id"));
        assert!(names.contains(&"title"));
        assert!(names.contains(&"content"));
        let id = fields.iter().find(|f| f.name == "id").unwrap();
        assert_eq!(id.runtime_type, "string");
    }

    #[test]
    fn post_id_accepts_string_or_number() {
        let a: Post = serde_json::from_str(r#"{"id":"7","title":"t"}"#).unwrap();
        let b: Post = serde_json::from_str(r#"{"id":7,"title":"t"}"#).unwrap();
        assert_eq!(a.id, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn update_packet_keeps_editor_field() {
        let packet: IbcUpdatePostPacketData = serde_json::from_value(serde_json::json!({
            "postID": "1",
            "title": "t",
            "content": "c",
            "editor": "bob",
        }))
        .unwrap();
        assert_eq!(packet.editor, "bob");
        assert_eq!(packet.post_id, "1");

        let round_trip = serde_json::to_value(&packet).unwrap();
        assert_eq!(round_trip["editor"], "bob");
    }

    #[test]
    fn merge_concatenates_lists_and_overwrites_scalars() {
        let mut acc = PostAllResponse {
            post: vec![
                Post {
                    id: 1,
                    ..Default::default()
                },
                Post {
                    id: 2,
                    ..Default::default()
                },
            ],
            pagination: Some(PageResponse {
                next_key: Some("X".into()),
                total: 3,
            }),
        };
        acc.merge_page(PostAllResponse {
            post: vec![Post {
                id: 3,
                ..Default::default()
            }],
            pagination: Some(PageResponse {
                next_key: None,
                total: 3,
            }),
        });

        let ids: Vec<u64> = acc.post.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(acc.pagination.unwrap().next_key, None);
    }
}
