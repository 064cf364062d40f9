use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Fields = BTreeMap<String, Value>;

/// A Firestore typed value. Only the shapes this client reads or writes get
/// accessors, the rest are carried so that decoding a foreign document does
/// not fail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(#[serde(with = "int64")] i64),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(serde_json::Value),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::StringValue(value.into())
    }

    pub fn integer(value: i64) -> Self {
        Value::IntegerValue(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) | Value::TimestampValue(s) => Some(s),
            _ => None,
        }
    }

    // Numbers written by other clients may arrive as doubles
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::IntegerValue(i) => Some(*i),
            Value::DoubleValue(d) if d.fract() == 0.0 => Some(*d as i64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::NullValue(..))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    #[serde(default)]
    pub fields: Fields,
}

mod int64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Text(String),
        Number(i64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Wire::deserialize(deserializer)? {
            Wire::Text(text) => text.parse().map_err(de::Error::custom),
            Wire::Number(number) => Ok(number),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,

    #[serde(default)]
    pub fields: Fields,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// The last path segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentWrite {
    pub fields: Fields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationQueryRequest {
    pub structured_aggregation_query: StructuredAggregationQuery,
}

impl RunAggregationQueryRequest {
    /// Count the documents of every collection named `collection_id` whose
    /// fields equal all of `equalities`.
    pub fn count_where_equal(collection_id: &str, alias: &str, equalities: Vec<(&str, Value)>) -> Self {
        let filters = equalities
            .into_iter()
            .map(|(field_path, value)| {
                Filter::FieldFilter(FieldFilter {
                    field: FieldReference {
                        field_path: field_path.to_owned(),
                    },
                    op: "EQUAL".to_owned(),
                    value,
                })
            })
            .collect();

        Self {
            structured_aggregation_query: StructuredAggregationQuery {
                structured_query: StructuredQuery {
                    from: vec![CollectionSelector {
                        collection_id: collection_id.to_owned(),
                        all_descendants: true,
                    }],
                    filter: Some(Filter::CompositeFilter(CompositeFilter {
                        op: "AND".to_owned(),
                        filters,
                    })),
                },
                aggregations: vec![Aggregation {
                    alias: alias.to_owned(),
                    count: Count {},
                }],
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAggregationQuery {
    pub structured_query: StructuredQuery,
    pub aggregations: Vec<Aggregation>,
}

#[derive(Debug, Serialize)]
pub struct StructuredQuery {
    pub from: Vec<CollectionSelector>,

    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSelector {
    pub collection_id: String,
    pub all_descendants: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    CompositeFilter(CompositeFilter),
    FieldFilter(FieldFilter),
}

#[derive(Debug, Serialize)]
pub struct CompositeFilter {
    pub op: String,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Serialize)]
pub struct FieldFilter {
    pub field: FieldReference,
    pub op: String,
    pub value: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_path: String,
}

#[derive(Debug, Serialize)]
pub struct Aggregation {
    pub alias: String,
    pub count: Count,
}

#[derive(Debug, Serialize)]
pub struct Count {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationQueryResponse {
    pub result: Option<AggregationResult>,
    pub read_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    #[serde(default)]
    pub aggregate_fields: Fields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub local_id: String,

    #[serde(default)]
    pub email: String,

    pub id_token: String,
    pub refresh_token: String,

    #[serde(default)]
    pub display_name: Option<String>,

    // Seconds, sent as a string
    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest<'a> {
    pub id_token: &'a str,
    pub display_name: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileResponse {
    pub local_id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    // Only present when the update rotated the tokens
    #[serde(default)]
    pub id_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthUriRequest<'a> {
    pub identifier: &'a str,
    pub continue_uri: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthUriResponse {
    #[serde(default)]
    pub signin_methods: Vec<String>,

    #[serde(default)]
    pub registered: bool,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub grant_type: &'a str,
    pub refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub user_id: String,

    #[serde(default)]
    pub expires_in: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest<'a> {
    pub id_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub local_id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesResponse {
    #[serde(default)]
    pub items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
}

impl SearchCandidate {
    pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
}

impl From<Volume> for SearchCandidate {
    fn from(
        Volume {
            id,
            volume_info:
                VolumeInfo {
                    title,
                    authors,
                    image_links,
                },
        }: Volume,
    ) -> Self {
        Self {
            id,
            title,
            author: authors
                .into_iter()
                .next()
                .unwrap_or_else(|| Self::UNKNOWN_AUTHOR.to_owned()),
            thumbnail: image_links.and_then(|links| links.thumbnail.or(links.small_thumbnail)),
        }
    }
}
