//! Filter operators and bucket-name resolution.
//!
//! Every indexed property is backed by a named bucket in the shard's store.
//! Value buckets are named `property_<name>`; auxiliary states (null tracking,
//! property lengths, object timestamps) live in sibling buckets derived from
//! the property name. Resolution also handles the legacy user-facing `id`
//! property, which maps onto the internal id property.

use crate::error::Error;

/// Internal id property name.
pub const PROP_ID: &str = "_id";
/// Legacy user-facing alias for [`PROP_ID`].
pub const PROP_ID_LEGACY: &str = "id";
/// Object creation timestamp property.
pub const PROP_CREATION_TIME_UNIX: &str = "_creationTimeUnix";
/// Object last-update timestamp property.
pub const PROP_LAST_UPDATE_TIME_UNIX: &str = "_lastUpdateTimeUnix";

/// Suffix of buckets tracking the null state of a property.
pub const NULL_STATE_SUFFIX: &str = "_nullState";
/// Suffix of buckets tracking the length of a property.
pub const PROPERTY_LENGTH_SUFFIX: &str = "_propertyLength";

/// Name of the bit-sliced range indexing strategy.
pub const STRATEGY_ROARING_SET_RANGE: &str = "roaring-set-range";

const BUCKET_PREFIX: &str = "property_";

/// Filter operator, either a leaf predicate applied to a value or a boolean
/// combinator over child filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    IsNull,
    WithinGeoRange,
}

impl Operator {
    /// Whether this operator applies to a value (leaf) rather than to child
    /// filters (And/Or).
    pub fn on_value(&self) -> bool {
        !matches!(self, Operator::And | Operator::Or)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operator::And => "And",
            Operator::Or => "Or",
            Operator::Equal => "Equal",
            Operator::NotEqual => "NotEqual",
            Operator::GreaterThan => "GreaterThan",
            Operator::GreaterThanEqual => "GreaterThanEqual",
            Operator::LessThan => "LessThan",
            Operator::LessThanEqual => "LessThanEqual",
            Operator::IsNull => "IsNull",
            Operator::WithinGeoRange => "WithinGeoRange",
        }
    }

    /// Stable one-byte tag used in combined checksums. Values are part of the
    /// cache format and must not be reassigned.
    pub fn tag(&self) -> u8 {
        match self {
            Operator::And => 0x01,
            Operator::Or => 0x02,
            Operator::Equal => 0x10,
            Operator::NotEqual => 0x11,
            Operator::GreaterThan => 0x12,
            Operator::GreaterThanEqual => 0x13,
            Operator::LessThan => 0x14,
            Operator::LessThanEqual => 0x15,
            Operator::IsNull => 0x16,
            Operator::WithinGeoRange => 0x17,
        }
    }
}

/// Name of the value bucket backing a property.
pub fn bucket_from_prop(prop: &str) -> String {
    format!("{BUCKET_PREFIX}{prop}")
}

/// If `bucket` addresses a property-length lookup (`property_len(<name>)`),
/// returns the inner property name.
fn parse_property_length(bucket: &str) -> Option<&str> {
    let rest = bucket.strip_prefix(BUCKET_PREFIX)?;
    let inner = rest.strip_prefix("len(")?.strip_suffix(')')?;
    if inner.is_empty() { None } else { Some(inner) }
}

/// Outcome of resolving a filter property to a bucket name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketResolution {
    /// Bucket to read from.
    pub bucket: String,
    /// Property name after rewrites (legacy id, property length).
    pub prop: String,
    /// The filter targets a property-length bucket.
    pub is_property_length: bool,
}

/// Resolve a leaf filter's property and operator to the bucket serving it.
pub fn resolve_bucket(prop: &str, operator: Operator) -> BucketResolution {
    let mut prop = prop.to_string();
    let mut bucket = bucket_from_prop(&prop);

    if prop == PROP_ID_LEGACY {
        // the user-specified id property is legacy; serve it from the
        // internal id property
        prop = PROP_ID.to_string();
        bucket = bucket_from_prop(&prop);
    }

    if operator == Operator::IsNull {
        bucket.push_str(NULL_STATE_SUFFIX);
    }

    let mut is_property_length = false;
    if let Some(inner) = parse_property_length(&bucket) {
        prop = format!("{inner}{PROPERTY_LENGTH_SUFFIX}");
        bucket = bucket_from_prop(&prop);
        is_property_length = true;
    }

    BucketResolution {
        bucket,
        prop,
        is_property_length,
    }
}

/// Error for a resolved bucket that does not exist in the store, directing
/// the operator at the index configuration option that must be enabled.
pub fn missing_bucket_error(resolution: &BucketResolution, operator: Operator) -> Error {
    if resolution.is_property_length {
        return Error::Config(
            "Property length must be indexed to be filterable! \
             add `IndexPropertyLength: true` to the invertedIndexConfig.\
             Geo-coordinates, phone numbers and data blobs are not supported by property length."
                .to_string(),
        );
    }

    if operator == Operator::IsNull {
        return Error::Config(
            "Nullstate must be indexed to be filterable! \
             add `indexNullState: true` to the invertedIndexConfig"
                .to_string(),
        );
    }

    if resolution.prop == PROP_CREATION_TIME_UNIX || resolution.prop == PROP_LAST_UPDATE_TIME_UNIX {
        return Error::Config(
            "timestamps must be indexed to be filterable! \
             add `indexTimestamps: true` to the invertedIndexConfig"
                .to_string(),
        );
    }

    Error::Config(format!(
        "bucket for prop {} not found - is it indexed?",
        resolution.prop
    ))
}
