use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema keyword tagging a property as system managed.
pub const FIELD_TAG_KEY: &str = "x-cas-field";

/// Visibility tag of a metadata property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldTag {
	/// Required metadata managed by the tier itself (description, conclusion, started).
	Core,
	/// Bookkeeping never shown to users (library versions and the like).
	Private,
}

impl FieldTag {
	fn from_value(value: &Value) -> Option<Self> {
		match value.as_str()? {
			"core" => Some(Self::Core),
			"private" => Some(Self::Private),
			_ => None,
		}
	}
}

/// JSON-Schema describing a tier's meta document.
///
/// Property definitions may carry `"x-cas-field": "core" | "private"`. Untagged properties, and
/// keys the schema does not mention, are the "additional" metadata users curate themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaSchema(Value);

impl Default for MetaSchema {
	fn default() -> Self {
		Self(serde_json::json!({ "properties": {} }))
	}
}

impl MetaSchema {
	/// Wrap a raw schema document.
	pub fn new(schema: Value) -> Self {
		Self(schema)
	}

	/// The raw schema document.
	pub fn as_value(&self) -> &Value {
		&self.0
	}

	/// Consume into the raw schema document.
	pub fn into_value(self) -> Value {
		self.0
	}

	/// Property definitions by name.
	pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.0
			.get("properties")
			.and_then(Value::as_object)
			.into_iter()
			.flat_map(|props| props.iter().map(|(k, v)| (k.as_str(), v)))
	}

	/// Tag of the property `key`, if it has one.
	pub fn field_tag(&self, key: &str) -> Option<FieldTag> {
		self.0
			.get("properties")?
			.get(key)?
			.get(FIELD_TAG_KEY)
			.and_then(FieldTag::from_value)
	}

	/// Whether `key` is tagged core or private.
	pub fn is_hidden(&self, key: &str) -> bool {
		self.field_tag(key).is_some()
	}

	/// Names of all core or private properties.
	pub fn hidden_fields(&self) -> Vec<&str> {
		self.properties()
			.filter(|(_, def)| def.get(FIELD_TAG_KEY).and_then(FieldTag::from_value).is_some())
			.map(|(name, _)| name)
			.collect()
	}

	/// The schema with core and private properties stripped, also from `required`.
	pub fn public(&self) -> MetaSchema {
		let hidden: Vec<String> = self.hidden_fields().into_iter().map(str::to_owned).collect();
		let mut schema = self.0.clone();

		if let Some(props) = schema.get_mut("properties").and_then(Value::as_object_mut) {
			props.retain(|name, _| !hidden.contains(name));
		}
		if let Some(required) = schema.get_mut("required").and_then(Value::as_array_mut) {
			required.retain(|name| name.as_str().is_none_or(|name| !hidden.iter().any(|h| h == name)));
		}

		MetaSchema(schema)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn schema() -> MetaSchema {
		MetaSchema::new(json!({
			"properties": {
				"description": { "type": "string", "x-cas-field": "core" },
				"cas_lib_version": { "type": "string", "x-cas-field": "private" },
				"temperature": { "type": "number" }
			},
			"required": ["description", "temperature"],
			"additionalProperties": {}
		}))
	}

	#[test]
	fn test_field_tags() {
		let schema = schema();
		assert_eq!(schema.field_tag("description"), Some(FieldTag::Core));
		assert_eq!(schema.field_tag("cas_lib_version"), Some(FieldTag::Private));
		assert_eq!(schema.field_tag("temperature"), None);
		assert_eq!(schema.field_tag("missing"), None);
		assert!(schema.is_hidden("description"));
		assert!(!schema.is_hidden("temperature"));
	}

	#[test]
	fn test_public_strips_hidden() {
		let public = schema().public();
		assert_eq!(
			public.as_value(),
			&json!({
				"properties": {
					"temperature": { "type": "number" }
				},
				"required": ["temperature"],
				"additionalProperties": {}
			})
		);
	}

	#[test]
	fn test_schema_without_properties() {
		let schema = MetaSchema::new(json!({}));
		assert!(schema.hidden_fields().is_empty());
		assert_eq!(schema.public(), schema);
	}
}
