//! JSON bodies exchanged with the remote tree service.
//!
//! Field names follow the server (`camelCase`, `tierType` discriminators). Timestamps stay strings
//! here; [`crate::tree`] parses them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{MetaMap, MetaSchema, TierPath};

/// Shallow description of one child in a [`TreeResponse`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeChildResponse {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub info: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub outcome: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub started: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hlts_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notebook_path: Option<String>,
	/// Values for the optional table columns.
	#[serde(default)]
	pub additional_meta: MetaMap,
}

/// Tree data for one tier plus shallow summaries of its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
	pub name: String,
	/// Folder of the tier on the server's disk.
	pub folder: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub info: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub outcome: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub started: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hlts_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta_path: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notebook_path: Option<String>,
	#[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
	pub additional_meta: MetaMap,
	/// What kind of children may be created below this tier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub child_cls_info: Option<ChildClsInfo>,
	/// Immediate children by identifier, in server order.
	#[serde(default)]
	pub children: IndexMap<String, TreeChildResponse>,
}

/// Child class description of a folder-kind child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildClsFolderInfo {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_regex: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name_part_template: Option<String>,
}

/// Child class description of a notebook-kind child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildClsNotebookInfo {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_regex: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name_part_template: Option<String>,
	/// Notebook templates a new child may be created from.
	#[serde(default)]
	pub templates: Vec<String>,
	/// Schema of the new child's meta document.
	#[serde(default)]
	pub meta_schema: MetaSchema,
}

/// What kind of children a tier accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tierType", rename_all = "lowercase")]
pub enum ChildClsInfo {
	Folder(ChildClsFolderInfo),
	Notebook(ChildClsNotebookInfo),
}

impl ChildClsInfo {
	/// Display name of the child class ("Experiment", "Sample", ...).
	pub fn name(&self) -> Option<&str> {
		match self {
			Self::Folder(info) => info.name.as_deref(),
			Self::Notebook(info) => info.name.as_deref(),
		}
	}

	/// Pattern a child identifier must match in full.
	pub fn id_regex(&self) -> Option<&str> {
		match self {
			Self::Folder(info) => info.id_regex.as_deref(),
			Self::Notebook(info) => info.id_regex.as_deref(),
		}
	}

	/// Name template with `{}` standing for the identifier.
	pub fn name_part_template(&self) -> Option<&str> {
		match self {
			Self::Folder(info) => info.name_part_template.as_deref(),
			Self::Notebook(info) => info.name_part_template.as_deref(),
		}
	}

	/// Allowed notebook templates; empty for folders.
	pub fn templates(&self) -> &[String] {
		match self {
			Self::Folder(_) => &[],
			Self::Notebook(info) => &info.templates,
		}
	}

	/// Meta schema of new children; `None` for folders.
	pub fn meta_schema(&self) -> Option<&MetaSchema> {
		match self {
			Self::Folder(_) => None,
			Self::Notebook(info) => Some(&info.meta_schema),
		}
	}

	/// Kind of tier this class creates.
	pub fn kind(&self) -> TierKind {
		match self {
			Self::Folder(_) => TierKind::Folder,
			Self::Notebook(_) => TierKind::Notebook,
		}
	}
}

/// Kind discriminator shared by [`TierInfo`] and [`ChildClsInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
	Folder,
	Notebook,
}

/// Lookup result for a folder tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderTierInfo {
	pub name: String,
	#[serde(rename = "ids")]
	pub path: TierPath,
	/// Names of the tier's children.
	#[serde(default)]
	pub children: Vec<String>,
}

/// Lookup result for a notebook tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookTierInfo {
	pub name: String,
	#[serde(rename = "ids")]
	pub path: TierPath,
	#[serde(default)]
	pub children: Vec<String>,
	pub started: String,
	pub notebook_path: String,
	pub meta_path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hlts_path: Option<String>,
	#[serde(default)]
	pub meta_schema: MetaSchema,
}

/// Entity info returned by the service's `lookup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tierType", rename_all = "lowercase")]
pub enum TierInfo {
	Folder(FolderTierInfo),
	Notebook(NotebookTierInfo),
}

impl TierInfo {
	pub fn name(&self) -> &str {
		match self {
			Self::Folder(info) => &info.name,
			Self::Notebook(info) => &info.name,
		}
	}

	pub fn path(&self) -> &TierPath {
		match self {
			Self::Folder(info) => &info.path,
			Self::Notebook(info) => &info.path,
		}
	}

	pub fn children(&self) -> &[String] {
		match self {
			Self::Folder(info) => &info.children,
			Self::Notebook(info) => &info.children,
		}
	}

	pub fn kind(&self) -> TierKind {
		match self {
			Self::Folder(_) => TierKind::Folder,
			Self::Notebook(_) => TierKind::Notebook,
		}
	}
}

/// Request body for creating a child tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewChildInfo {
	/// Identifier of the new child below its parent.
	pub id: String,
	/// Name of the parent tier.
	pub parent: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub template: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Additional metadata for the new child's meta document.
	#[serde(flatten)]
	pub extra: MetaMap,
}

impl NewChildInfo {
	pub fn new(parent: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			parent: parent.into(),
			..Self::default()
		}
	}

	pub fn template(mut self, template: impl Into<String>) -> Self {
		self.template = Some(template.into());
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.extra.insert(key.into(), value);
		self
	}
}
