use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;

use crate::time::{format_started, parse_optional_started};
use crate::{ChildClsInfo, Error, MetaMap, Result, TierPath, TreeChildResponse, TreeResponse};

/// Shallow view of a child tier.
///
/// Carries no children of its own; the cache promotes a child to a [`TreeNode`] only when that
/// path is fetched directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChildSummary {
	pub name: String,
	pub info: Option<String>,
	pub outcome: Option<String>,
	pub started: Option<DateTime<Utc>>,
	pub meta_path: Option<String>,
	pub hlts_path: Option<String>,
	pub notebook_path: Option<String>,
	/// Values for the optional table columns.
	pub additional_meta: MetaMap,
}

impl ChildSummary {
	/// Convert a wire child, parsing `started`.
	pub fn from_response(response: TreeChildResponse) -> Result<Self> {
		Ok(Self {
			started: parse_optional_started(response.started.as_deref())?,
			name: response.name,
			info: response.info,
			outcome: response.outcome,
			meta_path: response.meta_path,
			hlts_path: response.hlts_path,
			notebook_path: response.notebook_path,
			additional_meta: response.additional_meta,
		})
	}

	/// Convert back into the wire form.
	pub fn to_response(&self) -> TreeChildResponse {
		TreeChildResponse {
			name: self.name.clone(),
			info: self.info.clone(),
			outcome: self.outcome.clone(),
			started: self.started.as_ref().map(format_started),
			hlts_path: self.hlts_path.clone(),
			meta_path: self.meta_path.clone(),
			notebook_path: self.notebook_path.clone(),
			additional_meta: self.additional_meta.clone(),
		}
	}
}

/// One tier as last fetched from the server, with its complete list of immediate children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeNode {
	pub name: String,
	pub folder: String,
	pub started: Option<DateTime<Utc>>,
	/// Identifier chain this node was fetched at.
	pub path: TierPath,
	pub info: Option<String>,
	pub outcome: Option<String>,
	pub meta_path: Option<String>,
	pub hlts_path: Option<String>,
	pub notebook_path: Option<String>,
	pub additional_meta: MetaMap,
	pub child_cls_info: Option<ChildClsInfo>,
	pub children: IndexMap<String, ChildSummary>,
}

impl TreeNode {
	/// Convert a tree response fetched at `path`.
	pub fn from_response(response: TreeResponse, path: TierPath) -> Result<Self> {
		let children = response
			.children
			.into_iter()
			.map(|(id, child)| Ok((id, ChildSummary::from_response(child)?)))
			.collect::<Result<IndexMap<_, _>>>()?;

		Ok(Self {
			started: parse_optional_started(response.started.as_deref())?,
			name: response.name,
			folder: response.folder,
			path,
			info: response.info,
			outcome: response.outcome,
			meta_path: response.meta_path,
			hlts_path: response.hlts_path,
			notebook_path: response.notebook_path,
			additional_meta: response.additional_meta,
			child_cls_info: response.child_cls_info,
			children,
		})
	}

	/// Convert back into the wire form.
	pub fn to_response(&self) -> TreeResponse {
		TreeResponse {
			name: self.name.clone(),
			folder: self.folder.clone(),
			info: self.info.clone(),
			outcome: self.outcome.clone(),
			started: self.started.as_ref().map(format_started),
			hlts_path: self.hlts_path.clone(),
			meta_path: self.meta_path.clone(),
			notebook_path: self.notebook_path.clone(),
			additional_meta: self.additional_meta.clone(),
			child_cls_info: self.child_cls_info.clone(),
			children: self
				.children
				.iter()
				.map(|(id, child)| (id.clone(), child.to_response()))
				.collect(),
		}
	}

	/// Whether the tier has any children.
	pub fn has_children(&self) -> bool {
		!self.children.is_empty()
	}

	/// Name template for new children, `{}` standing for the identifier.
	///
	/// Children of the root are named by the template alone; deeper children are prefixed with
	/// this tier's name (`WP1` + `.{}` gives `WP1.{}`).
	pub fn child_name_template(&self) -> Option<String> {
		let part = self.child_cls_info.as_ref()?.name_part_template()?;
		if self.path.is_root() {
			Some(part.to_string())
		} else {
			Some(format!("{}{part}", self.name))
		}
	}

	/// Name a child created with identifier `id` would get.
	pub fn child_name(&self, id: &str) -> Option<String> {
		self.child_name_template().map(|template| template.replacen("{}", id, 1))
	}

	/// Check a proposed identifier for a new child.
	///
	/// The identifier must match the child class `idRegex` in full and must not collide with an
	/// existing child.
	pub fn validate_child_id(&self, id: &str) -> Result<()> {
		if id.is_empty() {
			return Err(Error::ChildId {
				id: id.to_string(),
				reason: "identifier is empty",
			});
		}
		let Some(cls) = self.child_cls_info.as_ref() else {
			return Err(Error::ChildId {
				id: id.to_string(),
				reason: "tier does not accept children",
			});
		};
		if let Some(pattern) = cls.id_regex() {
			let anchored = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| Error::IdPattern {
				pattern: pattern.to_string(),
				reason: e.to_string(),
			})?;
			if !anchored.is_match(id) {
				return Err(Error::ChildId {
					id: id.to_string(),
					reason: "identifier does not match the child id pattern",
				});
			}
		}
		if self.children.contains_key(id) {
			return Err(Error::ChildId {
				id: id.to_string(),
				reason: "a child with this identifier already exists",
			});
		}
		Ok(())
	}
}
