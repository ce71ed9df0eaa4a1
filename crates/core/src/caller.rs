//! The authenticated caller's authorization context (spec §3 `CallerContext`).
//!
//! Modeled as an explicit immutable value threaded through every call site, per §9's
//! design note — no ambient "current user" global. The core trusts every field
//! completely; it only performs the structural checks called out below.

use std::collections::BTreeSet;

use crate::error::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Scope {
  Organization,
  All,
}

impl Scope {
  fn parse(s: &str) -> Option<Self> {
    return match s {
      "organization" => Some(Self::Organization),
      "all" => Some(Self::All),
      _ => None,
    };
  }
}

/// The finite, statically-known set of permission tokens this core recognizes, parsed
/// once at the edge from `resource:action[:scope]` strings (§9 design note "Permission
/// enumeration"). Tokens this core doesn't recognize are not an error: the caller's
/// raw permission set may legitimately contain tokens belonging to other subsystems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionToken {
  DataExplorerQuery(Scope),
  DataExplorerExecute(Scope),
  MetadataRead(Scope),
  MetadataWrite(Scope),
  DiscoveryRunAll,
}

impl PermissionToken {
  pub fn parse(raw: &str) -> Option<Self> {
    let mut parts = raw.splitn(4, ':');
    let resource = parts.next()?;
    let action = parts.next()?;
    let scope = parts.next();

    if resource != "data-explorer" {
      return None;
    }

    return match action {
      "query" => Some(Self::DataExplorerQuery(Scope::parse(scope?)?)),
      "execute" => Some(Self::DataExplorerExecute(Scope::parse(scope?)?)),
      "metadata" => {
        let sub_action = scope?;
        let scope = Scope::parse(parts.next()?)?;
        match sub_action {
          "read" => Some(Self::MetadataRead(scope)),
          "write" => Some(Self::MetadataWrite(scope)),
          _ => None,
        }
      }
      "discovery" => {
        if scope? == "run" && parts.next()? == "all" {
          Some(Self::DiscoveryRunAll)
        } else {
          None
        }
      }
      _ => None,
    };
  }
}

#[derive(Clone, Debug)]
pub struct CallerContext {
  pub caller_id: String,
  pub is_super_admin: bool,
  pub organization_id: String,
  permissions: BTreeSet<PermissionToken>,
  pub accessible_practice_ids: BTreeSet<i64>,
  pub accessible_provider_ids: Option<BTreeSet<i64>>,
}

impl CallerContext {
  /// Builds a context from raw permission-token strings, dropping (with a warning, not
  /// an error) any token this core doesn't recognize.
  pub fn new(
    caller_id: impl Into<String>,
    organization_id: impl Into<String>,
    is_super_admin: bool,
    raw_permissions: &[impl AsRef<str>],
    accessible_practice_ids: impl IntoIterator<Item = i64>,
    accessible_provider_ids: Option<impl IntoIterator<Item = i64>>,
  ) -> Result<Self, PipelineError> {
    let mut permissions = BTreeSet::new();
    for raw in raw_permissions {
      match PermissionToken::parse(raw.as_ref()) {
        Some(token) => {
          permissions.insert(token);
        }
        None => {
          tracing::warn!(token = raw.as_ref(), "unrecognized permission token");
        }
      }
    }

    let accessible_practice_ids: BTreeSet<i64> = accessible_practice_ids.into_iter().collect();

    return Ok(Self {
      caller_id: caller_id.into(),
      is_super_admin,
      organization_id: organization_id.into(),
      permissions,
      accessible_practice_ids,
      accessible_provider_ids: accessible_provider_ids.map(|ids| ids.into_iter().collect()),
    });
  }

  pub fn has_permission(&self, token: PermissionToken) -> bool {
    return self.permissions.contains(&token);
  }

  #[cfg(test)]
  pub fn for_test(
    caller_id: &str,
    is_super_admin: bool,
    practice_ids: impl IntoIterator<Item = i64>,
  ) -> Self {
    return Self {
      caller_id: caller_id.to_string(),
      is_super_admin,
      organization_id: "org-1".to_string(),
      permissions: [
        PermissionToken::DataExplorerQuery(Scope::Organization),
        PermissionToken::DataExplorerExecute(Scope::Organization),
        PermissionToken::MetadataRead(Scope::Organization),
      ]
      .into_iter()
      .collect(),
      accessible_practice_ids: practice_ids.into_iter().collect(),
      accessible_provider_ids: None,
    };
  }
}
