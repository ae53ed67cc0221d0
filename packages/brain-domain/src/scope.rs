/// The (tenant, project) pair every read and write is filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
	pub tenant_id: String,
	pub project_key: String,
}

/// Tenant-scoped read filter; a missing project key widens the read to every
/// project of the tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
	pub tenant_id: String,
	pub project_key: Option<String>,
}

impl Scope {
	pub fn new(tenant_id: impl Into<String>, project_key: impl Into<String>) -> Self {
		Self { tenant_id: tenant_id.into(), project_key: project_key.into() }
	}
}

impl std::fmt::Display for Scope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.tenant_id, self.project_key)
	}
}

impl ScopeFilter {
	pub fn tenant(tenant_id: impl Into<String>) -> Self {
		Self { tenant_id: tenant_id.into(), project_key: None }
	}

	pub fn matches(&self, scope: &Scope) -> bool {
		scope.tenant_id == self.tenant_id
			&& self.project_key.as_deref().is_none_or(|project| project == scope.project_key)
	}
}

impl From<&Scope> for ScopeFilter {
	fn from(scope: &Scope) -> Self {
		Self { tenant_id: scope.tenant_id.clone(), project_key: Some(scope.project_key.clone()) }
	}
}
