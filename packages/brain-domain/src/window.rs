use time::OffsetDateTime;

/// Optional inclusive time window. Open bounds render as `*` in the label so
/// windowed and unwindowed builds never collide on cluster identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
	pub start: Option<OffsetDateTime>,
	pub end: Option<OffsetDateTime>,
}

impl Window {
	pub fn new(start: Option<OffsetDateTime>, end: Option<OffsetDateTime>) -> Self {
		Self { start, end }
	}

	pub fn is_open(&self) -> bool {
		self.start.is_none() && self.end.is_none()
	}

	pub fn contains(&self, ts: OffsetDateTime) -> bool {
		if self.start.is_some_and(|start| ts < start) {
			return false;
		}
		if self.end.is_some_and(|end| ts > end) {
			return false;
		}

		true
	}

	pub fn label(&self) -> String {
		format!("{}..{}", bound_label(self.start), bound_label(self.end))
	}
}

fn bound_label(bound: Option<OffsetDateTime>) -> String {
	match bound {
		Some(ts) => ts.unix_timestamp().to_string(),
		None => "*".to_string(),
	}
}
