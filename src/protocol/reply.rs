/// A single decoded reply frame.
///
/// Nil values are modelled as `None` inside [`Reply::Bulk`] and
/// [`Reply::Array`] so that `$-1` and `*-1` stay distinguishable from an
/// empty string or an empty array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+<text>`
    Status(String),
    /// `-<text>`
    Error(String),
    /// `$<len>` followed by `len` bytes, or `$-1` for nil.
    Bulk(Option<Vec<u8>>),
    /// `*<count>` followed by `count` replies, or `*-1` for nil.
    Array(Option<Vec<Reply>>),
}

impl Reply {
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None) | Reply::Array(None))
    }

    /// Short description used in error messages; never includes payload bytes.
    pub fn kind(&self) -> String {
        match self {
            Reply::Status(s) => format!("status '{s}'"),
            Reply::Error(e) => format!("error '{e}'"),
            Reply::Bulk(None) => "nil bulk".to_string(),
            Reply::Bulk(Some(b)) => format!("bulk of {} bytes", b.len()),
            Reply::Array(None) => "nil array".to_string(),
            Reply::Array(Some(items)) => format!("array of {} elements", items.len()),
        }
    }
}

/// Result of one blocking pop round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Popped {
    /// The server-side wait elapsed without a job.
    Timeout,
    /// A job was removed from `key`.
    Job { key: String, payload: String },
}
