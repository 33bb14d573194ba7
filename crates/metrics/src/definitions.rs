//! Metric name and label definitions.

/// Virtual content scheme metrics
pub mod content {
    /// Total content requests served or rejected
    pub const REQUESTS_TOTAL: &str = "toolbay_content_requests_total";
    /// Requests answered with NotFound (unknown tool, missing file, traversal)
    pub const NOT_FOUND_TOTAL: &str = "toolbay_content_not_found_total";
    /// Requests that failed with an I/O error
    pub const FAILED_TOTAL: &str = "toolbay_content_failed_total";
}

/// Surface lifecycle metrics
pub mod surfaces {
    /// Total surfaces created
    pub const LAUNCHES_TOTAL: &str = "toolbay_surface_launches_total";
    /// Total surfaces destroyed
    pub const CLOSES_TOTAL: &str = "toolbay_surface_closes_total";
    /// Surfaces currently resident (active or hidden)
    pub const RESIDENT: &str = "toolbay_surfaces_resident";
}

/// Geometry synchronization metrics
pub mod geometry {
    /// Bounds round trips issued
    pub const REQUESTS_TOTAL: &str = "toolbay_geometry_requests_total";
    /// Round trips that fell back to the full content rectangle
    pub const FALLBACKS_TOTAL: &str = "toolbay_geometry_fallbacks_total";
}

/// Filesystem capability metrics
pub mod access {
    /// Paths granted through a user selection
    pub const GRANTS_TOTAL: &str = "toolbay_access_grants_total";
    /// File operations rejected for lack of a grant
    pub const DENIED_TOTAL: &str = "toolbay_access_denied_total";
}

/// Host bridge metrics
pub mod bridge {
    /// Bridge calls handled, by operation and status
    pub const CALLS_TOTAL: &str = "toolbay_bridge_calls_total";
    /// Time to answer a bridge call
    pub const CALL_DURATION_SECONDS: &str = "toolbay_bridge_call_duration_seconds";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
    pub const OPERATION: &str = "operation";
    pub const STATUS: &str = "status";
}
