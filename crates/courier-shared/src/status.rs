//! Inline status codes returned in response bodies.
//!
//! Validation and not-found failures travel as a nonzero status inside a
//! normal response; only infrastructure faults surface as RPC errors.

pub const STATUS_OK: i32 = 0;

/// The identity policy rejected the user id.
pub const STATUS_INVALID_USER: i32 = 1;

/// The target group does not exist or has no members.
pub const STATUS_GROUP_NOT_FOUND: i32 = 2;

/// Missing recipient or content.
pub const STATUS_INVALID_REQUEST: i32 = 3;

/// The session has not authenticated yet.
pub const STATUS_UNAUTHENTICATED: i32 = 4;

/// The gate could not complete the routing call. The outcome is unknown;
/// the client may retry.
pub const STATUS_UNAVAILABLE: i32 = 5;

/// Human-readable text for a status code.
pub fn describe(status: i32) -> &'static str {
    match status {
        STATUS_OK => "Success",
        STATUS_INVALID_USER => "user invalid",
        STATUS_GROUP_NOT_FOUND => "group not found",
        STATUS_INVALID_REQUEST => "invalid request",
        STATUS_UNAUTHENTICATED => "not authenticated",
        STATUS_UNAVAILABLE => "service unavailable",
        _ => "unknown status",
    }
}
