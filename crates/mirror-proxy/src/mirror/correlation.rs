//! Request id generation for log and span correlation.

use uuid::Uuid;

/// Generate a new request id (UUID v4).
///
/// The id only ties together the events and spans of one inbound request;
/// it is never added to the requests sent to destinations.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}
