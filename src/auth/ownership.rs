//! The one piece of domain logic in the service: only the user who created
//! an event may change or delete it. Reads are open to everyone.

/// Decides whether `caller` may mutate a record owned by `owner`.
/// `None` means the request carried no valid credentials.
pub fn can_modify(caller: Option<i64>, owner: i64) -> bool {
    matches!(caller, Some(id) if id == owner)
}
