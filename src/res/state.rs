/// Where a resource stands from the client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceState {
    /// The payload is in place.
    Ok,
    /// The load has not been finalized yet.
    NotReady,
    /// The load failed, the link went stale, or the id names nothing.
    Err,
}
