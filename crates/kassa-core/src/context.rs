use uuid::Uuid;

/// Request-scoped identifiers and credentials, propagated through domain
/// calls, outbound peer calls and published events.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Identifies one inbound HTTP request.
    pub request_id: Uuid,
    /// Spans a whole business interaction across services and events.
    pub correlation_id: Uuid,
    /// Raw bearer token of the inbound request, forwarded unchanged on
    /// outbound peer calls. Absent on event-driven work.
    pub bearer: Option<String>,
}

impl RequestContext {
    /// Fresh context with generated ids. Used by tests and internal work
    /// that does not originate from an HTTP request.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            bearer: None,
        }
    }

    /// Context for work triggered by a consumed event: a fresh request id
    /// under the event's correlation id.
    pub fn from_event(correlation_id: Uuid) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            correlation_id,
            bearer: None,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
