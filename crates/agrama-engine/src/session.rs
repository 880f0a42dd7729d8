/// A named actor invoking primitives.
/// Purely bookkeeping: neither field gates or serializes execution, but
/// both are stamped into every emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub kind: ParticipantKind,
}

impl Identity {
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            session_id: None,
            kind: ParticipantKind::Agent,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantKind {
    Agent,
    HumanAdapter,
}
