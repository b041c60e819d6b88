use orchid_core::{AgentKind, ConversationState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Escalated,
}

/// Bounds hand-off cycles within a session. Exceeding the threshold is not
/// an error: it is a designed transition to customer service that bypasses
/// user confirmation.
#[derive(Clone, Copy, Debug)]
pub struct LoopGuard {
    threshold: u32,
}

pub const ESCALATION_MESSAGE_KO: &str = "상담이 여러 번 전환되어 상담원 연결이 필요한 상황으로 보입니다. 고객센터 상담사가 이어서 도와드릴게요.";
pub const ESCALATION_MESSAGE_EN: &str = "This conversation has been transferred several times, so I'm connecting you to customer service to make sure you get help.";

impl LoopGuard {
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Record a decided hand-off to `to`. When the session's hand-off count
    /// exceeds the threshold, the proposal is discarded, the chain resets,
    /// and the conversation is force-routed to customer service.
    pub fn apply(&self, state: &mut ConversationState, to: AgentKind) -> GuardOutcome {
        state.record_handoff(to);
        if state.handoff_count <= self.threshold {
            return GuardOutcome::Proceed;
        }

        tracing::warn!(
            session = %state.session_id,
            count = state.handoff_count,
            threshold = self.threshold,
            "hand-off loop threshold exceeded, escalating to customer service"
        );
        state.reset_handoff_chain();
        state.clear_pending_handoff();
        state.is_escalated = true;
        state.needs_user_input = false;
        state.set_agent(AgentKind::CustomerService);
        state.response_text = if state.language == "en" {
            ESCALATION_MESSAGE_EN.to_string()
        } else {
            ESCALATION_MESSAGE_KO.to_string()
        };
        GuardOutcome::Escalated
    }
}
