use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fixed enumeration of the routable agents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Skincare,
    Recommend,
    AfterService,
    CustomerService,
    /// Routing bootstrap state before any agent has been selected.
    IntentClassifier,
    #[default]
    Unknown,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Skincare => "skincare",
            AgentKind::Recommend => "recommend",
            AgentKind::AfterService => "after_service",
            AgentKind::CustomerService => "customer_service",
            AgentKind::IntentClassifier => "intent_classifier",
            AgentKind::Unknown => "unknown",
        }
    }

    /// Heading used when several agent answers are presented side by side.
    pub fn title(&self) -> &'static str {
        match self {
            AgentKind::Skincare => "Skincare",
            AgentKind::Recommend => "Product Recommendations",
            AgentKind::AfterService => "After-Sales Service",
            AgentKind::CustomerService => "Customer Service",
            AgentKind::IntentClassifier => "Routing",
            AgentKind::Unknown => "General",
        }
    }

    pub fn parse(name: &str) -> Option<AgentKind> {
        match name {
            "skincare" => Some(AgentKind::Skincare),
            "recommend" => Some(AgentKind::Recommend),
            "after_service" => Some(AgentKind::AfterService),
            "customer_service" => Some(AgentKind::CustomerService),
            "intent_classifier" => Some(AgentKind::IntentClassifier),
            "unknown" => Some(AgentKind::Unknown),
            _ => None,
        }
    }

    /// Agents a turn may actually be dispatched to.
    pub fn dispatchable() -> [AgentKind; 4] {
        [
            AgentKind::Skincare,
            AgentKind::Recommend,
            AgentKind::AfterService,
            AgentKind::CustomerService,
        ]
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Skincare,
    Recommend,
    AfterService,
    CustomerService,
    #[default]
    Unknown,
}

impl Intent {
    pub fn agent(&self) -> AgentKind {
        match self {
            Intent::Skincare => AgentKind::Skincare,
            Intent::Recommend => AgentKind::Recommend,
            Intent::AfterService => AgentKind::AfterService,
            Intent::CustomerService => AgentKind::CustomerService,
            Intent::Unknown => AgentKind::Unknown,
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::Skincare => "skincare",
            Intent::Recommend => "recommend",
            Intent::AfterService => "after_service",
            Intent::CustomerService => "customer_service",
            Intent::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classified user intent for the current turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct IntentDecision {
    pub intent: Intent,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub is_multi_intent: bool,
}

/// Agent chosen to own the current turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AgentDecision {
    pub selected_agent: AgentKind,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub alternatives: Vec<AgentKind>,
    #[serde(default)]
    pub requires_handoff: bool,
}

/// Whether the conversation should transfer to a different agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HandoffDecision {
    pub should_handoff: bool,
    #[serde(default)]
    pub from_agent: Option<AgentKind>,
    #[serde(default)]
    pub to_agent: Option<AgentKind>,
    #[serde(default)]
    pub reason: String,
    pub confidence: f64,
    /// Confirmation question to show the user before transferring.
    #[serde(default)]
    pub user_message: Option<String>,
}

/// Hand-off proposed to the user and awaiting their confirmation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PendingHandoff {
    pub from_agent: AgentKind,
    pub to_agent: AgentKind,
    pub reason: String,
    pub confirmation_question: String,
    pub detected_intent: Intent,
    pub user_input: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClarificationQuestion {
    pub question: String,
    #[serde(default)]
    pub slot_name: Option<String>,
    #[serde(default)]
    pub suggested_answers: Vec<String>,
}

/// Whether enough information has been collected to act.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CompletenessDecision {
    pub is_complete: bool,
    pub confidence: f64,
    #[serde(default)]
    pub missing_info: Vec<String>,
    #[serde(default)]
    pub clarification_questions: Vec<ClarificationQuestion>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub can_proceed_anyway: bool,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    #[default]
    CollectInfo,
    Process,
    Handoff,
    Finalize,
    Escalate,
    Clarify,
    End,
}

/// What the owning agent should do next.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NextStepDecision {
    pub next_action: NextAction,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suggested_response: Option<String>,
}

/// Minimal agent set needed for a multi-domain turn.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SupervisorPlan {
    pub agents: Vec<AgentKind>,
    pub parallel: bool,
    #[serde(default)]
    pub is_complex: bool,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    #[default]
    Integrated,
    SideBySide,
    Sequential,
}

/// Coverage check over the union of agent outputs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SupervisorValidation {
    pub is_sufficient: bool,
    #[serde(default)]
    pub retry_agents: Vec<AgentKind>,
    #[serde(default)]
    pub missing_aspects: Vec<String>,
    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

impl Default for SupervisorValidation {
    fn default() -> Self {
        Self {
            is_sufficient: true,
            retry_agents: Vec::new(),
            missing_aspects: Vec::new(),
            merge_strategy: MergeStrategy::Integrated,
        }
    }
}
