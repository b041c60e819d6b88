//! End-to-end turns through the full graph with a scripted LLM and
//! scripted domain adapters.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use orchid_core::{
    AgentAdapter, AgentCachePolicy, AgentKind, ConversationState, LlmCaller, LlmReply, LlmRequest,
    OrchidError, Role, SessionStore,
};
use orchid_router::{ChatService, OrchestratorBuilder, RouterConfig};
use orchid_store::{MemoryCache, MemorySessionStore};

/// Scripted LLM that answers each judgment kind with a canned JSON body.
/// Judgments are recognized by their system prompt, so parallel issue
/// order never matters. Overrides are consumed FIFO per kind.
struct JudgeLlm {
    overrides: Mutex<HashMap<&'static str, VecDeque<String>>>,
    counts: Mutex<HashMap<&'static str, u32>>,
    total: AtomicU32,
}

impl JudgeLlm {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            overrides: Mutex::new(HashMap::new()),
            counts: Mutex::new(HashMap::new()),
            total: AtomicU32::new(0),
        })
    }

    fn push(&self, kind: &'static str, body: impl Into<String>) {
        self.overrides
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(body.into());
    }

    fn count(&self, kind: &str) -> u32 {
        *self.counts.lock().unwrap().get(kind).unwrap_or(&0)
    }

    fn total(&self) -> u32 {
        self.total.load(Ordering::SeqCst)
    }

    fn kind_of(request: &LlmRequest) -> &'static str {
        if request.output_schema.is_none() {
            return "merge";
        }
        let system = &request.system;
        if system.contains("classify") {
            "intent"
        } else if system.contains("single best specialist") {
            "agent"
        } else if system.contains("Interpret their reply") {
            "handoff_reply"
        } else if system.contains("should transfer") {
            "handoff"
        } else if system.contains("enough information") {
            "completeness"
        } else if system.contains("next action") {
            "next_step"
        } else if system.contains("minimal set of agents") {
            "plan"
        } else if system.contains("cover every aspect") {
            "validate"
        } else {
            "other"
        }
    }

    fn default_reply(kind: &str) -> String {
        match kind {
            "intent" => json!({
                "intent": "skincare", "confidence": 0.9, "reason": "",
                "keywords": [], "is_multi_intent": false
            })
            .to_string(),
            "agent" => json!({
                "selected_agent": "skincare", "confidence": 0.9, "reason": "",
                "alternatives": [], "requires_handoff": false
            })
            .to_string(),
            "handoff" => json!({
                "should_handoff": false, "from_agent": null, "to_agent": null,
                "reason": "", "confidence": 0.9, "user_message": null
            })
            .to_string(),
            "completeness" => json!({
                "is_complete": true, "confidence": 0.9, "missing_info": [],
                "clarification_questions": [], "reason": "", "can_proceed_anyway": true
            })
            .to_string(),
            "next_step" => json!({
                "next_action": "process", "confidence": 0.9, "reason": "",
                "suggested_response": null
            })
            .to_string(),
            "plan" => json!({
                "agents": ["skincare"], "parallel": true, "is_complex": false,
                "reasoning": ""
            })
            .to_string(),
            "validate" => json!({
                "is_sufficient": true, "retry_agents": [], "missing_aspects": [],
                "merge_strategy": "integrated"
            })
            .to_string(),
            "handoff_reply" => json!({
                "choice": "unclear", "confidence": 0.5, "reason": ""
            })
            .to_string(),
            "merge" => "통합된 답변입니다".to_string(),
            other => panic!("unrecognized judgment kind: {other}"),
        }
    }
}

#[async_trait]
impl LlmCaller for JudgeLlm {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmReply, OrchidError> {
        let kind = Self::kind_of(&request);
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.counts.lock().unwrap().entry(kind).or_insert(0) += 1;
        let body = self
            .overrides
            .lock()
            .unwrap()
            .get_mut(kind)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Self::default_reply(kind));
        Ok(LlmReply { content: body })
    }
}

/// Adapter answering from a scripted queue; `(text, needs_user_input)`
/// pairs, falling back to a fixed answer when the queue runs dry.
struct ScriptedAdapter {
    kind: AgentKind,
    replies: Mutex<VecDeque<(String, bool)>>,
    fallback: String,
    calls: AtomicU32,
    seen: Mutex<Vec<String>>,
    policy: AgentCachePolicy,
}

impl ScriptedAdapter {
    fn answering(kind: AgentKind, fallback: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
            policy: AgentCachePolicy::disabled(),
        })
    }

    fn cached(kind: AgentKind, fallback: &str, namespace: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
            policy: AgentCachePolicy::enabled(namespace, Duration::from_secs(600)),
        })
    }

    fn push_reply(&self, text: &str, needs_user_input: bool) {
        self.replies
            .lock()
            .unwrap()
            .push_back((text.to_string(), needs_user_input));
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn seen_texts(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentAdapter for ScriptedAdapter {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    async fn process(
        &self,
        mut state: ConversationState,
    ) -> Result<ConversationState, OrchidError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(state.user_text.clone());
        let (text, needs_input) = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| (self.fallback.clone(), false));
        state.response_text = text;
        state.needs_user_input = needs_input;
        state.is_complete = !needs_input;
        Ok(state)
    }

    async fn extract_slots(&self, _text: &str, _context: &Value) -> Result<Value, OrchidError> {
        Ok(Value::Null)
    }

    fn cache_policy(&self) -> AgentCachePolicy {
        self.policy.clone()
    }
}

struct Harness {
    llm: Arc<JudgeLlm>,
    store: Arc<MemorySessionStore>,
    service: ChatService,
}

fn harness(adapters: Vec<Arc<ScriptedAdapter>>, config: RouterConfig) -> Harness {
    let llm = JudgeLlm::new();
    let store = Arc::new(MemorySessionStore::new());
    let mut builder = OrchestratorBuilder::new()
        .llm(llm.clone())
        .store(store.clone())
        .config(config);
    for adapter in adapters {
        builder = builder.adapter(adapter);
    }
    let service = builder.build().unwrap();
    Harness {
        llm,
        store,
        service,
    }
}

fn skincare_and_cs() -> (Arc<ScriptedAdapter>, Arc<ScriptedAdapter>) {
    (
        ScriptedAdapter::answering(AgentKind::Skincare, "수분 크림을 추천드려요"),
        ScriptedAdapter::answering(AgentKind::CustomerService, "주문을 확인해 드렸어요"),
    )
}

fn handoff_yes(to: &str, question: &str) -> String {
    json!({
        "should_handoff": true, "from_agent": null, "to_agent": to,
        "reason": "topic change", "confidence": 0.9, "user_message": question
    })
    .to_string()
}

#[tokio::test]
async fn first_turn_costs_exactly_two_judgments() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs], RouterConfig::default());

    let reply = h
        .service
        .process_message("s-first", "내 피부에 뭐가 좋을까요?")
        .await
        .unwrap();

    assert_eq!(reply.agent, AgentKind::Skincare);
    assert_eq!(reply.decision_calls, 2);
    assert_eq!(h.llm.total(), 2);
    assert_eq!(reply.response, "수분 크림을 추천드려요");

    let state = h.store.load("s-first").await.unwrap().unwrap();
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.history[0].role, Role::User);
    assert_eq!(state.history[1].role, Role::Assistant);
}

#[tokio::test]
async fn waiting_on_user_costs_zero_judgments() {
    let (skincare, cs) = skincare_and_cs();
    skincare.push_reply("나이를 알려주시겠어요?", true);
    skincare.push_reply("20대에는 가벼운 보습이 좋아요", false);
    let h = harness(vec![skincare.clone(), cs], RouterConfig::default());

    let first = h
        .service
        .process_message("s-wait", "루틴을 짜주세요")
        .await
        .unwrap();
    assert!(first.needs_user_input);
    let after_first = h.llm.total();

    let second = h.service.process_message("s-wait", "20대예요").await.unwrap();
    assert_eq!(second.decision_calls, 0);
    assert_eq!(h.llm.total(), after_first);
    assert_eq!(second.agent, AgentKind::Skincare);
    assert_eq!(second.response, "20대에는 가벼운 보습이 좋아요");
    assert_eq!(skincare.calls(), 2);

    // History is append-only across the two turns.
    let state = h.store.load("s-wait").await.unwrap().unwrap();
    let contents: Vec<&str> = state.history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "루틴을 짜주세요",
            "나이를 알려주시겠어요?",
            "20대예요",
            "20대에는 가벼운 보습이 좋아요",
        ]
    );
}

#[tokio::test]
async fn topic_shift_proposes_confirmed_handoff() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs], RouterConfig::default());

    h.service
        .process_message("s-shift", "피부 고민이 있어요")
        .await
        .unwrap();

    h.llm.push(
        "intent",
        json!({
            "intent": "customer_service", "confidence": 0.9, "reason": "",
            "keywords": [], "is_multi_intent": false
        })
        .to_string(),
    );
    h.llm.push(
        "agent",
        json!({
            "selected_agent": "customer_service", "confidence": 0.9, "reason": "",
            "alternatives": [], "requires_handoff": true
        })
        .to_string(),
    );
    h.llm.push(
        "handoff",
        handoff_yes("customer_service", "주문 문의로 연결해 드릴까요?"),
    );

    let proposal = h
        .service
        .process_message("s-shift", "내 주문 어디 있어요?")
        .await
        .unwrap();
    assert_eq!(proposal.decision_calls, 3);
    assert!(proposal.needs_user_input);
    assert_eq!(proposal.response, "주문 문의로 연결해 드릴까요?");
    // Still with the original agent until the user confirms.
    assert_eq!(proposal.agent, AgentKind::Skincare);

    let state = h.store.load("s-shift").await.unwrap().unwrap();
    let pending = state.pending_handoff.unwrap();
    assert_eq!(pending.from_agent, AgentKind::Skincare);
    assert_eq!(pending.to_agent, AgentKind::CustomerService);

    // An obvious confirmation resolves without any judgment call.
    let accepted = h.service.process_message("s-shift", "네 부탁해요").await.unwrap();
    assert_eq!(accepted.decision_calls, 0);
    assert_eq!(accepted.agent, AgentKind::CustomerService);
    assert_eq!(accepted.response, "주문을 확인해 드렸어요");
}

#[tokio::test]
async fn accepted_handoff_delivers_the_original_request() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs.clone()], RouterConfig::default());

    h.service
        .process_message("s-carry", "피부 고민이 있어요")
        .await
        .unwrap();
    h.llm.push(
        "handoff",
        handoff_yes("customer_service", "주문 문의로 연결해 드릴까요?"),
    );
    h.service
        .process_message("s-carry", "내 주문 어디 있어요?")
        .await
        .unwrap();
    h.service.process_message("s-carry", "네").await.unwrap();

    // The target adapter answers the question that triggered the
    // transfer, not the confirmation phrase.
    assert_eq!(cs.seen_texts(), vec!["내 주문 어디 있어요?"]);

    let state = h.store.load("s-carry").await.unwrap().unwrap();
    assert_eq!(state.user_text, "내 주문 어디 있어요?");
    assert_eq!(state.last_user_text.as_deref(), Some("네"));
}

#[tokio::test]
async fn handoff_to_active_agent_is_not_proposed() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs.clone()], RouterConfig::default());

    h.llm.push(
        "intent",
        json!({
            "intent": "customer_service", "confidence": 0.9, "reason": "",
            "keywords": [], "is_multi_intent": false
        })
        .to_string(),
    );
    h.llm.push(
        "agent",
        json!({
            "selected_agent": "customer_service", "confidence": 0.9, "reason": "",
            "alternatives": [], "requires_handoff": false
        })
        .to_string(),
    );
    h.service
        .process_message("s-self", "주문 문의가 있어요")
        .await
        .unwrap();

    // A next-step hand-off signal marks the following turn for the
    // hand-off protocol.
    h.llm.push(
        "next_step",
        json!({
            "next_action": "handoff", "confidence": 0.9, "reason": "",
            "suggested_response": null
        })
        .to_string(),
    );
    h.service
        .process_message("s-self", "더 확인할 게 있어요")
        .await
        .unwrap();

    // The judgment targets the agent that is already active.
    h.llm.push(
        "handoff",
        handoff_yes("customer_service", "고객센터로 연결해 드릴까요?"),
    );
    let reply = h
        .service
        .process_message("s-self", "그 다음은 어떻게 되나요?")
        .await
        .unwrap();

    assert_eq!(reply.decision_calls, 3);
    assert!(!reply.needs_user_input);
    assert_eq!(reply.agent, AgentKind::CustomerService);
    assert_eq!(reply.response, "주문을 확인해 드렸어요");

    let state = h.store.load("s-self").await.unwrap().unwrap();
    assert!(state.pending_handoff.is_none());
    assert_eq!(state.handoff_count, 0);
}

#[tokio::test]
async fn malformed_judgments_degrade_to_the_unknown_handler() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs], RouterConfig::default());

    // The first-turn protocol fails on malformed output, the full-route
    // fallback fails the same way, and the default decision set routes
    // the turn to the unknown handler.
    h.llm.push("intent", "this is not json");
    h.llm.push("intent", "still not json");

    let reply = h
        .service
        .process_message("s-degrade", "피부 고민이 있어요")
        .await
        .unwrap();

    assert_eq!(reply.decision_calls, 4);
    assert_eq!(reply.agent, AgentKind::Unknown);
    assert!(reply.needs_user_input);
    assert!(reply.response.contains("스킨케어"));

    let state = h.store.load("s-degrade").await.unwrap().unwrap();
    assert_eq!(state.intent_decision.unwrap().reason, "decision engine unavailable");
}

#[tokio::test]
async fn rejected_handoff_stays_with_current_agent() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs], RouterConfig::default());

    h.service
        .process_message("s-reject", "피부 고민이 있어요")
        .await
        .unwrap();
    h.llm.push(
        "handoff",
        handoff_yes("customer_service", "주문 문의로 연결해 드릴까요?"),
    );
    h.service
        .process_message("s-reject", "환불 규정이 궁금해요")
        .await
        .unwrap();

    let declined = h
        .service
        .process_message("s-reject", "아니요 괜찮아요")
        .await
        .unwrap();
    assert_eq!(declined.decision_calls, 0);
    assert_eq!(declined.agent, AgentKind::Skincare);

    let state = h.store.load("s-reject").await.unwrap().unwrap();
    assert!(state.pending_handoff.is_none());
    // The declined proposal still counts toward the loop threshold.
    assert_eq!(state.handoff_count, 1);
}

#[tokio::test]
async fn fourth_handoff_escalates_to_customer_service() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs], RouterConfig::default());

    h.service
        .process_message("s-loop", "피부 고민이 있어요")
        .await
        .unwrap();

    // Three confirmed ping-pong transfers, then a fourth proposal.
    let hops = [
        ("주문 확인해 주세요", "customer_service"),
        ("피부 상담 다시 할게요", "skincare"),
        ("환불 받고 싶어요", "customer_service"),
    ];
    for (text, target) in hops {
        h.llm.push("handoff", handoff_yes(target, "연결해 드릴까요?"));
        let proposal = h.service.process_message("s-loop", text).await.unwrap();
        assert!(proposal.needs_user_input, "proposal for {target}");
        let accepted = h.service.process_message("s-loop", "네").await.unwrap();
        assert!(!accepted.is_escalated);
    }

    h.llm
        .push("handoff", handoff_yes("skincare", "연결해 드릴까요?"));
    let escalated = h
        .service
        .process_message("s-loop", "스킨케어 질문이 있어요")
        .await
        .unwrap();

    assert!(escalated.is_escalated);
    assert_eq!(escalated.agent, AgentKind::CustomerService);
    assert!(!escalated.needs_user_input);
    assert!(escalated.response.contains("고객센터") || escalated.response.contains("상담"));

    let state = h.store.load("s-loop").await.unwrap().unwrap();
    assert!(state.pending_handoff.is_none());
    assert!(state.handoff_chain.is_empty());
    assert_eq!(state.handoff_count, 0);
}

#[tokio::test]
async fn multi_intent_turn_fans_out_and_merges() {
    let skincare = ScriptedAdapter::answering(AgentKind::Skincare, "피부 타입별 조언입니다");
    let recommend = ScriptedAdapter::answering(AgentKind::Recommend, "이 제품을 추천해요");
    let h = harness(vec![skincare.clone(), recommend.clone()], RouterConfig::default());

    h.llm.push(
        "intent",
        json!({
            "intent": "skincare", "confidence": 0.9, "reason": "",
            "keywords": [], "is_multi_intent": true
        })
        .to_string(),
    );
    h.llm.push(
        "plan",
        json!({
            "agents": ["recommend", "skincare"], "parallel": true,
            "is_complex": true, "reasoning": "two domains"
        })
        .to_string(),
    );

    let reply = h
        .service
        .process_message("s-multi", "추천도 해주고 피부 상담도 해줘")
        .await
        .unwrap();

    assert_eq!(reply.response, "통합된 답변입니다");
    assert_eq!(skincare.calls(), 1);
    assert_eq!(recommend.calls(), 1);
    assert_eq!(h.llm.count("plan"), 1);
    assert_eq!(h.llm.count("validate"), 1);
    assert_eq!(h.llm.count("merge"), 1);

    let state = h.store.load("s-multi").await.unwrap().unwrap();
    assert_eq!(state.agent_results.len(), 2);
    assert_eq!(
        state.response_metadata.get("merge_strategy").unwrap(),
        &json!("integrated")
    );
}

#[tokio::test]
async fn supervisor_retries_are_bounded_and_merge_runs_once() {
    let skincare = ScriptedAdapter::answering(AgentKind::Skincare, "피부 조언");
    let recommend = ScriptedAdapter::answering(AgentKind::Recommend, "추천 목록");
    let h = harness(
        vec![skincare.clone(), recommend.clone()],
        RouterConfig::default().with_supervisor_max_retries(1),
    );

    h.llm.push(
        "intent",
        json!({
            "intent": "skincare", "confidence": 0.9, "reason": "",
            "keywords": [], "is_multi_intent": true
        })
        .to_string(),
    );
    h.llm.push(
        "plan",
        json!({
            "agents": ["recommend", "skincare"], "parallel": true,
            "is_complex": true, "reasoning": ""
        })
        .to_string(),
    );
    let insufficient = json!({
        "is_sufficient": false, "retry_agents": ["recommend"],
        "missing_aspects": ["price range"], "merge_strategy": "integrated"
    })
    .to_string();
    h.llm.push("validate", insufficient.clone());
    h.llm.push("validate", insufficient);

    let reply = h
        .service
        .process_message("s-retry", "추천이랑 피부 상담 둘 다 해줘")
        .await
        .unwrap();

    // Two validation rounds, then a forced merge with a limitation note.
    assert_eq!(h.llm.count("validate"), 2);
    assert_eq!(h.llm.count("merge"), 1);
    assert_eq!(skincare.calls(), 1);
    assert_eq!(recommend.calls(), 2);
    assert!(reply.response.contains("참고"));
}

#[tokio::test]
async fn unroutable_turn_reorients_the_user() {
    let (skincare, cs) = skincare_and_cs();
    let h = harness(vec![skincare, cs], RouterConfig::default());

    h.llm.push(
        "intent",
        json!({
            "intent": "unknown", "confidence": 0.2, "reason": "",
            "keywords": [], "is_multi_intent": false
        })
        .to_string(),
    );
    h.llm.push(
        "agent",
        json!({
            "selected_agent": "unknown", "confidence": 0.2, "reason": "",
            "alternatives": [], "requires_handoff": false
        })
        .to_string(),
    );

    let reply = h
        .service
        .process_message("s-unknown", "오늘 날씨 어때?")
        .await
        .unwrap();

    assert_eq!(reply.decision_calls, 2);
    assert!(reply.needs_user_input);
    assert!(reply.response.contains("스킨케어"));
}

#[tokio::test]
async fn cached_agent_answer_skips_the_adapter() {
    let skincare = ScriptedAdapter::cached(AgentKind::Skincare, "수분 크림이 좋아요", "skincare");
    let llm = JudgeLlm::new();
    let store = Arc::new(MemorySessionStore::new());
    let service = OrchestratorBuilder::new()
        .llm(llm.clone())
        .store(store.clone())
        .cache(Arc::new(MemoryCache::default()))
        .adapter(skincare.clone())
        .build()
        .unwrap();

    let question = "건성 피부에 뭐가 좋아요?";
    let first = service.process_message("s-a", question).await.unwrap();
    let second = service.process_message("s-b", question).await.unwrap();

    assert_eq!(first.response, second.response);
    assert_eq!(skincare.calls(), 1);

    let state = store.load("s-b").await.unwrap().unwrap();
    assert_eq!(
        state.response_metadata.get("agent_cache_hit").unwrap(),
        &json!(true)
    );
}

#[tokio::test]
async fn failed_turn_recovers_from_checkpoint() {
    let (skincare, cs) = skincare_and_cs();
    // max_steps of one cannot even reach the route node, forcing the
    // service onto the recovery path.
    let h = harness(
        vec![skincare, cs],
        RouterConfig::default().with_max_steps(1),
    );

    let reply = h
        .service
        .process_message("s-recover", "피부 고민이 있어요")
        .await
        .unwrap();

    assert!(reply.needs_user_input);
    assert!(reply.response.contains("다시"));

    let state = h.store.load("s-recover").await.unwrap().unwrap();
    assert_eq!(state.retry_count, 1);
    assert!(state.error_message.is_some());
}

#[tokio::test]
async fn adapter_failure_degrades_to_fallback_answer() {
    struct FailingAdapter;

    #[async_trait]
    impl AgentAdapter for FailingAdapter {
        fn kind(&self) -> AgentKind {
            AgentKind::Skincare
        }

        async fn process(
            &self,
            _state: ConversationState,
        ) -> Result<ConversationState, OrchidError> {
            Err(OrchidError::AdapterFailure {
                agent: AgentKind::Skincare,
                reason: "backend down".into(),
            })
        }

        async fn extract_slots(&self, _text: &str, _context: &Value) -> Result<Value, OrchidError> {
            Ok(Value::Null)
        }
    }

    let llm = JudgeLlm::new();
    let store = Arc::new(MemorySessionStore::new());
    let service = OrchestratorBuilder::new()
        .llm(llm)
        .store(store.clone())
        .adapter(Arc::new(FailingAdapter))
        .build()
        .unwrap();

    let reply = service
        .process_message("s-fail", "피부 고민이 있어요")
        .await
        .unwrap();

    assert!(!reply.response.is_empty());
    let state = store.load("s-fail").await.unwrap().unwrap();
    assert!(state.error_message.as_deref().unwrap().contains("backend down"));
    assert_eq!(
        state.response_metadata.get("adapter_error").unwrap(),
        &json!(true)
    );
}
