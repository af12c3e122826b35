//! Orchestration Service
//!
//! Transport-agnostic entry points for run submission, run status and chat.
//! Runs execute in the background on a blocking thread; their outcome is kept
//! in an in-process run table keyed by run id.
//!
//! Chat degrades through a fixed chain and never fails:
//!
//! 1. Spokes registered: full hub pipeline
//! 2. The hub's synchronous reply hook
//! 3. The chat facade (`reply`, then `converse`)
//! 4. The conversational fallback (lobby)
//! 5. Templated plan/implementation text

use crate::hub::{fallback_plan, no_coder_impl, CaptainHub, Conversation};
use crate::memory::{PersistTarget, SyncMemoryAdapter, ThreadMode};
use crate::registry::SpokeRegistry;
use anyhow::{anyhow, bail, Result};
use sdk::types::{OrchestrationRun, Role, Ticket, TicketResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Run submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRequest {
    pub goal: String,
    #[serde(default)]
    pub deliverables: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Use the nested hub for this run
    #[serde(default)]
    pub nested: bool,
}

/// Last known outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub goal: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<TicketResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 completion time
    pub finished_at: String,
}

impl RunRecord {
    fn finished(run_id: String, goal: String, outcome: Result<TicketResult>) -> Self {
        let (success, artifacts, error) = match outcome {
            Ok(result) => (true, Some(result), None),
            Err(e) => (false, None, Some(format!("{:#}", e))),
        };
        Self {
            run_id,
            goal,
            success,
            artifacts,
            error,
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Chat input; `text` wins over `prompt` when both are present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ChatRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            prompt: None,
        }
    }

    fn goal(&self) -> String {
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.prompt.as_deref())
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// Chat output; `steps` are `(role, content)` pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub steps: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workcell_space_id: Option<String>,
}

impl ChatResponse {
    fn reply_only(reply: String) -> Self {
        Self {
            reply,
            ..Self::default()
        }
    }
}

/// Runtime wiring snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub has_hub: bool,
    pub nested: bool,
    pub user_id: String,
    pub thread_mode: Option<ThreadMode>,
    pub persist: BTreeMap<String, PersistTarget>,
    pub live_spaces: usize,
    pub spokes: BTreeMap<String, usize>,
    pub runs: usize,
    /// Runs started but not yet recorded
    pub pending: usize,
}

/// Entry point for run submission, status and chat
pub struct OrchestrationService {
    hub: Option<Arc<CaptainHub>>,
    nested_hub: Option<Arc<CaptainHub>>,
    nested_default: bool,
    registry: Arc<SpokeRegistry>,
    adapter: Option<Arc<SyncMemoryAdapter>>,
    facade: Option<Arc<dyn Conversation>>,
    lobby: Option<Arc<dyn Conversation>>,
    user_id: String,
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
    /// Runs still executing; each task removes itself once its record is in
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl OrchestrationService {
    pub fn new(registry: Arc<SpokeRegistry>) -> Self {
        Self {
            hub: None,
            nested_hub: None,
            nested_default: false,
            registry,
            adapter: None,
            facade: None,
            lobby: None,
            user_id: "local_user".to_string(),
            runs: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_hub(mut self, hub: Arc<CaptainHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Hub used for `nested` runs
    pub fn with_nested_hub(mut self, hub: Arc<CaptainHub>) -> Self {
        self.nested_hub = Some(hub);
        self
    }

    /// Route every run to the nested hub
    pub fn nested_by_default(mut self, nested: bool) -> Self {
        self.nested_default = nested;
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<SyncMemoryAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn with_facade(mut self, facade: Arc<dyn Conversation>) -> Self {
        self.facade = Some(facade);
        self
    }

    pub fn with_lobby(mut self, lobby: Arc<dyn Conversation>) -> Self {
        self.lobby = Some(lobby);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn registry(&self) -> &Arc<SpokeRegistry> {
        &self.registry
    }

    fn select_hub(&self, nested: bool) -> Option<Arc<CaptainHub>> {
        let hub = if nested || self.nested_default {
            self.nested_hub.as_ref().or(self.hub.as_ref())
        } else {
            self.hub.as_ref()
        };
        hub.map(Arc::clone)
    }

    /// Submit a run and return its id (`run_<hex>`)
    ///
    /// The ticket runs in the background. Its outcome becomes visible through
    /// [`status`](Self::status) once it finishes.
    pub async fn start(&self, request: StartRequest) -> Result<String> {
        let goal = request.goal.trim().to_string();
        if goal.is_empty() {
            bail!("goal must not be empty");
        }
        let hub = self
            .select_hub(request.nested)
            .ok_or_else(|| anyhow!("orchestration hub is not available"))?;

        let run_id = format!("run_{}", uuid::Uuid::new_v4().simple());
        let run = OrchestrationRun::new(run_id.clone());
        let ticket = Ticket::new(uuid::Uuid::new_v4().to_string(), goal.clone())
            .with_deliverables(request.deliverables)
            .with_constraints(request.constraints);
        info!(
            "Starting {} for ticket {} (nested={})",
            run_id,
            ticket.ticket_id,
            hub.is_nested()
        );

        let runs = Arc::clone(&self.runs);
        let pending = Arc::clone(&self.pending);
        let task_run_id = run_id.clone();

        // Held across the spawn so the task's own removal runs after the insert
        let mut in_flight = self.pending.lock().await;
        let handle = tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || hub.run_ticket(&run, &ticket))
                .await
                .unwrap_or_else(|e| Err(anyhow!("run task aborted: {}", e)));

            if let Err(e) = &outcome {
                warn!("Run {} failed: {:#}", task_run_id, e);
            }
            let record = RunRecord::finished(task_run_id.clone(), goal, outcome);
            runs.write().await.insert(task_run_id.clone(), record);
            pending.lock().await.remove(&task_run_id);
        });
        in_flight.insert(run_id.clone(), handle);
        drop(in_flight);

        Ok(run_id)
    }

    /// Last known record of a run; `None` means unknown or still running
    pub async fn status(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.read().await.get(run_id).cloned()
    }

    /// Number of started runs that have not recorded an outcome yet
    pub async fn pending_runs(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Wait for a started run to finish and return its record
    pub async fn wait(&self, run_id: &str) -> Option<RunRecord> {
        let handle = self.pending.lock().await.remove(run_id);
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Run {} task ended abnormally: {}", run_id, e);
            }
        }
        self.status(run_id).await
    }

    /// One-shot chat; degrades through the fallback chain and never fails
    pub async fn chat(&self, request: ChatRequest) -> ChatResponse {
        let goal = request.goal();
        if goal.is_empty() {
            return ChatResponse::default();
        }

        if let Some(hub) = &self.hub {
            if self.registry.has_any_spokes() {
                match self.chat_pipeline(Arc::clone(hub), &goal).await {
                    Ok(response) => return response,
                    Err(e) => warn!("Chat pipeline failed, falling back: {:#}", e),
                }
            }

            let hook_hub = Arc::clone(hub);
            let hook_goal = goal.clone();
            match tokio::task::spawn_blocking(move || hook_hub.try_chat_reply(&hook_goal)).await {
                Ok(Some(reply)) => return ChatResponse::reply_only(reply),
                Ok(None) => {}
                Err(e) => warn!("Chat hook task failed: {}", e),
            }
        }

        if let Some(facade) = &self.facade {
            match facade.reply(&goal).await {
                Ok(Some(reply)) if !reply.is_empty() => return ChatResponse::reply_only(reply),
                Ok(_) => {}
                Err(e) => debug!("Chat facade reply failed: {:#}", e),
            }
            match facade.converse(&goal).await {
                Ok(out) if !out.reply.is_empty() => {
                    return ChatResponse {
                        reply: out.reply,
                        steps: out.steps,
                        workcell_space_id: None,
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("Chat facade converse failed: {:#}", e),
            }
        }

        if let Some(lobby) = &self.lobby {
            match lobby.converse(&goal).await {
                Ok(out) => {
                    return ChatResponse {
                        reply: out.reply,
                        steps: out.steps,
                        workcell_space_id: None,
                    }
                }
                Err(e) => debug!("Lobby converse failed: {:#}", e),
            }
        }

        let plan = fallback_plan(&goal);
        let implementation = no_coder_impl(&plan);
        ChatResponse {
            reply: implementation.clone(),
            steps: vec![
                (Role::Planner.to_string(), plan),
                (Role::Coder.to_string(), implementation),
            ],
            workcell_space_id: None,
        }
    }

    async fn chat_pipeline(&self, hub: Arc<CaptainHub>, goal: &str) -> Result<ChatResponse> {
        let run = OrchestrationRun::new(uuid::Uuid::new_v4().to_string());
        let ticket = Ticket::new(uuid::Uuid::new_v4().to_string(), goal);
        let result = tokio::task::spawn_blocking(move || hub.run_ticket(&run, &ticket)).await??;

        let steps = [
            (Role::Planner, &result.plan),
            (Role::Coder, &result.implementation),
            (Role::Critic, &result.review),
        ]
        .into_iter()
        .filter(|(_, content)| !content.is_empty())
        .map(|(role, content)| (role.to_string(), content.clone()))
        .collect();

        Ok(ChatResponse {
            reply: result.implementation.clone(),
            steps,
            workcell_space_id: Some(result.workcell_space_id),
        })
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let (thread_mode, persist, live_spaces) = match &self.adapter {
            Some(adapter) => (
                Some(adapter.thread_mode()),
                adapter.targets(),
                adapter.live_spaces(),
            ),
            None => (None, BTreeMap::new(), 0),
        };

        Diagnostics {
            has_hub: self.hub.is_some(),
            nested: self.nested_default,
            user_id: self.user_id.clone(),
            thread_mode,
            persist,
            live_spaces,
            spokes: self
                .registry
                .counts()
                .into_iter()
                .map(|(role, count)| (role.to_string(), count))
                .collect(),
            runs: self.runs.read().await.len(),
            pending: self.pending.lock().await.len(),
        }
    }
}
