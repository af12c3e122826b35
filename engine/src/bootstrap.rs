//! Runtime bootstrap
//!
//! Builds the process-scoped dependency graph from a [`Config`]:
//! thread memory, sync memory adapter, spoke registry, hubs, chat facade and
//! the reply hook bridging the facade into the hub, then the service on top.
//! Nothing here is global; the caller owns the returned [`Runtime`].

use crate::config::{Config, SpokeConfig};
use crate::hub::chat::sync_reply_hook;
use crate::hub::{CaptainHub, Conversation, HubChatFacade, HubPolicy, SubHubCaptain};
use crate::llm::{ChatModel, LlmRunner, OpenAIChat};
use crate::memory::{LocalThreadMemory, SyncMemoryAdapter, ThreadMemory};
use crate::registry::{Router, Spoke, SpokeRegistry};
use crate::service::OrchestrationService;
use anyhow::{Context, Result};
use sdk::memory::Memory;
use sdk::types::{Role, SpaceKind};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// Wired runtime components
pub struct Runtime {
    pub config: Config,
    pub thread: Arc<LocalThreadMemory>,
    pub adapter: Arc<SyncMemoryAdapter>,
    pub registry: Arc<SpokeRegistry>,
    pub hub: Arc<CaptainHub>,
    pub nested_hub: Arc<CaptainHub>,
    pub facade: Arc<HubChatFacade>,
    pub service: Arc<OrchestrationService>,
}

/// Conversational thread id for a user
pub fn thread_id_for(user_id: &str) -> String {
    format!("thread_{}", user_id)
}

impl Runtime {
    /// Build with the OpenAI-compatible model when `OPENAI_API_KEY` is set
    pub fn build(config: Config, handle: Handle) -> Result<Self> {
        let model = OpenAIChat::from_env(config.llm.clone())
            .map(|m| Arc::new(m) as Arc<dyn ChatModel>);
        if model.is_none() {
            warn!("OPENAI_API_KEY not set; LLM spokes disabled, chat uses the fallback reply");
        }
        Self::with_model(config, model, handle)
    }

    /// Build with an explicit chat model (or none)
    pub fn with_model(
        config: Config,
        model: Option<Arc<dyn ChatModel>>,
        handle: Handle,
    ) -> Result<Self> {
        let user_id = config.orchestrator.user_id.clone();
        let thread_id = thread_id_for(&user_id);

        let thread = Arc::new(LocalThreadMemory::with_limit(
            user_id.clone(),
            thread_id.clone(),
            config.memory.context_limit,
        ));
        let adapter = Arc::new(
            SyncMemoryAdapter::new(config.persist.thread_mode, Some(config.persist.targets()))
                .with_thread(Arc::clone(&thread) as Arc<dyn ThreadMemory>, handle.clone()),
        );

        let policy = HubPolicy {
            persist_workcell: adapter.target_for(SpaceKind::Workcell),
            cascade_gc: config.cascade_gc(),
        };

        let registry = Arc::new(SpokeRegistry::new());
        for spoke in &config.spokes {
            if let Some(spoke) = build_spoke(spoke, &registry, model.as_ref(), policy, &handle) {
                registry.register(spoke);
            }
        }

        let facade = Arc::new(
            HubChatFacade::new(
                Arc::clone(&thread) as Arc<dyn ThreadMemory>,
                model,
                user_id.clone(),
                thread_id.clone(),
            )
                .with_recent_limit(config.memory.recent_limit),
        );
        let hook = sync_reply_hook(Arc::clone(&facade) as Arc<dyn Conversation>, handle);

        let hub = Arc::new(
            CaptainHub::builder()
                .router(Arc::clone(&registry) as Arc<dyn Router>)
                .memory(Arc::clone(&adapter) as Arc<dyn Memory>)
                .policy(policy)
                .chat_hook(Arc::clone(&hook))
                .build()
                .context("failed to build hub")?,
        );
        let nested_hub = Arc::new(
            CaptainHub::builder()
                .router(Arc::clone(&registry) as Arc<dyn Router>)
                .memory(Arc::clone(&adapter) as Arc<dyn Memory>)
                .policy(policy)
                .nested(true)
                .chat_hook(hook)
                .build()
                .context("failed to build nested hub")?,
        );

        let service = Arc::new(
            OrchestrationService::new(Arc::clone(&registry))
                .with_hub(Arc::clone(&hub))
                .with_nested_hub(Arc::clone(&nested_hub))
                .nested_by_default(config.orchestrator.nested)
                .with_adapter(Arc::clone(&adapter))
                .with_facade(Arc::clone(&facade) as Arc<dyn Conversation>)
                .with_user_id(user_id.clone()),
        );

        info!(
            "Captain runtime ready (user_id={}, thread_id={}, thread_mode={}, spokes={}, nested={})",
            user_id,
            thread_id,
            config.persist.thread_mode,
            registry.all().len(),
            config.orchestrator.nested
        );

        Ok(Self {
            config,
            thread,
            adapter,
            registry,
            hub,
            nested_hub,
            facade,
            service,
        })
    }
}

fn build_spoke(
    spoke: &SpokeConfig,
    registry: &Arc<SpokeRegistry>,
    model: Option<&Arc<dyn ChatModel>>,
    policy: HubPolicy,
    handle: &Handle,
) -> Option<Spoke> {
    let name = spoke
        .name
        .clone()
        .unwrap_or_else(|| spoke.role.to_string());

    if spoke.role == Role::BuilderCaptain {
        let captain = SubHubCaptain::new(Arc::clone(registry) as Arc<dyn Router>, policy);
        return Some(
            Spoke::nested(name, spoke.score, Arc::new(captain)).exclusive(spoke.exclusive),
        );
    }

    let Some(model) = model else {
        warn!("Skipping {} spoke '{}': no chat model available", spoke.role, name);
        return None;
    };
    let runner = LlmRunner::new(spoke.role, Arc::clone(model), handle.clone())
        .with_model_name(spoke.model.clone())
        .with_system_prompt(spoke.system_prompt.clone());

    Some(
        Spoke::standard(name, spoke.role, spoke.score, Arc::new(runner))
            .exclusive(spoke.exclusive),
    )
}
