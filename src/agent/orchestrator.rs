//! Task orchestrator - main coordinator
//!
//! Runs one task at a time through the pipeline:
//! memory lookup → model selection → model call → plugin dispatch →
//! memory write. Any step error fails the whole task.

use crate::agent::context::{TaskContext, TaskRequest};
use crate::agent::state::TaskEvent;
use crate::config::{ApiKeys, Config};
use crate::errors::Result;
use crate::memory::{MemoryEngine, MemoryStats, Metadata};
use crate::models::ModelRouter;
use crate::tools::dispatch::has_plugin_indicators;
use crate::tools::{PluginExecutor, PluginTable};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use tracing::{error, info};

/// Orchestrator knobs, taken from [`Config`]
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Used when a request names no model
    pub default_model: String,
    /// Global plugin switch (`plugins.enabled`)
    pub plugins_enabled: bool,
    /// Memories pulled into the prompt
    pub context_memories: usize,
    /// Completed-task history bound
    pub max_completed_tasks: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_model: "auto".to_string(),
            plugins_enabled: true,
            context_memories: 5,
            max_completed_tasks: 1000,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_model: config.llm.default_model.clone(),
            plugins_enabled: config.plugins.enabled,
            context_memories: config.orchestrator.context_memories,
            max_completed_tasks: config.orchestrator.max_completed_tasks,
        }
    }
}

/// Main task orchestrator
pub struct TaskOrchestrator {
    memory: MemoryEngine,
    router: ModelRouter,
    plugins: PluginExecutor,
    settings: OrchestratorSettings,
    active_tasks: HashMap<String, TaskContext>,
    completed_tasks: VecDeque<TaskContext>,
}

impl TaskOrchestrator {
    /// Build every component from configuration
    pub async fn new(config: &Config, keys: &ApiKeys, table: PluginTable) -> Result<Self> {
        let memory = MemoryEngine::from_config(config).await?;
        let router = ModelRouter::from_config(&config.llm, keys);
        let plugins = PluginExecutor::from_config(config, table)?;

        info!("Task orchestrator initialized");
        Ok(Self::from_parts(
            memory,
            router,
            plugins,
            OrchestratorSettings::from_config(config),
        ))
    }

    /// Assemble from prebuilt components
    pub fn from_parts(
        memory: MemoryEngine,
        router: ModelRouter,
        plugins: PluginExecutor,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            memory,
            router,
            plugins,
            settings,
            active_tasks: HashMap::new(),
            completed_tasks: VecDeque::new(),
        }
    }

    /// Run one task to completion or failure
    pub async fn execute_task(&mut self, request: TaskRequest) -> Result<String> {
        let mut ctx = TaskContext::new(&request, &self.settings.default_model);
        let task_id = ctx.task_id.clone();
        self.active_tasks.insert(task_id.clone(), ctx.clone());
        info!(task_id = %task_id, "Starting task: {}", ctx.prompt_preview());

        let outcome = self.run_pipeline(&mut ctx).await;
        match &outcome {
            Ok(_) => info!(task_id = %task_id, "Task completed successfully"),
            Err(e) => {
                error!(task_id = %task_id, "Task failed: {}", e);
                ctx.fail(e);
            }
        }

        self.active_tasks.remove(&task_id);
        self.record_completed(ctx);
        outcome
    }

    async fn run_pipeline(&self, ctx: &mut TaskContext) -> Result<String> {
        let mut relevant_context = String::new();
        if ctx.use_memory {
            ctx.advance(TaskEvent::LookupMemory)?;
            let memories = self
                .memory
                .search(&ctx.prompt, self.settings.context_memories)
                .await;
            if !memories.is_empty() {
                relevant_context = render_memories(&memories);
                if ctx.verbose {
                    info!(task_id = %ctx.task_id, "Retrieved {} relevant memories", memories.len());
                }
            }
        }

        ctx.advance(TaskEvent::SelectModel)?;
        let selected_model = self.router.select_model(&ctx.model, &ctx.prompt)?;
        if ctx.verbose {
            info!(task_id = %ctx.task_id, "Selected model: {}", selected_model);
        }

        let plugins_active = ctx.enable_plugins && self.settings.plugins_enabled;
        let enhanced_prompt = self.build_enhanced_prompt(&ctx.prompt, &relevant_context, plugins_active);

        ctx.advance(TaskEvent::CallModel)?;
        let mut response = self.router.execute(&selected_model, &enhanced_prompt).await?;

        if plugins_active && has_plugin_indicators(&response) {
            ctx.advance(TaskEvent::DispatchPlugins)?;
            if let Some(plugin_result) = self.plugins.execute_from_response(&response).await {
                response = format!("{}\n\nPlugin Execution Result:\n{}", response, plugin_result);
            }
        }

        if ctx.use_memory {
            ctx.advance(TaskEvent::WriteMemory)?;
            let mut extra = Metadata::new();
            extra.insert("task_id".into(), json!(ctx.task_id));
            extra.insert("model_used".into(), json!(selected_model));
            self.memory
                .store_interaction(&ctx.prompt, &response, extra)
                .await;
            if ctx.verbose {
                info!(task_id = %ctx.task_id, "Stored interaction in memory");
            }
        }

        ctx.complete(&response, &selected_model)?;
        Ok(response)
    }

    /// Prefix memory context and append the enabled tool list
    pub fn build_enhanced_prompt(&self, prompt: &str, context: &str, plugins_active: bool) -> String {
        let mut enhanced = if context.is_empty() {
            prompt.to_string()
        } else {
            format!("Relevant context:\n{}\n\nTask: {}", context, prompt)
        };

        if plugins_active {
            let available = self.plugins.list_available_plugins();
            if !available.is_empty() {
                enhanced.push_str(&format!("\n\nAvailable tools: {}", available.join(", ")));
            }
        }
        enhanced
    }

    fn record_completed(&mut self, ctx: TaskContext) {
        if self.settings.max_completed_tasks == 0 {
            return;
        }
        while self.completed_tasks.len() >= self.settings.max_completed_tasks {
            self.completed_tasks.pop_front();
        }
        self.completed_tasks.push_back(ctx);
    }

    pub fn active_tasks(&self) -> &HashMap<String, TaskContext> {
        &self.active_tasks
    }

    /// Oldest first
    pub fn completed_tasks(&self) -> &VecDeque<TaskContext> {
        &self.completed_tasks
    }

    pub async fn memory_search(&self, query: &str, limit: usize) -> Vec<String> {
        self.memory.search(query, limit).await
    }

    pub async fn list_memories(&self, limit: usize) -> Vec<String> {
        self.memory.list_recent(limit).await
    }

    pub async fn clear_memory(&self) -> bool {
        self.memory.clear().await
    }

    pub async fn memory_stats(&self) -> MemoryStats {
        self.memory.stats().await
    }

    pub async fn export_memory(&self, path: &Path) -> Result<usize> {
        self.memory.export(path).await
    }

    pub async fn import_memory(&self, path: &Path) -> Result<usize> {
        self.memory.import(path).await
    }

    pub fn list_plugins(&self) -> BTreeMap<String, bool> {
        self.plugins.list_plugins()
    }

    pub fn toggle_plugin(&mut self, name: &str, enabled: bool) -> bool {
        self.plugins.toggle_plugin(name, enabled)
    }

    pub fn install_plugin(&mut self, path: &Path) -> bool {
        self.plugins.install_plugin(path)
    }

    pub fn create_sample_plugins(&mut self) -> Result<usize> {
        self.plugins.registry_mut().create_sample_plugins()
    }

    pub fn plugins(&self) -> &PluginExecutor {
        &self.plugins
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Multi-line status report
    pub async fn get_status(&self) -> String {
        [
            format!("Active tasks: {}", self.active_tasks.len()),
            format!("Completed tasks: {}", self.completed_tasks.len()),
            format!("Memory status: {}", self.memory.is_healthy().await),
            format!("LLM router status: {}", self.router.get_status()),
            format!("Plugin executor status: {}", self.plugins.get_status()),
        ]
        .join("\n")
    }
}

/// `Memory 1: ...` lines
fn render_memories(memories: &[String]) -> String {
    memories
        .iter()
        .enumerate()
        .map(|(i, mem)| format!("Memory {}: {}", i + 1, mem))
        .collect::<Vec<_>>()
        .join("\n")
}
