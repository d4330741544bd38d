mod common;

use std::sync::{Arc, Mutex};

use agent_core::{
    AgentError, GeneratorConfig, NoopObserver, PlanExecutor, PlanExecutorConfig, PlanObserver,
    Reasoner, ResponseFormat, Role, ToolRegistry,
};

use common::{ScriptedProvider, action};

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PlanObserver for EventLog {
    fn plan_ready(&self, plan: &[String]) {
        self.push(format!("plan:{}", plan.join("|")));
    }

    fn agent_step(&self, number: usize, _thought: &str, tool_name: &str, _args: &str) {
        self.push(format!("agent:{number}:{tool_name}"));
    }

    fn step_result(&self, number: usize, task: &str, result: &str) {
        self.push(format!("step:{number}:{task}:{result}"));
    }

    fn final_result(&self, transcript: &str) {
        self.push(format!("final:{transcript}"));
    }

    fn error(&self, message: &str) {
        self.push(format!("error:{message}"));
    }
}

fn executor_config(dir: &tempfile::TempDir) -> PlanExecutorConfig {
    PlanExecutorConfig {
        persona: "You are the plan runner.".into(),
        generator: GeneratorConfig {
            tools_dir: dir.path().join("tools"),
            ..Default::default()
        },
        reload_generated_tools: true,
    }
}

#[tokio::test]
async fn test_generate_plan() {
    let provider = ScriptedProvider::new([r#"{"plan":["step1","step2"]}"#]);
    let tools = Arc::new(ToolRegistry::with_builtins());
    let reasoner = Reasoner::new(provider.clone(), tools.clone());

    let plan = reasoner.generate_plan("do two things").await;

    assert_eq!(plan, Some(vec!["step1".to_string(), "step2".to_string()]));
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.format(0), Some(ResponseFormat::Json));

    let messages = provider.query(0);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.contains(&tools.get_tool_descriptions()));
    assert!(messages[1].content.contains("do two things"));
}

#[tokio::test]
async fn test_generate_plan_absent_on_garbage() {
    let provider = ScriptedProvider::new(["not json"]);
    let reasoner = Reasoner::new(provider.clone(), Arc::new(ToolRegistry::with_builtins()));

    assert_eq!(reasoner.generate_plan("anything").await, None);
    // no retry inside the reasoner
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_plan_and_execute() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new([
        r#"{"plan":["add 2 and 2","double 4"]}"#.to_string(),
        action("calculator", "2+2"),
        action("finish", "4"),
        action("finish", "8"),
    ]);
    let log = Arc::new(EventLog::default());
    let executor = PlanExecutor::new(provider.clone(), executor_config(&dir));

    let report = executor.run("compute", log.clone()).await.unwrap();

    assert_eq!(report.plan, vec!["add 2 and 2", "double 4"]);
    assert_eq!(report.transcript, "Step 1: add 2 and 2\n4\n\nStep 2: double 4\n8");
    assert!(report.steps.iter().all(|step| step.finished));
    assert_eq!(provider.calls(), 4);

    assert_eq!(
        log.events(),
        vec![
            "plan:add 2 and 2|double 4".to_string(),
            "agent:1:calculator".to_string(),
            "agent:1:finish".to_string(),
            "step:1:add 2 and 2:4".to_string(),
            "agent:2:finish".to_string(),
            "step:2:double 4:8".to_string(),
            format!("final:{}", report.transcript),
        ]
    );
}

#[tokio::test]
async fn test_steps_start_from_blank_history() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new([
        r#"{"plan":["first","second"]}"#.to_string(),
        action("finish", "a"),
        action("finish", "b"),
    ]);
    let executor = PlanExecutor::new(provider.clone(), executor_config(&dir));

    executor.run("objective", Arc::new(NoopObserver)).await.unwrap();

    let second_step = provider.query(2);
    assert_eq!(second_step.len(), 2);
    assert!(second_step[0].content.starts_with("You are the plan runner."));
    assert_eq!(second_step[1].content, "second");
}

#[tokio::test]
async fn test_planning_failure_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new([r#"{"plan": "not a list"}"#]);
    let log = Arc::new(EventLog::default());
    let executor = PlanExecutor::new(provider.clone(), executor_config(&dir));

    let result = executor.run("objective", log.clone()).await;

    assert!(matches!(result, Err(AgentError::Planning(ref msg)) if msg == "could not generate a plan"));
    assert_eq!(provider.calls(), 1);
    assert_eq!(log.events(), vec!["error:could not generate a plan".to_string()]);
}

#[tokio::test]
async fn test_empty_plan_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let provider = ScriptedProvider::new([r#"{"plan": []}"#]);
    let executor = PlanExecutor::new(provider.clone(), executor_config(&dir));

    let result = executor.run("objective", Arc::new(NoopObserver)).await;

    assert!(matches!(result, Err(AgentError::Planning(_))));
    assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn test_unfinished_step_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    // one step, then the script runs dry and the step's agent gets a provider error
    let provider = ScriptedProvider::new([r#"{"plan":["only"]}"#]);
    let executor = PlanExecutor::new(provider, executor_config(&dir));

    let report = executor.run("objective", Arc::new(NoopObserver)).await.unwrap();

    assert_eq!(report.steps.len(), 1);
    assert!(!report.steps[0].finished);
    assert!(report.steps[0].result.contains("script exhausted"));
}
