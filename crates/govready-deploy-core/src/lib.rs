pub mod command;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod preflight;
pub mod signal;
pub mod teardown;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use command::{
    Environment, ExecOptions, ExecutionResult, Executor, ProcessExecutor, ShellCommand,
    shell_escape,
};
pub use error::*;
pub use extract::{GeneratedCredentials, OneTimeDisclosure, extract_generated_credentials};
pub use orchestrator::{
    Deployment, DeploymentOrchestrator, ExecutionPlan, HookContext, Outcome, OutcomeHooks,
    RunReport, RunState,
};
pub use preflight::{
    ComposeTool, RequiredPorts, check_daemon_running, check_ports, check_tool_available,
    detect_compose_tool,
};
pub use signal::interrupt_token;
pub use teardown::TeardownMode;
