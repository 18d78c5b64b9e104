//! Task runner command

use std::process::ExitCode;
use std::sync::Arc;

use super::{Cli, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::project::Project;
use crate::task::TaskRegistry;

/// Load the project and run the requested tasks in order.
pub fn run_tasks(cli: &Cli) -> ExitCode {
    let project = match Project::load(&cli.root, cli.manifest.as_deref()) {
        Ok(project) => project,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    let project = match cli.jobs {
        Some(jobs) => project.with_jobs(jobs.get()),
        None => project,
    };
    tracing::debug!("Project root: {}", project.root().display());

    let registry = Arc::new(TaskRegistry::new());
    project.register_tasks(&registry);

    if cli.list {
        for name in registry.task_names() {
            match registry.get(&name) {
                Some(task) if !task.dependencies.is_empty() => {
                    println!("{} -> {}", name, task.dependencies.join(", "))
                }
                _ => println!("{}", name),
            }
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    if let Some(unknown) = cli.tasks.iter().find(|t| !registry.contains(t)) {
        tracing::error!(
            "Task '{}' is not registered (available: {})",
            unknown,
            registry.task_names().join(", ")
        );
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    for name in &cli.tasks {
        match registry.invoke(name) {
            Ok(invocation) => {
                let diagnostics = invocation.diagnostic_count();
                if diagnostics > 0 {
                    tracing::warn!("'{}' finished with {} diagnostics", name, diagnostics);
                }
            }
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    if cli.watch {
        match project.watch(Arc::clone(&registry)) {
            Ok(watcher) => watcher.wait(),
            Err(e) => {
                tracing::error!("{}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    ExitCode::from(EXIT_SUCCESS)
}
