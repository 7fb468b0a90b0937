#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use buildgraph::dag::Scheduler;
use buildgraph::engine::{BuildReport, Runtime};
use buildgraph::exec::Executor;

pub use buildgraph_test_utils::{
    ConfigFileBuilder, FakeBehaviour, FakeExecutor, init_tracing, layers, pipeline, scheduler,
    with_timeout,
};

pub type Executed = Arc<Mutex<Vec<String>>>;

pub fn executed() -> Executed {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn executed_ids(executed: &Executed) -> Vec<String> {
    executed.lock().unwrap().clone()
}

/// Run a build to completion without ever requesting shutdown.
pub async fn run_build<E: Executor>(scheduler: Scheduler, executor: E) -> BuildReport {
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    Runtime::new(scheduler, executor)
        .run(shutdown_rx)
        .await
        .expect("runtime should not fail")
}
