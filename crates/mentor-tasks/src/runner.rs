//! Async task runner.
//!
//! Dispatch records a pending task, queues a job and returns at once. A
//! fixed pool of workers drains the queue; each worker runs one job end to
//! end and records its outcome in the ledger, where callers poll for it.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use mentor_assistant::Assistant;
use mentor_core::config::WorkerConfig;
use mentor_core::types::OwnerId;
use mentor_storage::{OwnerRepository, SessionRepository};

use crate::error::{Result, TaskError};
use crate::ledger::TaskLedger;
use crate::types::{DispatchReceipt, TaskKind, TaskStatus, TaskStatusView};

/// Work carried from dispatch to a worker.
#[derive(Debug, Clone)]
enum Job {
    Analysis {
        owner_id: OwnerId,
        session_id: Uuid,
        text: String,
        title: Option<String>,
    },
    FollowUp {
        session_id: Uuid,
        question: String,
    },
}

impl Job {
    fn kind(&self) -> TaskKind {
        match self {
            Job::Analysis { .. } => TaskKind::Analysis,
            Job::FollowUp { .. } => TaskKind::FollowUp,
        }
    }
}

struct Envelope {
    task_id: Uuid,
    job: Job,
}

/// Everything a job needs. Shared read-only by all workers.
struct JobContext {
    assistant: Arc<Assistant>,
    owners: OwnerRepository,
    sessions: SessionRepository,
    ledger: TaskLedger,
}

pub struct TaskRunner {
    sender: std::sync::Mutex<Option<mpsc::Sender<Envelope>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    ledger: TaskLedger,
}

impl TaskRunner {
    /// Start `config.concurrency` workers behind a queue of
    /// `config.queue_capacity` jobs. Must be called inside a tokio runtime.
    pub fn start(
        config: &WorkerConfig,
        assistant: Arc<Assistant>,
        owners: OwnerRepository,
        sessions: SessionRepository,
        ledger: TaskLedger,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<Envelope>(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let ctx = Arc::new(JobContext {
            assistant,
            owners,
            sessions,
            ledger: ledger.clone(),
        });

        let workers = (0..config.concurrency.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let ctx = Arc::clone(&ctx);
                tokio::spawn(worker_loop(worker, rx, ctx))
            })
            .collect();

        info!(
            workers = config.concurrency,
            queue_capacity = config.queue_capacity,
            "Task runner started"
        );

        Self {
            sender: std::sync::Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            ledger,
        }
    }

    /// Schedule a text analysis that opens a new session.
    ///
    /// The session identifier is minted here; the session row is only
    /// written once the title is known.
    pub async fn dispatch_analysis(
        &self,
        owner_id: OwnerId,
        text: &str,
        title: Option<&str>,
    ) -> Result<DispatchReceipt> {
        let session_id = Uuid::new_v4();
        let job = Job::Analysis {
            owner_id,
            session_id,
            text: text.to_string(),
            title: title.map(str::to_string).filter(|t| !t.is_empty()),
        };
        let task_id = self.enqueue(job).await?;
        Ok(DispatchReceipt {
            session_id,
            task_id,
        })
    }

    /// Schedule a follow-up question in an existing session.
    pub async fn dispatch_follow_up(
        &self,
        session_id: Uuid,
        question: &str,
    ) -> Result<DispatchReceipt> {
        let job = Job::FollowUp {
            session_id,
            question: question.to_string(),
        };
        let task_id = self.enqueue(job).await?;
        Ok(DispatchReceipt {
            session_id,
            task_id,
        })
    }

    /// Current projection of a task.
    pub fn get_status(&self, task_id: Uuid) -> Result<TaskStatusView> {
        self.ledger.status(task_id)
    }

    pub fn ledger(&self) -> &TaskLedger {
        &self.ledger
    }

    /// Close the queue and wait for workers to drain it.
    pub async fn shutdown(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        drop(sender);

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Task worker exited abnormally");
            }
        }
        info!("Task runner stopped");
    }

    /// Record the task and hand it to the queue without waiting for space.
    ///
    /// Nothing is awaited between recording and queueing, so a task row is
    /// either queued or discarded before this returns.
    async fn enqueue(&self, job: Job) -> Result<Uuid> {
        let sender = self
            .sender
            .lock()
            .map_err(|e| TaskError::Queue(format!("sender lock poisoned: {}", e)))?
            .clone()
            .ok_or_else(|| TaskError::Queue("task runner is shut down".to_string()))?;

        let kind = job.kind();
        let task_id = self.ledger.create(kind)?;
        if let Err(e) = sender.try_send(Envelope { task_id, job }) {
            let reason = match e {
                TrySendError::Full(_) => "task queue is full",
                TrySendError::Closed(_) => "task queue closed",
            };
            warn!(task_id = %task_id, kind = %kind, reason, "Task rejected");
            self.ledger.discard(task_id)?;
            return Err(TaskError::Queue(reason.to_string()));
        }
        info!(task_id = %task_id, kind = %kind, "Task dispatched");
        Ok(task_id)
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner").finish_non_exhaustive()
    }
}

async fn worker_loop(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    ctx: Arc<JobContext>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(Envelope { task_id, job }) = next else {
            break;
        };
        execute(worker, task_id, job, &ctx).await;
    }
}

/// Run one job and record its outcome. Never returns an error: every failure
/// ends up in the task's `error` field.
async fn execute(worker: usize, task_id: Uuid, job: Job, ctx: &Arc<JobContext>) {
    if let Err(e) = ctx.ledger.transition(task_id, TaskStatus::Running, None, None) {
        error!(task_id = %task_id, worker, error = %e, "Could not start task");
        abandon(ctx, task_id, &format!("could not start task: {}", e));
        return;
    }

    let job_ctx = Arc::clone(ctx);
    let outcome = tokio::spawn(async move { run_job(&job_ctx, job).await }).await;

    let recorded = match outcome {
        Ok(Ok(result)) => {
            info!(task_id = %task_id, worker, has_result = result.is_some(), "Task succeeded");
            ctx.ledger
                .transition(task_id, TaskStatus::Succeeded, result.as_deref(), None)
        }
        Ok(Err(e)) => {
            error!(task_id = %task_id, worker, error = %e, "Task failed");
            ctx.ledger
                .transition(task_id, TaskStatus::Failed, None, Some(&e.to_string()))
        }
        Err(join_err) => {
            error!(task_id = %task_id, worker, error = %join_err, "Task panicked");
            ctx.ledger
                .transition(task_id, TaskStatus::Failed, None, Some("task panicked"))
        }
    };
    if let Err(e) = recorded {
        error!(task_id = %task_id, error = %e, "Could not record task outcome");
        abandon(ctx, task_id, &format!("could not record task outcome: {}", e));
    }
}

/// Last attempt to leave a task in a terminal state.
fn abandon(ctx: &JobContext, task_id: Uuid, reason: &str) {
    if let Err(e) = ctx.ledger.abandon(task_id, reason) {
        error!(task_id = %task_id, error = %e, "Task left unfinished");
    }
}

async fn run_job(ctx: &JobContext, job: Job) -> Result<Option<String>> {
    match job {
        Job::Analysis {
            owner_id,
            session_id,
            text,
            title,
        } => match run_analysis(ctx, owner_id, session_id, &text, title).await {
            Err(TaskError::OwnerNotFound(id)) => {
                warn!(
                    owner_id = id,
                    session_id = %session_id,
                    "Owner vanished before analysis; nothing to do"
                );
                Ok(None)
            }
            other => other,
        },
        Job::FollowUp {
            session_id,
            question,
        } => {
            let content = ctx
                .assistant
                .follow_up_question(session_id, &question)
                .await?;
            Ok(Some(content))
        }
    }
}

async fn run_analysis(
    ctx: &JobContext,
    owner_id: OwnerId,
    session_id: Uuid,
    text: &str,
    title: Option<String>,
) -> Result<Option<String>> {
    let title = match title {
        Some(title) => title,
        None => match ctx.assistant.generate_title(text).await? {
            Some(generated) => generated,
            None => {
                info!(session_id = %session_id, "No title generated; nothing to do");
                return Ok(None);
            }
        },
    };

    if ctx.owners.find_by_id(owner_id)?.is_none() {
        return Err(TaskError::OwnerNotFound(owner_id));
    }
    if let Err(e) = ctx.sessions.create(session_id, owner_id, &title) {
        // The owner may have been deleted since the check above.
        if ctx.owners.find_by_id(owner_id)?.is_none() {
            return Err(TaskError::OwnerNotFound(owner_id));
        }
        return Err(e.into());
    }

    let content = ctx.assistant.analyze_text(session_id, text).await?;
    Ok(Some(content))
}
