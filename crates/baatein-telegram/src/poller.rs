//! Long-polling loop.
//!
//! Different chats are handled concurrently. Updates from one chat are
//! handled strictly in the order Telegram delivered them.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use baatein_core::types::ChatId;

use crate::api::{BotApi, Update};
use crate::dispatch::{Dispatcher, Incoming, Outgoing};

/// Pause after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// One message waiting to be dispatched.
#[derive(Debug)]
struct Job {
    reply_to: i64,
    incoming: Incoming,
}

/// Per-chat FIFO of jobs. A chat has a worker task exactly while it has an
/// entry here.
#[derive(Default)]
struct ChatQueues {
    pending: Mutex<HashMap<ChatId, VecDeque<Job>>>,
}

impl ChatQueues {
    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, VecDeque<Job>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `job`. Returns true when the chat needs a new worker.
    fn push(&self, chat_id: ChatId, job: Job) -> bool {
        match self.lock().entry(chat_id) {
            Entry::Occupied(mut queue) => {
                queue.get_mut().push_back(job);
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(VecDeque::from([job]));
                true
            }
        }
    }

    /// Next job for the chat's worker. Once the queue is empty the entry is
    /// removed and the worker must stop.
    fn next(&self, chat_id: ChatId) -> Option<Job> {
        let mut pending = self.lock();
        let job = pending.get_mut(&chat_id)?.pop_front();
        if job.is_none() {
            pending.remove(&chat_id);
        }
        job
    }
}

/// Run the chat's queued jobs one after another until the queue drains.
async fn drain<F, Fut>(queues: &ChatQueues, chat_id: ChatId, mut handle: F)
where
    F: FnMut(Job) -> Fut,
    Fut: Future<Output = ()>,
{
    while let Some(job) = queues.next(chat_id) {
        handle(job).await;
    }
}

/// Pulls updates and hands them to one worker task per busy chat.
pub struct Poller {
    api: Arc<BotApi>,
    dispatcher: Arc<Dispatcher>,
    queues: Arc<ChatQueues>,
}

impl Poller {
    pub fn new(api: Arc<BotApi>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            api,
            dispatcher,
            queues: Arc::new(ChatQueues::default()),
        }
    }

    /// Poll until `shutdown` resolves. In-flight update tasks are left to
    /// finish on the runtime.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut offset: Option<i64> = None;

        if let Err(e) = self.api.set_my_commands(&self.dispatcher.commands()).await {
            tracing::warn!(error = %e, "Failed to register bot commands");
        }
        tracing::info!("Polling for updates");

        loop {
            let updates = tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, stopping poller");
                    return;
                }
                result = self.api.get_updates(offset) => result,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(next_offset(offset, &update));
                self.enqueue(update);
            }
        }
    }

    fn enqueue(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let chat_id = ChatId(message.chat.id);
        let job = Job {
            reply_to: message.message_id,
            incoming: Incoming::from_message(&message),
        };
        tracing::debug!(%chat_id, update_id = update.update_id, ?job, "Update received");

        if !self.queues.push(chat_id, job) {
            return;
        }
        let queues = Arc::clone(&self.queues);
        let api = Arc::clone(&self.api);
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            drain(&queues, chat_id, |job| {
                let api = Arc::clone(&api);
                let dispatcher = Arc::clone(&dispatcher);
                async move {
                    for outgoing in dispatcher.dispatch(chat_id, job.incoming).await {
                        deliver(&api, chat_id, job.reply_to, outgoing).await;
                    }
                }
            })
            .await;
        });
    }
}

/// Offset acknowledging `update` and everything before it.
fn next_offset(current: Option<i64>, update: &Update) -> i64 {
    current.unwrap_or(i64::MIN).max(update.update_id + 1)
}

async fn deliver(api: &BotApi, chat_id: ChatId, reply_to: i64, outgoing: Outgoing) {
    let result = match outgoing {
        Outgoing::Text { text, markdown } => api
            .send_message(chat_id, &text, markdown, Some(reply_to))
            .await,
        Outgoing::Voice { audio, caption } => api
            .send_voice(chat_id, audio, caption.as_deref(), Some(reply_to))
            .await,
    };
    if let Err(e) = result {
        tracing::warn!(%chat_id, error = %e, "Failed to deliver reply");
    }
}
