use async_channel::{Receiver, Sender};
use futures::future::BoxFuture;
use slog::{Logger, debug};

pub type Task = BoxFuture<'static, ()>;

/// A FIFO queue of tasks run one at a time by a dedicated async task.  Each UE has one of
/// these, and there is one more for routines that are not scoped to a UE.
#[derive(Clone)]
pub struct TaskScheduler {
    sender: Sender<Task>,
}

impl TaskScheduler {
    pub fn spawn(logger: Logger) -> Self {
        let (sender, receiver) = async_channel::unbounded();
        async_std::task::spawn(run(receiver, logger));
        TaskScheduler { sender }
    }

    /// Queue a task behind everything already scheduled.  Returns false if the queue has been
    /// cleared.
    pub fn schedule(&self, task: Task) -> bool {
        self.sender.try_send(task).is_ok()
    }

    /// Stop accepting tasks and drop the ones not yet started.  The task that is currently
    /// running is allowed to finish.
    pub fn clear_pending_tasks(&self) {
        self.sender.close();
    }

    pub fn is_cleared(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn run(receiver: Receiver<Task>, logger: Logger) {
    while let Ok(task) = receiver.recv().await {
        if receiver.is_closed() {
            debug!(logger, "Task queue cleared, dropping {} tasks", receiver.len() + 1);
            break;
        }
        task.await;
    }
}
