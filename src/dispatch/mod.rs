// Dispatch module - bounded queues between the engines and the output workers

pub mod feedback;
pub mod notes;
pub mod queue;

pub use feedback::{
    FEEDBACK_QUEUE_CAPACITY, FeedbackDispatcher, FeedbackMessage, FeedbackWorker, OscOutput, Param,
};
pub use notes::{NOTE_QUEUE_CAPACITY, NoteDispatcher, NoteEvent, NoteWorker};
pub use queue::{PushOutcome, QueueConsumer, QueueProducer, bounded};

pub use crate::midi::SharedOutputs;
