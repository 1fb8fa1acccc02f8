mod retention;

pub use retention::RetentionTask;
