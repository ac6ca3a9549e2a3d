//! Scheduling core: clock, tick queue, heartbeats, recovery frames, the
//! object sweep and reaper, load tracking and the backend loop.

pub mod audit;
pub mod backend;
pub mod clock;
pub mod driver;
pub mod error;
pub mod heartbeat;
pub mod host;
pub mod load;
pub mod object;
pub mod reaper;
pub mod recovery;
pub mod shutdown;
pub mod sweep;
pub mod tick_queue;

pub use audit::{build_audit_event, AuditEvent, AuditSink, Boundary, InMemoryAuditSink, TracingAuditSink};
pub use backend::{Backend, LoopControl};
pub use clock::{ManualTimeSource, SystemTimeSource, TimeSource, VirtualClock, VirtualTime};
pub use driver::Driver;
pub use error::{fatal, AppResult, SchedulerError, ScriptError, ScriptResult};
pub use heartbeat::{HeartbeatEntry, HeartbeatList, HeartbeatStatus};
pub use host::{IoPoller, ScriptHost};
pub use load::{LoadAverage, LoadReport, LoadTracker};
pub use object::{ObjectFlags, ObjectId, ObjectSpec, ObjectTable, ScriptObject};
pub use recovery::{AmbientState, FrameToken, RecoveryStack};
pub use shutdown::ShutdownHandle;
pub use sweep::SweepStats;
pub use tick_queue::{TickCallback, TickEvent, TickEventQueue, TickHandle};
