// Models module

pub mod collector;
pub mod schedule;

pub use collector::CollectorCandidate;
pub use schedule::{
    CollectionSchedule, DeclineEntry, DeclineReasonCode, HolderSlot, ScheduleStatus, ScheduleStop,
    ScheduleType,
};
