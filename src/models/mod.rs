//! Domain entities for the scheduling core.

pub mod availability;
pub mod macros;
pub mod recurring;
pub mod schedule;

pub use availability::{
    merge_windows, union_contains, NewTeacherAvailability, NewTeacherUnavailability,
    TeacherAvailability, TeacherUnavailability, TimeSlot,
};
pub use recurring::{
    Frequency, NewRecurringClassSchedule, RecurringClassSchedule, RecurringStatus,
};
pub use schedule::{ClassSchedule, NewClassSchedule, ScheduleStatus};
