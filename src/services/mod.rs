pub mod maintenance;
pub use maintenance::MaintenanceService;

pub mod queries;
pub use queries::{BillingPeriod, QueryService, ensure_current_period};

pub mod records;
pub use records::{NewRecord, RecordError, RecordPatch, RecordRow, RecordService};

pub mod users;
pub use users::{LoginOutcome, UserError, UserService};
