pub mod cut_time;
pub mod dates;
pub mod money;
