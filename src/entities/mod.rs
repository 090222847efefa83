pub mod prelude;

pub mod order_records;
pub mod users;
