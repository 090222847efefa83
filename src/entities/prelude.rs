pub use super::order_records::Entity as OrderRecords;
pub use super::users::Entity as Users;
