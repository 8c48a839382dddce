pub mod audit_logs;
pub mod bookings;
pub mod combos;
pub mod locations;
pub mod payments;
pub mod status;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use bookings::Entity as Bookings;
pub use combos::Entity as Combos;
pub use locations::Entity as Locations;
pub use payments::Entity as Payments;
pub use users::Entity as Users;
