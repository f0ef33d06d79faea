pub mod events;
pub mod projects;
pub mod studio;
