pub mod setup_team;
pub mod sync;
pub mod version;
