pub mod assignment;
pub mod delivery;
pub mod rider;
