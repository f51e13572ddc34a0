pub mod doctor;
pub mod gateway;
pub mod providers;
pub mod suggest;
pub mod token;
