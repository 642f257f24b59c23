pub mod clock;
pub mod token;
