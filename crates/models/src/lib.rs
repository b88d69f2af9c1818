pub mod booking;
pub mod company;
pub mod db;
pub mod errors;
pub mod user;
pub mod user_credentials;
