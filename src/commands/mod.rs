pub mod geocode;
pub mod grid;
pub mod init;
pub mod status;
