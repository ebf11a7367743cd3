pub mod capture;
pub mod channels;
pub mod info;
pub mod merge;
