pub mod alert;
pub mod catalog;
pub mod reading;
