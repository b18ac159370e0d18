pub mod announcement;
pub mod audit;
pub mod calendar;
pub mod employee;
pub mod punch;
pub mod role;
