pub mod applicants;
pub mod audit;
pub mod calls;
pub mod contracts;
pub mod projects;
pub mod signing;
