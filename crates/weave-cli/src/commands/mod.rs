pub mod check;
pub mod resolve;
pub mod verify_plans;
