pub mod goal_service;
pub mod record_service;
pub mod session_service;
pub mod statistics_service;
pub mod streak_service;
pub mod wellness_service;
