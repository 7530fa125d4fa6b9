//! The standard calculator set

mod congestion;
mod flow;
mod kinematics;

pub use congestion::CongestionCalculator;
pub use flow::FlowCalculator;
pub use kinematics::KinematicsCalculator;
