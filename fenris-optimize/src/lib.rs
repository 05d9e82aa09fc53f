/// Vector function traits and numerical differentiation
pub mod calculus;
/// Damped and undamped Newton iterations with residual and step based stopping criteria
pub mod newton;
