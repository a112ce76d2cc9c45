pub mod dispatch;
pub mod distance;
pub mod fees;
pub mod lifecycle;
pub mod optimizer;
