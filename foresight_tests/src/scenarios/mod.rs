mod blocker;
mod lifecycle;
#[cfg(feature = "metrics")]
mod metrics;
mod planar;
mod trajectory;
