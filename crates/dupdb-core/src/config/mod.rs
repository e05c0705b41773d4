pub mod session;

pub use session::DupDbConfig;
