pub mod dbm;
pub mod model;
pub mod rbm;

pub use dbm::Dbm;
pub use model::{Lifecycle, Model, ModelState, MonitoringChannels};
pub use rbm::{Rbm, RbmRecord};
