pub mod flow_driver;
pub mod flow_state;
pub mod harvest_ctx;

pub use flow_driver::FlowDriver;
pub use flow_state::{FlowReport, FlowState};
pub use harvest_ctx::HarvestCtx;
