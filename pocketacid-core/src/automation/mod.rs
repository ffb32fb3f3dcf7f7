pub mod lane;
pub mod node;
pub mod pool;

pub use lane::AutomationLane;
pub use node::AutomationNode;
pub use pool::{AutomationNodePool, DEFAULT_POOL_CAPACITY, LANE_MAX_NODES};
