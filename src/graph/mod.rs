pub mod model;
pub mod normalize;
pub mod pending;
pub mod store;

pub use model::{GraphEdge, GraphNode, IoMode, NodeData, Position, Workspace};
pub use pending::{
    DragOutcome, HandleKind, PendingConnect, PendingConnectionTracker, ResolvedConnection,
    ScreenToGraph, TrackerState, Viewport,
};
pub use store::GraphStore;
