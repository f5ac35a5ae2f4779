//! Effect routers: one per adapter. Each claims a single message category
//! and turns accepted messages into adapter calls, reporting results back by
//! dispatching follow-up messages.

pub mod catalog;
pub mod permissions;
pub mod player;
pub mod recorder;

pub use catalog::CatalogRouter;
pub use permissions::PermissionRouter;
pub use player::PlayerRouter;
pub use recorder::RecorderRouter;
