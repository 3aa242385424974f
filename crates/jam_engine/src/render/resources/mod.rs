//! GPU resource ownership
//!
//! Every raw name handed out to the rest of the render core is created and
//! eventually released here.

mod gpu_resources;
mod handle_pool;

pub use gpu_resources::GpuResources;
pub use handle_pool::HandlePool;
