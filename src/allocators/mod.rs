//! Graphics allocator capability and the default shared-memory allocator

pub mod shared;
pub mod traits;

pub use shared::SharedMemoryAllocator;
pub use traits::{AllocatedBuffer, GraphicsAllocator};
