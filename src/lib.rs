//! Order-preserving k-max pooling for Dynamic Convolutional Neural Networks
//!
//! This library provides the pooling operator that gives a DCNN its
//! variable-length sentence handling:
//! - For every `(batch, channel, feature)` slice of an `[N, C, H, W]` tensor,
//!   keep the `k` largest values along the sequence axis H
//! - Emit them in their original sequence order, not sorted by value
//! - Route gradients back to exactly the rows that were kept
//!
//! The forward/backward pair is pure: the [`Selection`] recorded by the
//! forward pass is returned to the caller and passed to the backward pass.
//! [`KMaxPool`] wraps the pair for engines that expect a stateful operator
//! instance, and [`registry`] exposes it through a shape-inference + factory
//! table.
//!
//! # Features
//! - `debug_logs` - Prints shapes, `k` and write modes as the operator runs
//! - `serialization` - Serde support for configurations and selections
//!
//! # Example
//! ```rust
//! use dcnn_kmax_lib::{ops, Backend, CpuBackend};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // One sentence, one channel, four positions, one feature
//!     let x = CpuBackend::from_vec(vec![2.0, 5.0, 1.0, 3.0], &[1, 1, 4, 1])?;
//!
//!     // Keep the two largest values in sequence order
//!     let (y, selection) = ops::kmax_pool::<CpuBackend>(&x, 2)?;
//!     assert_eq!(CpuBackend::copy_to_host(&y)?, vec![5.0, 3.0]);
//!
//!     // Gradients land only on the kept positions
//!     let g = CpuBackend::from_vec(vec![10.0, 20.0], &[1, 1, 2, 1])?;
//!     let dx = ops::kmax_pool_backward::<CpuBackend>(&g, &selection)?;
//!     assert_eq!(CpuBackend::copy_to_host(&dx)?, vec![0.0, 10.0, 0.0, 20.0]);
//!     Ok(())
//! }
//! ```

// --- Central debug_println macro definition ---
/// Conditional logging macro. Prints if 'debug_logs' feature is enabled.
#[cfg(feature = "debug_logs")]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {
        ::std::println!("[DEBUG {}] {}", module_path!(), ::std::format_args!($($arg)*))
    };
}

/// Conditional logging macro (disabled version). Does nothing.
#[cfg(not(feature = "debug_logs"))]
#[macro_export]
macro_rules! debug_println {
    ($($arg:tt)*) => {};
}

// Declare the modules within the crate
pub mod array;
pub mod backend;
pub mod error;
pub mod init;
pub mod operator;
pub mod ops;
pub mod registry;
pub mod selection;
pub mod util;

// Gradient checking and storage assertions shared by unit and integration tests
pub mod test_utils;

// Re-export the public types for easier use by consumers of the library
pub use array::Array; // Keep Array export for CpuBackend::Storage type visibility
pub use backend::cpu::CpuBackend; // Re-export CpuBackend struct
pub use backend::Backend; // Re-export Backend trait
pub use error::Error;
pub use operator::{CustomOperator, KMaxPool, KMaxPoolConfig};
pub use ops::OpReq;
pub use registry::{InferredShapes, OperatorDef, Registry, CPU_REGISTRY};
pub use selection::Selection;
pub use util::dynamic_k;
