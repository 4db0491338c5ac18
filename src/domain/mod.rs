pub mod battery;
pub mod device;
pub mod forecast;
pub mod policy;
pub mod types;

pub use battery::*;
pub use device::*;
pub use forecast::*;
pub use policy::*;
pub use types::*;
