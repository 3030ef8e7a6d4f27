//! Launch layer: descriptor formats and validated in-memory declarations.

pub mod descriptor;
pub mod name;
pub mod roslaunch;

pub use descriptor::{DescriptorFormat, LaunchDescriptor, LaunchSpec, NodeDecl, load_descriptor};
pub use roslaunch::parse_launch_xml;
